//! Output buffer handed to a read call.

use bytes::{Bytes, BytesMut};

/// Bytes produced by one or more reads, optionally followed by an
/// end-of-stream marker.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Brigade {
    data: BytesMut,
    eos: bool,
}

impl Brigade {
    /// Create an empty brigade.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Append bytes.
    pub fn push_bytes(&mut self, bytes: &[u8]) { self.data.extend_from_slice(bytes); }

    /// Append the end-of-stream marker.
    pub fn push_eos(&mut self) { self.eos = true; }

    /// Whether an end-of-stream marker was appended.
    #[must_use]
    pub const fn is_eos(&self) -> bool { self.eos }

    /// Number of data bytes held.
    #[must_use]
    pub fn len(&self) -> usize { self.data.len() }

    /// Whether no data bytes are held.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.data.is_empty() }

    /// Borrow the data bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] { &self.data }

    /// Remove and return the data bytes, clearing the end-of-stream marker.
    pub fn take(&mut self) -> Bytes {
        self.eos = false;
        self.data.split().freeze()
    }
}
