//! The pull-style read contract shared by raw transports and the filter.
//!
//! A [`ByteSource`] appends bytes to a [`Brigade`] on request and reports a
//! [`ReadResult`]. The same shape is exposed by [`InputFilter`](crate::InputFilter),
//! so a filter can stand in for a raw transport in front of any consumer.

mod brigade;
mod io_source;

pub use brigade::Brigade;
pub use io_source::IoSource;

use crate::error::ReadResult;

/// How much a read should return.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReadMode {
    /// Up to `max_bytes` bytes.
    #[default]
    ReadBytes,
    /// Up to and including the next line feed, at most `max_bytes` bytes.
    GetLine,
    /// Up to `max_bytes` bytes, left in place for the next read.
    Speculative,
    /// Everything currently available.
    Exhaustive,
    /// Discard leading CR and LF bytes; returns nothing.
    EatCrlf,
    /// Connection initialisation; returns nothing.
    Init,
}

/// Whether a read may wait for data.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BlockMode {
    /// The caller is prepared to retry; sources may still return early.
    #[default]
    Blocking,
    /// Return [`ReadError::WouldBlock`](crate::ReadError::WouldBlock) instead of waiting.
    NonBlocking,
}

/// A pull-based byte stream.
pub trait ByteSource {
    /// Append up to `max_bytes` bytes to `brigade` according to `mode`.
    ///
    /// # Errors
    ///
    /// Returns a [`ReadError`](crate::ReadError) when no bytes can be
    /// produced now ([`WouldBlock`](crate::ReadError::WouldBlock)), the
    /// stream is exhausted, or the source failed. Bytes appended before an
    /// error remain valid.
    fn read(
        &mut self,
        brigade: &mut Brigade,
        mode: ReadMode,
        block: BlockMode,
        max_bytes: usize,
    ) -> ReadResult;
}

/// A transport able to make progress on pending handshakes without
/// consuming application bytes.
pub trait SpeculativeRead: ByteSource {
    /// Drive the transport far enough for negotiation to finish.
    ///
    /// Implementations must leave every byte they pull available to the next
    /// [`ByteSource::read`].
    ///
    /// # Errors
    ///
    /// Returns the status of the underlying read when it fails.
    fn probe(&mut self) -> ReadResult;
}

impl<S: ByteSource + ?Sized> ByteSource for &mut S {
    fn read(
        &mut self,
        brigade: &mut Brigade,
        mode: ReadMode,
        block: BlockMode,
        max_bytes: usize,
    ) -> ReadResult {
        (**self).read(brigade, mode, block, max_bytes)
    }
}

impl<S: SpeculativeRead + ?Sized> SpeculativeRead for &mut S {
    fn probe(&mut self) -> ReadResult { (**self).probe() }
}

#[cfg(test)]
mod tests;
