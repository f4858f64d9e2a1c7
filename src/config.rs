//! Tunables for [`InputFilter`](crate::InputFilter).

use thiserror::Error;

use crate::frame::MAX_PAYLOAD_LEN;

/// Default upper bound on a single frame's payload.
pub const DEFAULT_MAX_FRAME_LEN: usize = MAX_PAYLOAD_LEN;
/// Default upper bound on raw bytes requested per upstream read.
pub const DEFAULT_READ_CHUNK: usize = 8 * 1024;

/// Configuration for the demultiplexing pipeline.
///
/// # Invariants
/// - `max_frame_len` must not exceed the 24-bit wire limit
/// - `read_chunk` must be non-zero
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FilterConfig {
    /// Frames declaring a longer payload are a framing error.
    pub max_frame_len: usize,
    /// Maximum raw bytes requested from the transport in one read.
    pub read_chunk: usize,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            read_chunk: DEFAULT_READ_CHUNK,
        }
    }
}

/// A [`FilterConfig`] field is out of range.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// `max_frame_len` exceeds what the length field can express.
    #[error("max_frame_len {0} exceeds the wire limit of {MAX_PAYLOAD_LEN}")]
    FrameLenTooLarge(usize),
    /// `read_chunk` is zero.
    #[error("read_chunk must be non-zero")]
    ZeroReadChunk,
}

impl FilterConfig {
    /// Override the maximum frame payload length.
    #[must_use]
    pub const fn with_max_frame_len(mut self, len: usize) -> Self {
        self.max_frame_len = len;
        self
    }

    /// Override the upstream read size.
    #[must_use]
    pub const fn with_read_chunk(mut self, len: usize) -> Self {
        self.read_chunk = len;
        self
    }

    /// Check every field is within range.
    ///
    /// ```
    /// use spdy_demux::{ConfigError, FilterConfig};
    ///
    /// assert!(FilterConfig::default().validate().is_ok());
    /// assert_eq!(
    ///     FilterConfig::default().with_read_chunk(0).validate(),
    ///     Err(ConfigError::ZeroReadChunk),
    /// );
    /// ```
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] naming the first field out of range.
    pub const fn validate(&self) -> Result<(), ConfigError> {
        if self.max_frame_len > MAX_PAYLOAD_LEN {
            return Err(ConfigError::FrameLenTooLarge(self.max_frame_len));
        }
        if self.read_chunk == 0 {
            return Err(ConfigError::ZeroReadChunk);
        }
        Ok(())
    }
}
