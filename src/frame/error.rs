//! Framing errors raised while decoding SPDY frames.
//!
//! Errors that can be pinned on a single stream say so through
//! [`FramingError::stream_id`]. They are raised only after the offending frame
//! was consumed, so the framer skips that frame and keeps going. Every other
//! variant is fatal: once one is reported the framer stops consuming input.

use thiserror::Error;

use super::StreamId;

/// Wire-level failures detected by the SPDY framer.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FramingError {
    /// Frame length field exceeds the configured maximum.
    #[error("frame exceeds max length: {size} > {max}")]
    OversizedFrame {
        /// Payload length announced by the frame header.
        size: usize,
        /// Largest accepted payload length.
        max: usize,
    },

    /// Control frame announced a protocol version other than SPDY/2.
    #[error("unsupported SPDY version: {version}")]
    UnsupportedVersion {
        /// Version carried by the frame header.
        version: u16,
    },

    /// Control frame type code is not defined by SPDY/2.
    #[error("unknown control frame type: {type_id}")]
    UnknownControlType {
        /// Type code carried by the frame header.
        type_id: u16,
    },

    /// Payload is shorter than the fixed fields of its frame type.
    #[error("{kind} frame truncated: have {have} bytes, need {need}")]
    TruncatedPayload {
        /// Frame kind being decoded.
        kind: &'static str,
        /// Payload bytes present.
        have: usize,
        /// Payload bytes required.
        need: usize,
    },

    /// A stream-scoped frame referenced stream 0.
    #[error("{kind} frame references stream 0")]
    InvalidStreamId {
        /// Frame kind being decoded.
        kind: &'static str,
    },

    /// The name/value header block of a stream frame could not be parsed.
    #[error("malformed header block on stream {stream_id}: {reason}")]
    MalformedHeaderBlock {
        /// Stream that carried the header block.
        stream_id: StreamId,
        /// What was wrong with it.
        reason: &'static str,
    },
}

impl FramingError {
    /// Stream the error can be attributed to, if any.
    #[must_use]
    pub const fn stream_id(&self) -> Option<StreamId> {
        match self {
            Self::MalformedHeaderBlock { stream_id, .. } => Some(*stream_id),
            _ => None,
        }
    }
}
