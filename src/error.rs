//! Canonical error and status types for the crate.
//!
//! [`ReadError`] is the status half of the pull contract shared by raw byte
//! sources and [`InputFilter`](crate::InputFilter): a read either succeeds or
//! reports one of these conditions. [`StreamError`] records why a single
//! logical stream was failed; it never escapes the read contract directly and
//! surfaces as [`ReadError::General`] once the stream reaches the head of the
//! output queue.

use std::io;

use thiserror::Error;

use crate::frame::{FramingError, StreamId};

/// Status of a failed or incomplete pull from a [`ByteSource`](crate::ByteSource).
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ReadError {
    /// No bytes are available yet; retry later.
    #[error("no data available yet")]
    WouldBlock,
    /// The source is exhausted.
    #[error("end of stream")]
    Eof,
    /// The connection was aborted underneath the reader.
    #[error("connection aborted")]
    ConnectionAborted,
    /// The pipeline failed; the connection should be closed.
    #[error("general pipeline failure")]
    General,
    /// The underlying transport failed.
    #[error("transport error ({kind:?}): {message}")]
    Transport {
        /// Kind of the originating I/O error.
        kind: io::ErrorKind,
        /// Rendered message of the originating I/O error.
        message: String,
    },
}

impl ReadError {
    /// Whether the caller may simply retry the read later.
    #[must_use]
    pub const fn is_would_block(&self) -> bool { matches!(self, Self::WouldBlock) }
}

impl From<io::Error> for ReadError {
    fn from(error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::WouldBlock => Self::WouldBlock,
            io::ErrorKind::UnexpectedEof => Self::Eof,
            io::ErrorKind::ConnectionAborted => Self::ConnectionAborted,
            kind => Self::Transport {
                kind,
                message: error.to_string(),
            },
        }
    }
}

impl From<ReadError> for io::Error {
    fn from(error: ReadError) -> Self {
        match error {
            ReadError::WouldBlock => io::Error::from(io::ErrorKind::WouldBlock),
            ReadError::Eof => io::Error::from(io::ErrorKind::UnexpectedEof),
            ReadError::ConnectionAborted => io::Error::from(io::ErrorKind::ConnectionAborted),
            ReadError::General => io::Error::new(io::ErrorKind::InvalidData, error),
            ReadError::Transport { kind, message } => io::Error::new(kind, message),
        }
    }
}

/// Outcome of a single pull.
pub type ReadResult = Result<(), ReadError>;

/// Reasons a logical stream's output was failed.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StreamError {
    /// A field required to build the request line is absent.
    #[error("stream {stream_id}: missing required header `{name}`")]
    MissingHeader {
        /// Stream carrying the header block.
        stream_id: StreamId,
        /// Name of the absent field.
        name: &'static str,
    },

    /// A header name or value cannot be expressed in HTTP/1.1.
    #[error("stream {stream_id}: invalid header `{name}`")]
    InvalidHeader {
        /// Stream carrying the header block.
        stream_id: StreamId,
        /// Name of the offending header.
        name: String,
    },

    /// A stream-open frame arrived for a stream that is still open.
    #[error("stream {stream_id} opened twice")]
    DuplicateStream {
        /// Stream opened twice.
        stream_id: StreamId,
    },

    /// A frame referenced a stream that was never opened or already ended.
    #[error("frame for unknown stream {stream_id}")]
    UnknownStream {
        /// Stream the frame referenced.
        stream_id: StreamId,
    },

    /// A stream-open frame reused an identifier at or below one already seen.
    #[error("stream {stream_id} reuses an id not above {highest}")]
    StreamReused {
        /// Identifier carried by the frame.
        stream_id: StreamId,
        /// Highest identifier opened so far.
        highest: StreamId,
    },

    /// Body bytes disagree with the declared `content-length`.
    #[error("stream {stream_id}: received {received} body bytes, content-length is {declared}")]
    ContentLengthMismatch {
        /// Stream carrying the body.
        stream_id: StreamId,
        /// Length declared by the request headers.
        declared: u64,
        /// Bytes received when the mismatch was detected.
        received: u64,
    },

    /// The peer reset the stream before it ended.
    #[error("stream {stream_id} reset by peer with status {status}")]
    Reset {
        /// Stream that was reset.
        stream_id: StreamId,
        /// Status code carried by `RST_STREAM`.
        status: u32,
    },

    /// The connection's frames could not be parsed.
    #[error("framing error: {0}")]
    Framing(#[from] FramingError),
}
