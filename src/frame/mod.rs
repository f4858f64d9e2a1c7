//! SPDY/2 frame model, header blocks, and the incremental framer.

pub mod error;
pub mod framer;
mod header_block;
pub mod processor;
mod types;

pub use error::FramingError;
pub use framer::{FrameVisitor, SpdyFramer};
pub use header_block::{HeaderBlock, VALUE_SEPARATOR, merge_in_header};
pub use processor::{FrameProcessor, SpdyFrameProcessor};
pub use types::{
    ControlType,
    FLAG_FIN,
    FLAG_UNIDIRECTIONAL,
    FRAME_HEADER_LEN,
    Frame,
    MAX_PAYLOAD_LEN,
    MAX_STREAM_ID,
    SPDY_VERSION,
    StreamId,
    SynStream,
};
