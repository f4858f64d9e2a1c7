#![doc(html_root_url = "https://docs.rs/spdy_demux/latest")]
//! Public API for the `spdy_demux` library.
//!
//! This crate sits in the read path of a SPDY connection and presents its
//! multiplexed streams to a consumer that only understands one sequential
//! HTTP/1.1 byte stream. Raw bytes are framed, fanned out per stream,
//! converted into request bytes, and serialised back into a single pull-based
//! read contract by [`InputFilter`].

pub mod config;
pub mod error;
pub mod filter;
pub mod frame;
pub mod metrics;
pub mod negotiation;
pub mod pump;
pub mod source;
pub mod stream;

pub use config::{ConfigError, FilterConfig};
pub use error::{ReadError, ReadResult, StreamError};
pub use filter::{HttpReader, InputFilter};
pub use frame::{FramingError, HeaderBlock, StreamId, merge_in_header};
pub use metrics::{FRAMES_PROCESSED, STREAM_ERRORS, STREAMS_OPENED};
pub use negotiation::{ConnectionContext, Detection, DetectionGate, NegotiationState};
pub use pump::FramePump;
pub use source::{BlockMode, Brigade, ByteSource, IoSource, ReadMode, SpeculativeRead};
pub use stream::{QueueManager, StreamAccumulator, StreamConverter, StreamDistributor};
