//! Per-stream conversion and the FIFO output queue.
//!
//! Each logical stream owns a [`StreamConverter`] that turns its frames into
//! HTTP/1.1 request bytes and a [`StreamAccumulator`] buffering those bytes.
//! The [`StreamDistributor`] routes frames to converters by stream id and the
//! [`QueueManager`] serialises the accumulators, oldest first, into a single
//! byte stream.
//!
//! ## Head-of-line ordering
//!
//! Only the oldest accumulator that still holds bytes or has not completed is
//! ever read. A stream that stalls without ending therefore hides every
//! stream opened after it, even when their requests are fully buffered. A
//! sequential consumer cannot be offered anything better.

mod accumulator;
mod converter;
mod distributor;
mod queue;

pub use accumulator::{AccumulatorState, SharedAccumulator, StreamAccumulator};
pub use converter::{ConverterState, StreamConverter};
pub use distributor::StreamDistributor;
pub use queue::QueueManager;

use crate::{
    error::StreamError,
    frame::{HeaderBlock, StreamId, SynStream},
};

/// Frame handler owning the output of one logical stream.
pub trait StreamHandler {
    /// The stream was opened.
    fn on_syn_stream(&mut self, frame: &SynStream);

    /// Body bytes arrived. `fin` marks the end of the stream.
    fn on_data(&mut self, payload: &[u8], fin: bool);

    /// Additional headers arrived. `fin` marks the end of the stream.
    fn on_headers(&mut self, headers: &HeaderBlock, fin: bool);

    /// The peer reset the stream.
    fn on_reset(&mut self, status: u32);

    /// The stream failed with a protocol error.
    fn on_error(&mut self, error: StreamError);

    /// Whether the stream ended cleanly and expects no more frames.
    fn is_terminated(&self) -> bool;
}

/// Creates the handler for a newly referenced stream.
pub trait HandlerFactory {
    /// Handler type produced.
    type Handler: StreamHandler;

    /// Create the handler for `stream_id`.
    fn create(&mut self, stream_id: StreamId) -> Self::Handler;
}
