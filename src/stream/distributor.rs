//! Routes decoded frames to per-stream handlers.

use std::collections::HashMap;

use bytes::Bytes;
use log::{debug, warn};

use super::{HandlerFactory, StreamHandler};
use crate::{
    error::StreamError,
    frame::{FrameVisitor, FramingError, HeaderBlock, StreamId, SynStream},
    metrics,
};

/// Single callback target of the framer, fanning frames out by stream id.
///
/// Handlers are created through the [`HandlerFactory`] when a stream opens
/// and dropped once they report termination. A frame that references a
/// stream with no live handler still gets a fresh handler from the factory,
/// immediately failed, so the error reaches the consumer in stream order
/// instead of the frame being dropped silently.
#[derive(Debug)]
pub struct StreamDistributor<F: HandlerFactory> {
    factory: F,
    streams: HashMap<StreamId, F::Handler>,
    highest_stream_id: Option<StreamId>,
}

impl<F: HandlerFactory> StreamDistributor<F> {
    /// Create a distributor drawing handlers from `factory`.
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            streams: HashMap::new(),
            highest_stream_id: None,
        }
    }

    /// Borrow the handler factory.
    pub const fn factory(&self) -> &F { &self.factory }

    /// Mutably borrow the handler factory.
    pub const fn factory_mut(&mut self) -> &mut F { &mut self.factory }

    /// Number of streams with a live handler.
    #[must_use]
    pub fn live_streams(&self) -> usize { self.streams.len() }

    /// Highest stream id seen so far.
    #[must_use]
    pub const fn highest_stream_id(&self) -> Option<StreamId> { self.highest_stream_id }

    fn bump_highest(&mut self, stream_id: StreamId) {
        if self.highest_stream_id.is_none_or(|highest| stream_id > highest) {
            self.highest_stream_id = Some(stream_id);
        }
    }

    /// Create a handler for `stream_id` that starts out failed.
    fn fail_new_stream(&mut self, stream_id: StreamId, error: StreamError) {
        let mut handler = self.factory.create(stream_id);
        handler.on_error(error);
        self.streams.insert(stream_id, handler);
        self.bump_highest(stream_id);
    }

    /// Apply `step` to the live handler for `stream_id`, dropping it once it
    /// terminates. Returns `false` when no handler is live.
    fn with_stream<G>(&mut self, stream_id: StreamId, step: G) -> bool
    where
        G: FnOnce(&mut F::Handler),
    {
        let Some(handler) = self.streams.get_mut(&stream_id) else {
            return false;
        };
        step(handler);
        if handler.is_terminated() {
            self.streams.remove(&stream_id);
        }
        true
    }

    fn unknown_stream(&mut self, stream_id: StreamId, kind: &str) {
        warn!("{kind} frame for unknown stream {stream_id}");
        self.fail_new_stream(stream_id, StreamError::UnknownStream { stream_id });
    }
}

impl<F: HandlerFactory> FrameVisitor for StreamDistributor<F> {
    fn on_syn_stream(&mut self, frame: SynStream) {
        let stream_id = frame.stream_id;
        if self.with_stream(stream_id, |handler| {
            handler.on_error(StreamError::DuplicateStream { stream_id });
        }) {
            return;
        }
        if let Some(highest) = self.highest_stream_id.filter(|&highest| stream_id <= highest) {
            warn!("SYN_STREAM reuses stream id {stream_id} (highest {highest})");
            self.fail_new_stream(stream_id, StreamError::StreamReused { stream_id, highest });
            return;
        }

        let mut handler = self.factory.create(stream_id);
        metrics::inc_streams_opened();
        handler.on_syn_stream(&frame);
        self.bump_highest(stream_id);
        if !handler.is_terminated() {
            self.streams.insert(stream_id, handler);
        }
    }

    fn on_data(&mut self, stream_id: StreamId, payload: Bytes, fin: bool) {
        if !self.with_stream(stream_id, |handler| handler.on_data(&payload, fin)) {
            self.unknown_stream(stream_id, "DATA");
        }
    }

    fn on_headers(&mut self, stream_id: StreamId, headers: HeaderBlock, fin: bool) {
        if !self.with_stream(stream_id, |handler| handler.on_headers(&headers, fin)) {
            self.unknown_stream(stream_id, "HEADERS");
        }
    }

    fn on_rst_stream(&mut self, stream_id: StreamId, status: u32) {
        if let Some(mut handler) = self.streams.remove(&stream_id) {
            handler.on_reset(status);
        } else if self.highest_stream_id.is_none_or(|highest| stream_id > highest) {
            self.fail_new_stream(stream_id, StreamError::Reset { stream_id, status });
        } else {
            debug!("RST_STREAM for finished stream {stream_id} ignored");
        }
    }

    fn on_stream_error(&mut self, error: FramingError) {
        let Some(stream_id) = error.stream_id() else {
            self.on_error(error);
            return;
        };
        warn!("undecodable frame for stream {stream_id}: {error}");
        let stream_error = StreamError::from(error);
        if self.streams.contains_key(&stream_id) {
            self.with_stream(stream_id, |handler| handler.on_error(stream_error));
        } else {
            self.fail_new_stream(stream_id, stream_error);
        }
    }

    fn on_error(&mut self, error: FramingError) {
        // The framer stops after an error, so no live stream can finish.
        let target = error.stream_id().unwrap_or(StreamId(0));
        let stream_error = StreamError::from(error);
        for handler in self.streams.values_mut() {
            handler.on_error(stream_error.clone());
        }
        // An unattributed error is queued as stream 0, behind every stream
        // already opened.
        if !self.streams.contains_key(&target) {
            self.fail_new_stream(target, stream_error);
        }
    }
}
