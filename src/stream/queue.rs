//! FIFO of per-stream accumulators read in stream-open order.

use std::collections::VecDeque;

use log::debug;

use super::{HandlerFactory, SharedAccumulator, StreamAccumulator, StreamConverter};
use crate::{
    error::{ReadError, ReadResult},
    frame::StreamId,
    source::{BlockMode, Brigade, ReadMode},
};

#[derive(Debug)]
struct QueueEntry {
    stream_id: StreamId,
    accumulator: SharedAccumulator,
}

/// Owns the output accumulators in the order their streams were opened and
/// creates a converter for each new stream.
///
/// Drained accumulators are evicted from the head lazily, at the start of
/// every query and after every read.
#[derive(Debug, Default)]
pub struct QueueManager {
    queue: VecDeque<QueueEntry>,
}

impl QueueManager {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Whether the head accumulator has bytes to read.
    pub fn is_data_available(&mut self) -> bool {
        self.evict_drained();
        self.queue
            .front()
            .is_some_and(|entry| !entry.accumulator.borrow().is_empty())
    }

    /// Whether the head accumulator failed.
    pub fn has_error(&mut self) -> bool {
        self.evict_drained();
        self.queue
            .front()
            .is_some_and(|entry| entry.accumulator.borrow().has_error())
    }

    /// Stream at the head of the queue, if any.
    pub fn head_stream(&mut self) -> Option<StreamId> {
        self.evict_drained();
        self.queue.front().map(|entry| entry.stream_id)
    }

    /// Number of accumulators still queued.
    #[must_use]
    pub fn buffered_streams(&self) -> usize { self.queue.len() }

    /// Total bytes buffered across every queued accumulator.
    #[must_use]
    pub fn buffered_bytes(&self) -> usize {
        self.queue
            .iter()
            .map(|entry| entry.accumulator.borrow().len())
            .sum()
    }

    /// Read from the head accumulator.
    ///
    /// Returns an empty success when the head has nothing to offer; the
    /// caller decides whether to pump more input or report the raw source's
    /// status.
    ///
    /// # Errors
    ///
    /// Returns [`ReadError::General`] when the head stream failed and
    /// propagates the head accumulator's own read status otherwise.
    pub fn read(
        &mut self,
        brigade: &mut Brigade,
        mode: ReadMode,
        block: BlockMode,
        max_bytes: usize,
    ) -> ReadResult {
        if self.has_error() {
            return Err(ReadError::General);
        }
        if !self.is_data_available() {
            return Ok(());
        }
        let result = match self.queue.front() {
            Some(entry) => entry
                .accumulator
                .borrow_mut()
                .read(brigade, mode, block, max_bytes),
            None => Ok(()),
        };
        self.evict_drained();
        result
    }

    fn evict_drained(&mut self) {
        while self
            .queue
            .front()
            .is_some_and(|entry| entry.accumulator.borrow().is_drained())
        {
            if let Some(entry) = self.queue.pop_front() {
                debug!("stream {} drained", entry.stream_id);
            }
        }
    }
}

impl HandlerFactory for QueueManager {
    type Handler = StreamConverter;

    fn create(&mut self, stream_id: StreamId) -> StreamConverter {
        let accumulator = StreamAccumulator::shared();
        self.queue.push_back(QueueEntry {
            stream_id,
            accumulator: SharedAccumulator::clone(&accumulator),
        });
        StreamConverter::new(stream_id, accumulator)
    }
}
