//! Buffer bridging push-style conversion and pull-style reads.

use std::{cell::RefCell, rc::Rc};

use bytes::{Buf, BytesMut};
use log::warn;

use crate::{
    error::{ReadError, ReadResult, StreamError},
    source::{BlockMode, Brigade, ReadMode},
};

/// Accumulator shared by its converter (writer) and the queue (reader).
pub type SharedAccumulator = Rc<RefCell<StreamAccumulator>>;

/// Observable state of a [`StreamAccumulator`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccumulatorState {
    /// No bytes buffered and the stream is still open.
    Empty,
    /// Bytes are waiting to be read.
    HasData,
    /// The stream ended and every byte has been read.
    Complete,
    /// The stream failed; its bytes will never be delivered.
    Errored,
}

/// Per-stream output buffer.
///
/// The accumulator is passive: it never waits. A read that finds no bytes on
/// an open stream reports [`ReadError::WouldBlock`] in non-blocking mode and
/// an empty success in blocking mode, leaving the retry to the caller.
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    buffer: BytesMut,
    complete: bool,
    error: Option<StreamError>,
}

impl StreamAccumulator {
    /// Create an empty, open accumulator.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Wrap a new accumulator for sharing.
    #[must_use]
    pub fn shared() -> SharedAccumulator { Rc::new(RefCell::new(Self::new())) }

    /// Append converted bytes.
    ///
    /// Writes after completion or failure are dropped.
    pub fn write(&mut self, bytes: &[u8]) {
        if self.complete || self.error.is_some() {
            warn!(
                "dropping {} bytes written to a finished accumulator",
                bytes.len()
            );
            return;
        }
        self.buffer.extend_from_slice(bytes);
    }

    /// Record that the stream ended; no more bytes will be written.
    pub fn mark_complete(&mut self) { self.complete = true; }

    /// Record a stream failure and discard buffered bytes.
    ///
    /// The first error wins.
    pub fn mark_error(&mut self, error: StreamError) {
        if self.error.is_none() {
            self.error = Some(error);
            self.buffer.clear();
        }
    }

    /// Whether no bytes are buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.buffer.is_empty() }

    /// Whether the stream ended.
    #[must_use]
    pub const fn is_complete(&self) -> bool { self.complete }

    /// Whether the stream failed.
    #[must_use]
    pub const fn has_error(&self) -> bool { self.error.is_some() }

    /// The failure recorded for the stream, if any.
    #[must_use]
    pub const fn error(&self) -> Option<&StreamError> { self.error.as_ref() }

    /// Number of bytes buffered.
    #[must_use]
    pub fn len(&self) -> usize { self.buffer.len() }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> AccumulatorState {
        if self.error.is_some() {
            AccumulatorState::Errored
        } else if !self.buffer.is_empty() {
            AccumulatorState::HasData
        } else if self.complete {
            AccumulatorState::Complete
        } else {
            AccumulatorState::Empty
        }
    }

    /// Whether the queue may drop this accumulator.
    #[must_use]
    pub fn is_drained(&self) -> bool {
        self.complete && (self.buffer.is_empty() || self.error.is_some())
    }

    /// Move buffered bytes into `brigade` according to `mode`.
    ///
    /// # Errors
    ///
    /// Returns [`ReadError::General`] for a failed stream,
    /// [`ReadError::Eof`] (with an end-of-stream marker) for a finished and
    /// drained one, and [`ReadError::WouldBlock`] in non-blocking mode when
    /// nothing is buffered yet.
    pub fn read(
        &mut self,
        brigade: &mut Brigade,
        mode: ReadMode,
        block: BlockMode,
        max_bytes: usize,
    ) -> ReadResult {
        if self.error.is_some() {
            return Err(ReadError::General);
        }
        if mode == ReadMode::Init {
            return Ok(());
        }
        if self.buffer.is_empty() {
            if self.complete {
                brigade.push_eos();
                return Err(ReadError::Eof);
            }
            return match block {
                BlockMode::NonBlocking => Err(ReadError::WouldBlock),
                BlockMode::Blocking => Ok(()),
            };
        }

        let window = self.buffer.len().min(max_bytes);
        match mode {
            ReadMode::ReadBytes => self.take(brigade, window),
            ReadMode::GetLine => {
                let len = self.buffer[..window]
                    .iter()
                    .position(|&b| b == b'\n')
                    .map_or(window, |pos| pos + 1);
                self.take(brigade, len);
            }
            ReadMode::Speculative => brigade.push_bytes(&self.buffer[..window]),
            ReadMode::Exhaustive => self.take(brigade, self.buffer.len()),
            ReadMode::EatCrlf => {
                let skip = self
                    .buffer
                    .iter()
                    .take_while(|&&b| b == b'\r' || b == b'\n')
                    .count();
                self.buffer.advance(skip);
            }
            ReadMode::Init => {}
        }
        Ok(())
    }

    fn take(&mut self, brigade: &mut Brigade, len: usize) {
        brigade.push_bytes(&self.buffer[..len]);
        self.buffer.advance(len);
    }
}
