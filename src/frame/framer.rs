//! Incremental SPDY framer driving a [`FrameVisitor`].
//!
//! The framer buffers raw bytes until a whole frame is present, decodes it
//! with [`SpdyFrameProcessor`] and hands it to the visitor. It never reads on
//! its own; callers push bytes through [`SpdyFramer::process_input`] and can
//! ask [`SpdyFramer::bytes_needed`] how much more input completes the frame
//! currently being buffered.

use bytes::{Bytes, BytesMut};
use log::debug;

use super::{
    FRAME_HEADER_LEN,
    Frame,
    FramingError,
    HeaderBlock,
    StreamId,
    SynStream,
    processor::{FrameProcessor, RawHeader, SpdyFrameProcessor},
};
use crate::metrics;

/// Callbacks invoked by [`SpdyFramer`], one per decoded frame.
pub trait FrameVisitor {
    /// A stream was opened.
    fn on_syn_stream(&mut self, frame: SynStream);

    /// A data frame arrived. `fin` marks the last frame of the stream.
    fn on_data(&mut self, stream_id: StreamId, payload: Bytes, fin: bool);

    /// Additional headers arrived for an open stream.
    fn on_headers(&mut self, stream_id: StreamId, headers: HeaderBlock, fin: bool);

    /// The peer reset a stream.
    fn on_rst_stream(&mut self, stream_id: StreamId, status: u32);

    /// A connection-level control frame (`SETTINGS`, `PING`, ...) or a
    /// `SYN_REPLY`, which only servers send.
    fn on_control(&mut self, frame: Frame) {
        debug!("ignoring {} frame", frame.kind());
    }

    /// A frame addressed to one stream was consumed but its contents could
    /// not be decoded. Framing continues with the next frame.
    ///
    /// Defaults to [`FrameVisitor::on_error`].
    fn on_stream_error(&mut self, error: FramingError) { self.on_error(error); }

    /// The input could not be framed. No further callbacks follow.
    fn on_error(&mut self, error: FramingError);
}

/// Stateful framer buffering partial frames between calls.
#[derive(Debug, Default)]
pub struct SpdyFramer {
    processor: SpdyFrameProcessor,
    buffer: BytesMut,
    error: Option<FramingError>,
}

impl SpdyFramer {
    /// Create a framer rejecting payloads longer than `max_frame_len`.
    #[must_use]
    pub fn new(max_frame_len: usize) -> Self {
        Self {
            processor: SpdyFrameProcessor::new(max_frame_len),
            buffer: BytesMut::new(),
            error: None,
        }
    }

    /// Whether a framing error has been reported.
    #[must_use]
    pub fn has_error(&self) -> bool { self.error.is_some() }

    /// The framing error reported to the visitor, if any.
    #[must_use]
    pub fn error(&self) -> Option<&FramingError> { self.error.as_ref() }

    /// Bytes buffered towards the next frame.
    #[must_use]
    pub fn buffered(&self) -> usize { self.buffer.len() }

    /// Number of bytes that would complete the frame being buffered.
    ///
    /// Until the eight-byte header is complete this is the remainder of the
    /// header. Returns zero once the framer has failed.
    #[must_use]
    pub fn bytes_needed(&self) -> usize {
        if self.error.is_some() {
            return 0;
        }
        if self.buffer.len() < FRAME_HEADER_LEN {
            return FRAME_HEADER_LEN - self.buffer.len();
        }
        let total = FRAME_HEADER_LEN + RawHeader::payload_len(&self.buffer);
        total.saturating_sub(self.buffer.len()).max(1)
    }

    /// Feed `data` and dispatch every frame it completes to `visitor`.
    ///
    /// Returns the number of frames dispatched, counting frames rejected
    /// through [`FrameVisitor::on_stream_error`]. Input offered after a
    /// connection-level framing error is discarded.
    pub fn process_input<V>(&mut self, data: &[u8], visitor: &mut V) -> usize
    where
        V: FrameVisitor + ?Sized,
    {
        if self.error.is_some() {
            return 0;
        }
        self.buffer.extend_from_slice(data);

        let mut dispatched = 0;
        loop {
            match self.processor.decode(&mut self.buffer) {
                Ok(Some(frame)) => {
                    metrics::inc_frames(frame.kind());
                    dispatch(frame, visitor);
                    dispatched += 1;
                }
                Ok(None) => break,
                // The processor consumed the whole frame before rejecting its
                // header block, so the next frame starts at the buffer front.
                Err(error) if error.stream_id().is_some() => {
                    debug!("skipping undecodable frame: {error}");
                    visitor.on_stream_error(error);
                    dispatched += 1;
                }
                Err(error) => {
                    debug!("framing failed: {error}");
                    self.buffer.clear();
                    self.error = Some(error.clone());
                    visitor.on_error(error);
                    break;
                }
            }
        }
        dispatched
    }
}

fn dispatch<V: FrameVisitor + ?Sized>(frame: Frame, visitor: &mut V) {
    let fin = frame.is_fin();
    match frame {
        Frame::SynStream(syn) => visitor.on_syn_stream(syn),
        Frame::Data {
            stream_id, payload, ..
        } => visitor.on_data(stream_id, payload, fin),
        Frame::Headers {
            stream_id, headers, ..
        } => visitor.on_headers(stream_id, headers, fin),
        Frame::RstStream { stream_id, status } => visitor.on_rst_stream(stream_id, status),
        other => visitor.on_control(other),
    }
}
