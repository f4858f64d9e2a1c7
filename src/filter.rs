//! The read-path entry point.
//!
//! [`InputFilter`] sits between a raw transport and a consumer that expects
//! one sequential HTTP/1.1 byte stream. It exposes the same [`ByteSource`]
//! contract as the transport, so it can be stacked in front of any consumer
//! that already reads from one.

use std::io::{self, Read};

use bytes::{Buf, Bytes};
use log::warn;

use crate::{
    config::{ConfigError, FilterConfig},
    error::{ReadError, ReadResult},
    frame::SpdyFramer,
    negotiation::{ConnectionContext, Detection, DetectionGate},
    pump::FramePump,
    source::{BlockMode, Brigade, ByteSource, ReadMode, SpeculativeRead},
    stream::{QueueManager, StreamDistributor},
};

/// Demultiplexes SPDY frames from `S` into sequential HTTP/1.1 requests.
///
/// Requests are delivered whole and in stream-open order. If the connection
/// did not negotiate SPDY, reads pass straight through to `S`.
///
/// ```
/// use spdy_demux::{
///     BlockMode, Brigade, ByteSource, ConnectionContext, InputFilter, IoSource,
///     NegotiationState, ReadMode,
/// };
///
/// let ctx = ConnectionContext::with_state(NegotiationState::NotUsingSpdy);
/// let mut filter = InputFilter::new(IoSource::new(&b"GET / HTTP/1.1\r\n\r\n"[..]), ctx);
///
/// let mut out = Brigade::new();
/// filter
///     .read(&mut out, ReadMode::GetLine, BlockMode::Blocking, 1024)
///     .expect("pass-through read");
/// assert_eq!(out.as_bytes(), b"GET / HTTP/1.1\r\n");
/// ```
#[derive(Debug)]
pub struct InputFilter<S> {
    source: S,
    context: ConnectionContext,
    gate: DetectionGate,
    pump: FramePump,
    distributor: StreamDistributor<QueueManager>,
}

impl<S: SpeculativeRead> InputFilter<S> {
    /// Wrap `source` with the default configuration.
    pub fn new(source: S, context: ConnectionContext) -> Self {
        let config = FilterConfig::default();
        Self::build(source, context, config)
    }

    /// Wrap `source` with `config`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if `config` fails validation.
    pub fn with_config(
        source: S,
        context: ConnectionContext,
        config: FilterConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(source, context, config))
    }

    fn build(source: S, context: ConnectionContext, config: FilterConfig) -> Self {
        Self {
            source,
            context,
            gate: DetectionGate::new(),
            pump: FramePump::new(SpdyFramer::new(config.max_frame_len), config.read_chunk),
            distributor: StreamDistributor::new(QueueManager::new()),
        }
    }

    /// Borrow the raw source.
    pub const fn get_ref(&self) -> &S { &self.source }

    /// Mutably borrow the raw source.
    ///
    /// Reading from it directly bypasses the framer and corrupts the stream.
    pub fn get_mut(&mut self) -> &mut S { &mut self.source }

    /// Discard the pipeline and return the raw source.
    pub fn into_inner(self) -> S { self.source }

    /// The connection context shared with the transport.
    pub const fn context(&self) -> &ConnectionContext { &self.context }

    /// The output queue.
    pub const fn queue(&self) -> &QueueManager { self.distributor.factory() }

    /// Whether detection fell back to pass-through because negotiation never
    /// finished.
    pub const fn negotiation_unsupported(&self) -> bool { self.gate.negotiation_unsupported() }

    /// Adapt the filter to [`io::Read`], reading with `block`.
    pub fn http_reader(&mut self, block: BlockMode) -> HttpReader<'_, S> {
        HttpReader {
            filter: self,
            block,
            pending: Bytes::new(),
        }
    }

    /// Pump frames until the head of the queue can answer a read.
    fn fill(&mut self, block: BlockMode) {
        loop {
            let queue = self.distributor.factory_mut();
            if queue.has_error() || queue.is_data_available() {
                return;
            }
            if !self
                .pump
                .pump_one_frame(&mut self.source, block, &mut self.distributor)
            {
                return;
            }
        }
    }
}

impl<S: SpeculativeRead> ByteSource for InputFilter<S> {
    fn read(
        &mut self,
        brigade: &mut Brigade,
        mode: ReadMode,
        block: BlockMode,
        max_bytes: usize,
    ) -> ReadResult {
        if self.gate.resolve(&self.context, &mut self.source)? == Detection::NotUsingProtocol {
            return self.source.read(brigade, mode, block, max_bytes);
        }

        if self.context.is_aborted() {
            brigade.push_eos();
            return Err(ReadError::ConnectionAborted);
        }

        if mode == ReadMode::Init {
            return Ok(());
        }

        self.fill(block);

        let queue = self.distributor.factory_mut();
        if queue.has_error() {
            // TODO: abort the connection once the transport exposes a
            // termination hook.
            warn!("unable to deliver request: stream error at head of queue");
            brigade.push_eos();
            return Err(ReadError::General);
        }

        queue.read(brigade, mode, block, max_bytes)?;
        if !queue.is_data_available() {
            // Drained: report what the transport last said. Bytes already
            // appended to `brigade` stay valid.
            return self.pump.last_status();
        }
        Ok(())
    }
}

/// [`io::Read`] view of an [`InputFilter`].
///
/// End of stream and general failures both end the byte stream; the latter
/// is reported as [`io::ErrorKind::InvalidData`]. A read that makes no
/// progress reports [`io::ErrorKind::WouldBlock`] instead of retrying. Bytes
/// a source delivers beyond the caller's buffer are held for the next read.
#[derive(Debug)]
pub struct HttpReader<'a, S> {
    filter: &'a mut InputFilter<S>,
    block: BlockMode,
    pending: Bytes,
}

impl<S: SpeculativeRead> Read for HttpReader<'_, S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.pending.is_empty() {
            let mut brigade = Brigade::new();
            let result = self
                .filter
                .read(&mut brigade, ReadMode::ReadBytes, self.block, buf.len());
            if brigade.is_empty() {
                return match result {
                    Err(ReadError::Eof) => Ok(0),
                    Err(error) => Err(error.into()),
                    Ok(()) if brigade.is_eos() => Ok(0),
                    Ok(()) => Err(io::ErrorKind::WouldBlock.into()),
                };
            }
            self.pending = brigade.take();
        }
        let len = self.pending.len().min(buf.len());
        buf[..len].copy_from_slice(&self.pending[..len]);
        self.pending.advance(len);
        Ok(len)
    }
}
