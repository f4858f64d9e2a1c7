//! Connection-scoped negotiation signal and the protocol detection gate.
//!
//! The transport (typically a TLS layer running NPN or ALPN) records whether
//! the peer agreed to speak SPDY in a [`ConnectionContext`]. The filter only
//! reads it, through a [`DetectionGate`] that settles once per connection.

use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicU8, Ordering},
};

use log::{debug, warn};

use crate::{error::ReadError, source::SpeculativeRead};

/// Outcome of protocol negotiation as reported by the transport.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum NegotiationState {
    /// The handshake has not finished.
    #[default]
    NotDoneYet = 0,
    /// The peer negotiated SPDY.
    UsingSpdy = 1,
    /// The peer negotiated something else, or nothing.
    NotUsingSpdy = 2,
}

impl NegotiationState {
    const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::UsingSpdy,
            2 => Self::NotUsingSpdy,
            _ => Self::NotDoneYet,
        }
    }
}

/// Per-connection state shared between the transport and the filter.
///
/// Clones share the same underlying values, so the transport may keep one
/// handle and update it from another thread.
#[derive(Clone, Debug, Default)]
pub struct ConnectionContext {
    negotiation: Arc<AtomicU8>,
    aborted: Arc<AtomicBool>,
}

impl ConnectionContext {
    /// Create a context with negotiation pending.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Create a context whose negotiation already finished with `state`.
    #[must_use]
    pub fn with_state(state: NegotiationState) -> Self {
        let ctx = Self::new();
        ctx.set_negotiation_state(state);
        ctx
    }

    /// Current negotiation outcome.
    #[must_use]
    pub fn negotiation_state(&self) -> NegotiationState {
        NegotiationState::from_u8(self.negotiation.load(Ordering::Acquire))
    }

    /// Record the negotiation outcome.
    pub fn set_negotiation_state(&self, state: NegotiationState) {
        self.negotiation.store(state as u8, Ordering::Release);
    }

    /// Whether the connection was aborted.
    #[must_use]
    pub fn is_aborted(&self) -> bool { self.aborted.load(Ordering::Acquire) }

    /// Mark the connection aborted.
    pub fn abort(&self) { self.aborted.store(true, Ordering::Release); }
}

/// Whether the multiplexing pipeline is engaged for a connection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Detection {
    /// Negotiation has not been observed yet.
    #[default]
    Undetermined,
    /// Frames are demultiplexed.
    UsingProtocol,
    /// Bytes pass straight through.
    NotUsingProtocol,
}

/// Settles [`Detection`] once per connection.
#[derive(Debug, Default)]
pub struct DetectionGate {
    state: Detection,
    negotiation_unsupported: bool,
}

impl DetectionGate {
    /// Create an undetermined gate.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Current detection state.
    #[must_use]
    pub const fn state(&self) -> Detection { self.state }

    /// Whether the gate fell back to pass-through because negotiation never
    /// finished.
    #[must_use]
    pub const fn negotiation_unsupported(&self) -> bool { self.negotiation_unsupported }

    /// Settle the gate if it is still undetermined.
    ///
    /// A pending negotiation is pushed forward with a non-consuming probe of
    /// `source`. If it still has not finished afterwards, the transport is
    /// assumed not to support negotiation and the connection falls back to
    /// pass-through.
    ///
    /// # Errors
    ///
    /// Returns the probe's status when it fails; the gate stays undetermined
    /// and retries on the next call.
    pub fn resolve<S>(
        &mut self,
        ctx: &ConnectionContext,
        source: &mut S,
    ) -> Result<Detection, ReadError>
    where
        S: SpeculativeRead + ?Sized,
    {
        if self.state != Detection::Undetermined {
            return Ok(self.state);
        }
        if ctx.negotiation_state() == NegotiationState::NotDoneYet {
            source.probe()?;
        }
        self.state = match ctx.negotiation_state() {
            NegotiationState::UsingSpdy => Detection::UsingProtocol,
            NegotiationState::NotUsingSpdy => Detection::NotUsingProtocol,
            NegotiationState::NotDoneYet => {
                warn!("NPN never finished; does the transport support NPN?");
                self.negotiation_unsupported = true;
                ctx.set_negotiation_state(NegotiationState::NotUsingSpdy);
                Detection::NotUsingProtocol
            }
        };
        debug!("protocol detection settled: {:?}", self.state);
        Ok(self.state)
    }
}
