//! Transport seam
//!
//! The manager never talks to a socket directly. It asks a [`Connector`]
//! for a session, gets back a write half and a read half, and from then on
//! only deals in [`Payload`]s and [`TransportEvent`]s. The production
//! connector lives in `core::ws`; tests plug in scripted ones.

use crate::error::Result;
use crate::payload::Payload;
use async_trait::async_trait;
use std::fmt;

/// Close code for a closure the local side asked for
pub const NORMAL_CLOSURE: u16 = 1000;

/// Close code used when the transport vanished without a close frame
pub const ABNORMAL_CLOSURE: u16 = 1006;

/// Why a session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseReason {
    pub code: u16,
    pub reason: String,
}

impl CloseReason {
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    /// The reason attached to every caller-initiated close
    pub fn normal() -> Self {
        Self::new(NORMAL_CLOSURE, "client disconnect")
    }

    pub fn abnormal(reason: impl Into<String>) -> Self {
        Self::new(ABNORMAL_CLOSURE, reason)
    }

    #[inline]
    pub fn is_normal(&self) -> bool {
        self.code == NORMAL_CLOSURE
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.reason.is_empty() {
            write!(f, "{}", self.code)
        } else {
            write!(f, "{} ({})", self.code, self.reason)
        }
    }
}

/// Lifecycle and data events read from a live session
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// The peer acknowledged the session; it may now carry traffic
    Opened,
    /// Application payload from the peer
    Message(Payload),
    /// Transport-level error; observational, a close is expected to follow
    Error(String),
    /// The session closed
    Closed(CloseReason),
}

/// Write half of a session
#[async_trait]
pub trait SessionSink: Send + 'static {
    async fn send(&mut self, payload: Payload) -> Result<()>;

    async fn close(&mut self, reason: CloseReason) -> Result<()>;
}

/// Read half of a session
///
/// A healthy session yields `Opened` first. A session that dies during
/// the handshake may yield `Closed` (or just end) without ever opening.
#[async_trait]
pub trait SessionStream: Send + 'static {
    /// Next event, or `None` once the stream has ended
    async fn next_event(&mut self) -> Option<TransportEvent>;
}

/// Both halves of a freshly opened session
pub type SessionHalves = (Box<dyn SessionSink>, Box<dyn SessionStream>);

/// Opens sessions to a target address
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn open(&self, url: &str) -> Result<SessionHalves>;
}
