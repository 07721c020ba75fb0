//! # ScanLink Traits
//!
//! Contracts shared by the connection manager and its collaborators:
//!
//! - **ScanLinkError**: Error taxonomy for the live connection
//! - **Payload / Message**: Opaque content and received messages
//! - **ReconnectionStrategy**: Backoff policy for automatic retries
//! - **Connector / SessionSink / SessionStream**: Pluggable transport

pub mod error;
pub mod payload;
pub mod reconnect;
pub mod transport;

// Re-export commonly used types
pub use error::{Result, ScanLinkError};
pub use payload::{Message, Payload};
pub use reconnect::{should_retry, ExponentialBackoff, NeverReconnect, ReconnectionStrategy};
pub use transport::{
    CloseReason, Connector, SessionHalves, SessionSink, SessionStream, TransportEvent,
    ABNORMAL_CLOSURE, NORMAL_CLOSURE,
};
