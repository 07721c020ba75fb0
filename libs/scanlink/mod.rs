//! # ScanLink
//!
//! Resilient live-connection client for the vulnerability-scanning
//! dashboard. One [`ConnectionManager`] owns one WebSocket to the backend,
//! keeps it open, and recovers it with exponential backoff, while callers
//! only see connection state, incoming messages and a `send` call.
//!
//! ## Features
//!
//! - **Serialized transitions**: One task processes every lifecycle event in order
//! - **Deterministic backoff**: `base * 2^attempt`, no jitter, bounded attempts
//! - **Race-free cancellation**: `disconnect()` invalidates pending retries synchronously
//! - **Pluggable transport**: tokio-tungstenite by default, any [`Connector`] in tests
//! - **Lock-free observation**: Atomic state and metrics, crossbeam event channels

pub mod core;
pub mod manager;
pub mod traits;

// Re-export all traits
pub use traits::*;

// Re-export core functionality
pub use crate::core::{
    builder, config, connection_state, heartbeat, retry, ws,
    builder::ConnectionManagerBuilder,
    config::{ConnectionConfig, EventCallbacks, ReconnectSettings},
    connection_state::{AtomicConnectionState, AtomicMetrics, ConnectionState},
    retry::RetryState,
    ws::WsConnector,
};

// Re-export manager
pub use manager::{ConnectionEvent, ConnectionManager, Metrics};
