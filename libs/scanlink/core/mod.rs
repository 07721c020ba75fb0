//! Building blocks of the connection manager: state, configuration,
//! retry bookkeeping, heartbeat and the WebSocket transport.

pub mod builder;
pub mod config;
pub mod connection_state;
pub mod heartbeat;
pub mod retry;
pub mod ws;

// Re-export main types
pub use builder::ConnectionManagerBuilder;
pub use config::{ConnectionConfig, EventCallbacks, ReconnectSettings};
pub use connection_state::{AtomicConnectionState, AtomicMetrics, ConnectionState};
pub use retry::RetryState;
pub use ws::WsConnector;
