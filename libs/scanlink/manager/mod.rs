//! # Connection Manager
//!
//! Owns one live connection: opens it, tracks its state, and recovers it
//! with exponential backoff when it drops. Callers get a small handle
//! (connect / disconnect / reconnect / send) plus observable state, while
//! every transition runs on a single task in arrival order.

mod actor;
pub mod manager;

pub use manager::{ConnectionEvent, ConnectionManager, Metrics};
