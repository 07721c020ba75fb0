//! Live scan monitoring - Main Library
//!
//! Thin consumer of the `scanlink` connection library: it turns a YAML
//! config into a connection manager pointed at the scan backend, and decodes
//! the JSON frames that backend pushes.
//!
//! ## Architecture
//!
//! - **bin_common**: Common utilities for binary executables (CLI, logging, shutdown)
//! - **config**: `MonitorConfig` loading, env overrides and validation
//! - **scan_events**: Typed view of the backend's scan messages
//! - **scanlink**: Resilient WebSocket connection manager (re-exported from workspace)
//!
//! ## Usage in Binaries
//!
//! ```rust,no_run
//! use vulnscan_live::bin_common::{load_config_from_env, ConfigType};
//! use vulnscan_live::config::MonitorConfig;
//!
//! let path = load_config_from_env(ConfigType::Monitor);
//! let config = MonitorConfig::load(path);
//! ```

// Re-export workspace libraries for convenience
pub use scanlink;

pub mod config;
pub mod scan_events;

// Binary common utilities
pub mod bin_common {
    //! Common utilities for binary executables

    pub mod cli;
    pub mod logging;
    pub mod shutdown;

    pub use cli::{load_config_from_env, parse_args, ConfigType};
    pub use logging::init_tracing;
    pub use shutdown::ShutdownManager;
}
