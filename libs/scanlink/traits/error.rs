use thiserror::Error;

/// Main error type for scanlink
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScanLinkError {
    /// Transport could not be opened
    #[error("Failed to open transport: {0}")]
    OpenFailed(String),

    /// Transport-level error while the session was live
    #[error("Transport error: {0}")]
    Transport(String),

    /// Send attempted while the manager is not connected
    #[error("Not connected (state: {0})")]
    NotConnected(String),

    /// The manager task has stopped and no longer accepts commands
    #[error("Connection manager stopped")]
    ManagerStopped,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ScanLinkError {
    /// True for the non-fatal "send while disconnected" rejection
    pub fn is_not_connected(&self) -> bool {
        matches!(self, ScanLinkError::NotConnected(_))
    }
}

/// Result type for scanlink operations
pub type Result<T> = std::result::Result<T, ScanLinkError>;
