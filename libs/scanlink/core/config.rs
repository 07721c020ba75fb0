use crate::traits::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Reconnection policy knobs
///
/// Plain data so it can be embedded in application config files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectSettings {
    /// Whether abnormal closures trigger automatic retries at all
    pub reconnect: bool,
    /// Ceiling on consecutive automatic retries
    pub max_reconnect_attempts: usize,
    /// Delay before the first retry; doubles on every subsequent one
    pub base_reconnect_interval_ms: u64,
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            reconnect: true,
            max_reconnect_attempts: 5,
            base_reconnect_interval_ms: 1000,
        }
    }
}

impl ReconnectSettings {
    pub fn validate(&self) -> Result<()> {
        if self.base_reconnect_interval_ms == 0 {
            return Err(ScanLinkError::Configuration(
                "base_reconnect_interval_ms must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    pub fn base_interval(&self) -> Duration {
        Duration::from_millis(self.base_reconnect_interval_ms)
    }

    /// Build the backoff policy these settings describe
    pub fn strategy(&self) -> Box<dyn ReconnectionStrategy> {
        if self.reconnect {
            Box::new(ExponentialBackoff::new(
                self.base_interval(),
                self.max_reconnect_attempts,
            ))
        } else {
            Box::new(NeverReconnect)
        }
    }
}

pub type OpenCallback = Arc<dyn Fn() + Send + Sync>;
pub type CloseCallback = Arc<dyn Fn(&CloseReason) + Send + Sync>;
pub type ErrorCallback = Arc<dyn Fn(&ScanLinkError) + Send + Sync>;
pub type MessageCallback = Arc<dyn Fn(&Message) + Send + Sync>;

/// Optional lifecycle callbacks, fixed at construction
///
/// All callbacks run on the manager task, one at a time, in the order
/// the underlying events occurred. Keep them short; a slow callback
/// delays every later transition.
#[derive(Clone, Default)]
pub struct EventCallbacks {
    pub(crate) on_open: Option<OpenCallback>,
    pub(crate) on_close: Option<CloseCallback>,
    pub(crate) on_error: Option<ErrorCallback>,
    pub(crate) on_message: Option<MessageCallback>,
}

impl EventCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_open(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_open = Some(Arc::new(f));
        self
    }

    pub fn on_close(mut self, f: impl Fn(&CloseReason) + Send + Sync + 'static) -> Self {
        self.on_close = Some(Arc::new(f));
        self
    }

    pub fn on_error(mut self, f: impl Fn(&ScanLinkError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    pub fn on_message(mut self, f: impl Fn(&Message) + Send + Sync + 'static) -> Self {
        self.on_message = Some(Arc::new(f));
        self
    }
}

impl fmt::Debug for EventCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventCallbacks")
            .field("on_open", &self.on_open.is_some())
            .field("on_close", &self.on_close.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("on_message", &self.on_message.is_some())
            .finish()
    }
}

/// Configuration for a [`ConnectionManager`](crate::core::manager::ConnectionManager)
///
/// Immutable for the lifetime of a manager. To change the target or the
/// policy, dispose of the manager and build a new one.
pub struct ConnectionConfig {
    /// Target address; `None` means "do not connect"
    pub(crate) url: Option<String>,

    /// Reconnection policy
    pub(crate) settings: ReconnectSettings,

    /// Backoff derived from `settings`
    pub(crate) strategy: Box<dyn ReconnectionStrategy>,

    /// Lifecycle callbacks
    pub(crate) callbacks: EventCallbacks,

    /// Transport factory
    pub(crate) connector: Arc<dyn Connector>,

    /// Optional heartbeat (interval, payload) sent while connected
    pub(crate) heartbeat: Option<(Duration, Payload)>,

    /// Payloads re-sent after every successful open
    pub(crate) subscriptions: Vec<Payload>,
}

impl ConnectionConfig {
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn settings(&self) -> &ReconnectSettings {
        &self.settings
    }

    pub fn has_heartbeat(&self) -> bool {
        self.heartbeat.is_some()
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("url", &self.url)
            .field("settings", &self.settings)
            .field("callbacks", &self.callbacks)
            .field("heartbeat", &self.heartbeat)
            .field("subscriptions", &self.subscriptions.len())
            .finish()
    }
}
