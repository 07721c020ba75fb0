use crate::core::config::{ConnectionConfig, EventCallbacks, ReconnectSettings};
use crate::core::ws::WsConnector;
use crate::manager::ConnectionManager;
use crate::traits::*;
use std::sync::Arc;
use std::time::Duration;

/// Builder for [`ConnectionManager`]
///
/// Every field is optional. Without a URL the manager is inert: it can be
/// built and observed but `connect()` does nothing. Without a connector
/// the tokio-tungstenite [`WsConnector`] is used.
pub struct ConnectionManagerBuilder {
    url: Option<String>,
    settings: ReconnectSettings,
    callbacks: EventCallbacks,
    connector: Option<Arc<dyn Connector>>,
    heartbeat: Option<(Duration, Payload)>,
    subscriptions: Vec<Payload>,
}

impl ConnectionManagerBuilder {
    pub fn new() -> Self {
        Self {
            url: None,
            settings: ReconnectSettings::default(),
            callbacks: EventCallbacks::default(),
            connector: None,
            heartbeat: None,
            subscriptions: Vec::new(),
        }
    }

    /// Set the target address (`ws://` or `wss://`)
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Set or clear the target address
    pub fn target(mut self, url: Option<String>) -> Self {
        self.url = url;
        self
    }

    /// Replace all reconnection settings at once
    pub fn settings(mut self, settings: ReconnectSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Enable or disable automatic reconnection
    pub fn reconnect(mut self, enabled: bool) -> Self {
        self.settings.reconnect = enabled;
        self
    }

    pub fn max_reconnect_attempts(mut self, attempts: usize) -> Self {
        self.settings.max_reconnect_attempts = attempts;
        self
    }

    /// Delay before the first retry; truncated to whole milliseconds
    pub fn base_reconnect_interval(mut self, interval: Duration) -> Self {
        self.settings.base_reconnect_interval_ms =
            u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Replace all callbacks at once
    pub fn callbacks(mut self, callbacks: EventCallbacks) -> Self {
        self.callbacks = callbacks;
        self
    }

    pub fn on_open(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.callbacks = self.callbacks.on_open(f);
        self
    }

    pub fn on_close(mut self, f: impl Fn(&CloseReason) + Send + Sync + 'static) -> Self {
        self.callbacks = self.callbacks.on_close(f);
        self
    }

    pub fn on_error(mut self, f: impl Fn(&ScanLinkError) + Send + Sync + 'static) -> Self {
        self.callbacks = self.callbacks.on_error(f);
        self
    }

    pub fn on_message(mut self, f: impl Fn(&Message) + Send + Sync + 'static) -> Self {
        self.callbacks = self.callbacks.on_message(f);
        self
    }

    /// Use a custom transport
    pub fn connector(mut self, connector: impl Connector) -> Self {
        self.connector = Some(Arc::new(connector));
        self
    }

    /// Send `payload` every `interval` while connected
    pub fn heartbeat(mut self, interval: Duration, payload: impl Into<Payload>) -> Self {
        self.heartbeat = Some((interval, payload.into()));
        self
    }

    /// Add a payload to send after every successful open
    pub fn subscription(mut self, payload: impl Into<Payload>) -> Self {
        self.subscriptions.push(payload.into());
        self
    }

    pub fn subscriptions(mut self, payloads: Vec<Payload>) -> Self {
        self.subscriptions.extend(payloads);
        self
    }

    /// Validate and assemble the configuration without starting anything
    pub fn into_config(self) -> Result<ConnectionConfig> {
        self.settings.validate()?;

        if let Some((interval, _)) = &self.heartbeat {
            if interval.is_zero() {
                return Err(ScanLinkError::Configuration(
                    "heartbeat interval must be greater than 0".into(),
                ));
            }
        }

        if let Some(url) = &self.url {
            if !(url.starts_with("ws://") || url.starts_with("wss://")) {
                return Err(ScanLinkError::Configuration(format!(
                    "target must be a ws:// or wss:// address, got '{}'",
                    url
                )));
            }
        }

        let strategy = self.settings.strategy();
        Ok(ConnectionConfig {
            url: self.url,
            settings: self.settings,
            strategy,
            callbacks: self.callbacks,
            connector: self.connector.unwrap_or_else(|| Arc::new(WsConnector)),
            heartbeat: self.heartbeat,
            subscriptions: self.subscriptions,
        })
    }

    /// Build the manager and spawn its task
    ///
    /// Must be called from within a tokio runtime. The manager starts in
    /// `Disconnected`; call `connect()` to open the connection.
    pub fn build(self) -> Result<ConnectionManager> {
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(ScanLinkError::Configuration(
                "ConnectionManager must be built inside a tokio runtime".into(),
            ));
        }
        let config = self.into_config()?;
        Ok(ConnectionManager::new(config))
    }
}

impl Default for ConnectionManagerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
