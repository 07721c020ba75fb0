//! Scan monitor configuration
//!
//! YAML file for the stable knobs, environment for the endpoint and the
//! credentials (`SCAN_WS_URL`, `SCAN_WS_TOKEN`, usually supplied via `.env`).

use scanlink::ReconnectSettings;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

pub const WS_URL_ENV: &str = "SCAN_WS_URL";
pub const WS_TOKEN_ENV: &str = "SCAN_WS_TOKEN";

const SCAN_PROGRESS_PATH: &str = "/api/v1/ws/scan-progress";
const NOTIFICATIONS_PATH: &str = "/api/v1/ws/notifications";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config file: {0}")]
    FileError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Which backend stream to follow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    /// Progress of a single scan (needs `scan_id`)
    #[default]
    ScanProgress,
    /// Per-user notification feed
    Notifications,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base WebSocket URL of the scan backend, e.g. `ws://localhost:8000`
    pub ws_base_url: String,

    /// Access token from .env (not in YAML)
    #[serde(skip)]
    pub token: Option<String>,
}

/// Scan monitor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    pub backend: BackendConfig,
    #[serde(default)]
    pub stream: StreamKind,
    #[serde(default)]
    pub scan_id: Option<String>,
    #[serde(default)]
    pub reconnect: ReconnectSettings,
    /// Seconds between `ping` frames while connected; omit to disable
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_secs: Option<u64>,
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_heartbeat_interval() -> Option<u64> {
    // Backend drops clients idle for 30s.
    Some(20)
}

fn default_log_level() -> String {
    "info".to_string()
}

impl MonitorConfig {
    /// Load configuration from YAML file
    pub fn load(config_path: impl AsRef<Path>) -> Result<Self> {
        let yaml_content = std::fs::read_to_string(config_path)?;
        Self::from_yaml(&yaml_content)
    }

    /// Parse, apply environment overrides, validate
    pub fn from_yaml(yaml_content: &str) -> Result<Self> {
        let mut config: MonitorConfig = serde_yaml::from_str(yaml_content)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var(WS_URL_ENV) {
            info!("Overriding backend URL from environment variable");
            self.backend.ws_base_url = url;
        }
        if let Ok(token) = std::env::var(WS_TOKEN_ENV) {
            if !token.is_empty() {
                self.backend.token = Some(token);
            }
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let base = self.backend.ws_base_url.as_str();
        if !(base.starts_with("ws://") || base.starts_with("wss://")) {
            return Err(ConfigError::ValidationError(format!(
                "backend.ws_base_url must start with ws:// or wss:// (got '{}')",
                base
            )));
        }

        self.reconnect
            .validate()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;

        if self.heartbeat_interval_secs == Some(0) {
            return Err(ConfigError::ValidationError(
                "heartbeat_interval_secs must be greater than 0".to_string(),
            ));
        }

        if self.stream == StreamKind::ScanProgress
            && self.scan_id.as_deref().map_or(true, str::is_empty)
        {
            return Err(ConfigError::ValidationError(
                "scan_id is required for the scan_progress stream".to_string(),
            ));
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "log_level must be one of: {}",
                valid_levels.join(", ")
            )));
        }

        Ok(())
    }

    /// Full endpoint URL for the configured stream, token included
    pub fn target_url(&self) -> String {
        let base = self.backend.ws_base_url.trim_end_matches('/');
        let mut url = match self.stream {
            StreamKind::ScanProgress => format!(
                "{}{}/{}",
                base,
                SCAN_PROGRESS_PATH,
                self.scan_id.as_deref().unwrap_or_default()
            ),
            StreamKind::Notifications => format!("{}{}", base, NOTIFICATIONS_PATH),
        };
        if let Some(token) = &self.backend.token {
            url.push_str("?token=");
            url.push_str(token);
        }
        url
    }

    pub fn heartbeat_interval(&self) -> Option<Duration> {
        self.heartbeat_interval_secs.map(Duration::from_secs)
    }

    /// Log configuration summary
    pub fn log(&self) {
        info!("Configuration loaded:");
        info!("  Backend: {}", self.backend.ws_base_url);
        info!("  Stream: {:?}", self.stream);
        if let Some(scan_id) = &self.scan_id {
            info!("  Scan id: {}", scan_id);
        }
        info!(
            "  Token: {}",
            if self.backend.token.is_some() { "set" } else { "not set" }
        );
        info!(
            "  Reconnect: {} (max {} attempts, base {}ms)",
            self.reconnect.reconnect,
            self.reconnect.max_reconnect_attempts,
            self.reconnect.base_reconnect_interval_ms
        );
        match self.heartbeat_interval_secs {
            Some(secs) => info!("  Heartbeat: every {}s", secs),
            None => info!("  Heartbeat: disabled"),
        }
        info!("  Log level: {}", self.log_level);
    }
}
