//! Integration test: Configuration loading
//!
//! Tests the bin_common path lookup and `MonitorConfig` loading.

use vulnscan_live::bin_common::{load_config_from_env, ConfigType};
use vulnscan_live::config::{ConfigError, MonitorConfig, StreamKind, WS_TOKEN_ENV, WS_URL_ENV};
use std::env;
use std::path::PathBuf;

fn write_temp(name: &str, contents: &str) -> PathBuf {
    let path = env::temp_dir().join(format!("vulnscan_live_{}_{}.yaml", name, std::process::id()));
    std::fs::write(&path, contents).unwrap();
    path
}

#[test]
fn test_monitor_config_default() {
    // Clear env var to test default
    env::remove_var("SCAN_MONITOR_CONFIG");

    let config_path = load_config_from_env(ConfigType::Monitor);
    assert_eq!(config_path.to_str().unwrap(), "config/scan_monitor.yaml");
}

#[test]
fn test_custom_config() {
    let custom = ConfigType::Custom("custom/path.yaml".to_string());
    let config_path = load_config_from_env(custom);

    assert_eq!(config_path.to_str().unwrap(), "custom/path.yaml");
}

#[test]
fn test_shipped_config_parses() {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("config/scan_monitor.yaml");
    let config = MonitorConfig::load(path).unwrap();

    assert_eq!(config.stream, StreamKind::ScanProgress);
    assert!(config.reconnect.reconnect);
    assert_eq!(config.reconnect.max_reconnect_attempts, 5);
    assert_eq!(config.reconnect.base_reconnect_interval_ms, 1000);
    assert_eq!(config.heartbeat_interval_secs, Some(20));
}

#[test]
fn test_defaults_fill_missing_sections() {
    let path = write_temp(
        "minimal",
        r#"
backend:
  ws_base_url: "ws://localhost:8000"
stream: notifications
"#,
    );
    let config = MonitorConfig::load(&path).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(config.stream, StreamKind::Notifications);
    assert!(config.reconnect.reconnect);
    assert_eq!(config.reconnect.max_reconnect_attempts, 5);
    assert_eq!(config.reconnect.base_reconnect_interval_ms, 1000);
    assert_eq!(config.heartbeat_interval_secs, Some(20));
    assert_eq!(config.log_level, "info");
}

#[test]
fn test_heartbeat_can_be_disabled() {
    let config = MonitorConfig::from_yaml(
        r#"
backend:
  ws_base_url: "ws://localhost:8000"
stream: notifications
heartbeat_interval_secs: null
"#,
    )
    .unwrap();
    assert_eq!(config.heartbeat_interval(), None);
}

#[test]
fn test_zero_base_interval_rejected() {
    let err = MonitorConfig::from_yaml(
        r#"
backend:
  ws_base_url: "ws://localhost:8000"
stream: notifications
reconnect:
  base_reconnect_interval_ms: 0
"#,
    )
    .unwrap_err();
    assert!(matches!(err, ConfigError::ValidationError(_)));
}

#[test]
fn test_missing_scan_id_rejected() {
    let err = MonitorConfig::from_yaml(
        r#"
backend:
  ws_base_url: "ws://localhost:8000"
stream: scan_progress
"#,
    )
    .unwrap_err();
    assert!(matches!(err, ConfigError::ValidationError(_)));
}

#[test]
fn test_missing_file_and_bad_yaml() {
    let err = MonitorConfig::load("does/not/exist.yaml").unwrap_err();
    assert!(matches!(err, ConfigError::FileError(_)));

    let err = MonitorConfig::from_yaml("backend: [").unwrap_err();
    assert!(matches!(err, ConfigError::YamlError(_)));
}

#[test]
fn test_env_overrides_url_and_token() {
    env::set_var(WS_URL_ENV, "wss://scans.example.com");
    env::set_var(WS_TOKEN_ENV, "secret");

    let config = MonitorConfig::from_yaml(
        r#"
backend:
  ws_base_url: "ws://localhost:8000"
scan_id: "scan-1"
"#,
    );

    env::remove_var(WS_URL_ENV);
    env::remove_var(WS_TOKEN_ENV);

    let config = config.unwrap();
    assert_eq!(config.backend.ws_base_url, "wss://scans.example.com");
    assert_eq!(config.backend.token.as_deref(), Some("secret"));
    assert_eq!(
        config.target_url(),
        "wss://scans.example.com/api/v1/ws/scan-progress/scan-1?token=secret"
    );
}
