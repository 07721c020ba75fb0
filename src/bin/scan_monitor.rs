//! Scan monitor
//!
//! Follows one scan's live progress stream (or the user notification feed)
//! over a self-healing WebSocket connection and logs what the backend sends.
//!
//! Usage: `scan_monitor [config.yaml]` (default `$SCAN_MONITOR_CONFIG` or
//! `config/scan_monitor.yaml`). Backend URL and token come from `.env`.

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use vulnscan_live::bin_common::{
    init_tracing, load_config_from_env, parse_args, ConfigType, ShutdownManager,
};
use vulnscan_live::config::{MonitorConfig, StreamKind};
use vulnscan_live::scan_events::{ClientRequest, ScanEvent};
use vulnscan_live::scanlink::{ConnectionEvent, ConnectionManager, Message};

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let config_type = match parse_args().into_iter().next() {
        Some(path) => ConfigType::Custom(path),
        None => ConfigType::Monitor,
    };
    let config_path = load_config_from_env(config_type);
    let config = MonitorConfig::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    init_tracing(&config.log_level);

    info!("═══════════════════════════════════════════════════════");
    info!("  Scan Monitor");
    info!("═══════════════════════════════════════════════════════");
    config.log();

    let mut builder = ConnectionManager::builder()
        .url(config.target_url())
        .settings(config.reconnect.clone())
        .on_open(|| info!("Connected to scan backend"))
        .on_close(|reason| info!("Connection closed: {}", reason))
        .on_error(|e| warn!("Connection error: {}", e));

    if let Some(interval) = config.heartbeat_interval() {
        builder = builder.heartbeat(interval, ClientRequest::Ping.to_payload()?);
    }
    if config.stream == StreamKind::ScanProgress {
        // Ask for a fresh status on every (re)subscription
        builder = builder.subscription(ClientRequest::RequestStatus.to_payload()?);
    }

    let manager = builder
        .build()
        .context("Failed to build connection manager")?;

    // Subscriber channels block on recv; bridge them onto the runtime.
    let events = manager.events();
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    tokio::task::spawn_blocking(move || {
        while let Ok(event) = events.recv() {
            if event_tx.send(event).is_err() {
                break;
            }
        }
    });

    let shutdown = ShutdownManager::new();
    shutdown.spawn_signal_handler();

    manager.connect().context("Failed to start connection")?;
    info!("Press Ctrl+C to stop");

    loop {
        tokio::select! {
            _ = shutdown.wait() => break,
            event = event_rx.recv() => {
                let Some(event) = event else { break };
                if handle_event(&config, event) == Flow::Stop {
                    break;
                }
            }
        }
    }

    let metrics = manager.metrics();
    manager
        .shutdown()
        .await
        .context("Failed to shut down connection manager")?;

    info!("═══════════════════════════════════════════════════════");
    info!("  Messages received: {}", metrics.messages_received);
    info!("  Messages sent: {}", metrics.messages_sent);
    info!("  Reconnects: {}", metrics.reconnect_count);
    info!("═══════════════════════════════════════════════════════");
    info!("Shutdown complete");
    Ok(())
}

fn handle_event(config: &MonitorConfig, event: ConnectionEvent) -> Flow {
    match event {
        ConnectionEvent::StateChanged(state) => {
            debug!("Connection state: {}", state);
            Flow::Continue
        }
        ConnectionEvent::Opened | ConnectionEvent::Closed(_) => Flow::Continue,
        ConnectionEvent::Error(err) => {
            debug!("Transport error event: {}", err);
            Flow::Continue
        }
        ConnectionEvent::RetryScheduled { attempt, delay } => {
            warn!(
                "Reconnecting in {}ms (attempt {}/{})",
                delay.as_millis(),
                attempt,
                config.reconnect.max_reconnect_attempts
            );
            Flow::Continue
        }
        ConnectionEvent::RetriesExhausted { attempts } => {
            error!("Gave up after {} reconnection attempts", attempts);
            Flow::Stop
        }
        ConnectionEvent::Message(message) => handle_message(config, &message),
    }
}

fn handle_message(config: &MonitorConfig, message: &Message) -> Flow {
    let event = match ScanEvent::from_message(message) {
        Ok(event) => event,
        Err(e) => {
            warn!("Undecodable frame ({} bytes): {}", message.payload().len(), e);
            return Flow::Continue;
        }
    };

    if event.is_keepalive() {
        debug!("keep-alive at {}", message.received_at());
        return Flow::Continue;
    }

    match &event {
        ScanEvent::Progress(p) => info!("[{:>5.1}%] {}", p.progress, p.message),
        ScanEvent::StatusChange(change) => info!(
            "Status -> {}{}",
            change.status,
            change
                .message
                .as_deref()
                .map(|m| format!(" ({})", m))
                .unwrap_or_default()
        ),
        ScanEvent::Completed(done) => info!(
            "Scan completed: {} vulnerabilities in {:.1}s",
            done.vulnerability_count, done.duration_seconds
        ),
        ScanEvent::VulnerabilityFound(found) => {
            warn!("[{}] {}", found.severity().to_uppercase(), found.title())
        }
        ScanEvent::SubscriptionConfirmed(ack) | ScanEvent::StatusRequested(ack) => {
            info!("{}", ack.message.as_deref().unwrap_or("acknowledged"))
        }
        ScanEvent::Pong | ScanEvent::Heartbeat => {}
        ScanEvent::Unknown { kind, raw } => info!(
            "{}: {}",
            kind.as_deref().unwrap_or("untyped"),
            raw.get("message").and_then(|m| m.as_str()).unwrap_or("")
        ),
    }

    if config.stream == StreamKind::ScanProgress && event.is_terminal() {
        info!("Scan reached a final state, stopping");
        return Flow::Stop;
    }
    Flow::Continue
}
