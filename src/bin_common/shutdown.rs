//! Graceful shutdown handling
//!
//! Bridges Ctrl+C into a flag plus a notification the main loop can await.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{error, info, warn};

/// Shutdown manager for coordinating graceful shutdown
pub struct ShutdownManager {
    running: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl ShutdownManager {
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(true)),
            notify: Arc::new(Notify::new()),
        }
    }

    /// Spawn a task that trips the flag on Ctrl+C
    pub fn spawn_signal_handler(&self) {
        let running = Arc::clone(&self.running);
        let notify = Arc::clone(&self.notify);

        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    warn!("");
                    warn!("Shutdown signal received (Ctrl+C)");
                    info!("Initiating graceful shutdown...");
                }
                Err(e) => {
                    error!("Failed to listen for shutdown signal: {}", e);
                }
            }
            running.store(false, Ordering::Release);
            notify.notify_waiters();
        });
    }

    /// Check if the application should continue running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Request shutdown without a signal
    pub fn trigger(&self) {
        self.running.store(false, Ordering::Release);
        self.notify.notify_waiters();
    }

    /// Resolve once shutdown has been requested
    pub async fn wait(&self) {
        let notified = self.notify.notified();
        if !self.is_running() {
            return;
        }
        notified.await;
    }

    /// Get a clone of the running flag
    pub fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }
}

impl Default for ShutdownManager {
    fn default() -> Self {
        Self::new()
    }
}
