//! Retry bookkeeping
//!
//! [`RetryState`] is shared with the public handle so callers can observe
//! it; only manager code mutates it. [`PendingRetryTimer`] is owned by the
//! manager task and guarantees at most one outstanding retry.
//!
//! Cancellation is epoch based. Every scheduled timer carries the epoch it
//! was armed with, and a fire is honoured only while that epoch is still
//! current. Bumping the epoch (which the public handle can do from any
//! thread, without waiting for the manager task) invalidates a timer that
//! has already elapsed but whose fire is still queued.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

/// Retry counters for one manager instance
#[derive(Debug)]
pub struct RetryState {
    attempts_made: AtomicUsize,
    reconnect_enabled: AtomicBool,
}

impl Default for RetryState {
    fn default() -> Self {
        Self {
            attempts_made: AtomicUsize::new(0),
            reconnect_enabled: AtomicBool::new(true),
        }
    }
}

impl RetryState {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn attempts_made(&self) -> usize {
        self.attempts_made.load(Ordering::Acquire)
    }

    #[inline]
    pub fn reconnect_enabled(&self) -> bool {
        self.reconnect_enabled.load(Ordering::Acquire)
    }

    pub(crate) fn set_reconnect_enabled(&self, enabled: bool) {
        self.reconnect_enabled.store(enabled, Ordering::Release);
    }

    /// Returns the attempt index used for the delay, then counts it
    pub(crate) fn record_attempt(&self) -> usize {
        self.attempts_made.fetch_add(1, Ordering::AcqRel)
    }

    pub(crate) fn reset_attempts(&self) {
        self.attempts_made.store(0, Ordering::Release);
    }
}

/// Cancels retries from outside the manager task
#[derive(Debug, Clone)]
pub(crate) struct RetryCanceller {
    epoch: Arc<AtomicU64>,
}

impl RetryCanceller {
    /// Invalidate whatever timer is currently armed
    pub(crate) fn cancel(&self) {
        self.epoch.fetch_add(1, Ordering::AcqRel);
    }
}

/// The single outstanding retry timer
#[derive(Debug)]
pub(crate) struct PendingRetryTimer {
    epoch: Arc<AtomicU64>,
    handle: Option<JoinHandle<()>>,
}

impl PendingRetryTimer {
    pub(crate) fn new() -> Self {
        Self {
            epoch: Arc::new(AtomicU64::new(0)),
            handle: None,
        }
    }

    pub(crate) fn canceller(&self) -> RetryCanceller {
        RetryCanceller {
            epoch: Arc::clone(&self.epoch),
        }
    }

    /// Arm a timer, superseding any previous one
    ///
    /// `fire` runs on a spawned task once `delay` has elapsed and receives
    /// the epoch to hand back to [`is_current`](Self::is_current).
    pub(crate) fn schedule<F>(&mut self, delay: Duration, fire: F) -> u64
    where
        F: FnOnce(u64) + Send + 'static,
    {
        self.cancel();
        let epoch = self.epoch.load(Ordering::Acquire);

        self.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            fire(epoch);
        }));

        debug!("Retry timer armed for {:?} (epoch {})", delay, epoch);
        epoch
    }

    #[inline]
    pub(crate) fn is_current(&self, epoch: u64) -> bool {
        self.handle.is_some() && self.epoch.load(Ordering::Acquire) == epoch
    }

    /// The timer fired and its fire was accepted
    pub(crate) fn settle(&mut self) {
        self.handle = None;
        self.epoch.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn cancel(&mut self) -> bool {
        self.epoch.fetch_add(1, Ordering::AcqRel);
        match self.handle.take() {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    #[cfg(test)]
    pub(crate) fn is_pending(&self) -> bool {
        self.handle.as_ref().map_or(false, |h| !h.is_finished())
    }
}

impl Drop for PendingRetryTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
