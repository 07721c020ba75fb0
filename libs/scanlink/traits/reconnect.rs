use std::time::Duration;

/// Trait for defining reconnection strategies
///
/// A strategy is a pure policy: given how many retries have already
/// been made, it says whether another one is allowed and how long
/// to wait before it. It never touches the connection itself.
pub trait ReconnectionStrategy: Send + Sync {
    /// Get the delay before the next reconnection attempt
    ///
    /// # Arguments
    /// * `attempt` - The reconnection attempt index (0 for the first retry)
    ///
    /// # Returns
    /// * `Some(duration)` - Wait this long before reconnecting
    /// * `None` - Stop reconnecting
    fn next_delay(&self, attempt: usize) -> Option<Duration>;

    /// Check if we should continue reconnecting
    ///
    /// # Arguments
    /// * `attempt` - Number of retries already made
    fn should_reconnect(&self, attempt: usize) -> bool;
}

/// Exponential backoff reconnection strategy
///
/// Delays between reconnection attempts grow exponentially:
/// `base_interval * 2^attempt`. No jitter and no cap, so retry timing
/// is reproducible in tests and logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExponentialBackoff {
    base_interval: Duration,
    max_attempts: usize,
}

impl ExponentialBackoff {
    /// Create a new exponential backoff strategy
    ///
    /// # Arguments
    /// * `base_interval` - Delay before the first retry
    /// * `max_attempts` - Ceiling on retries; 0 disables retrying entirely
    pub fn new(base_interval: Duration, max_attempts: usize) -> Self {
        Self {
            base_interval,
            max_attempts,
        }
    }

    pub fn base_interval(&self) -> Duration {
        self.base_interval
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// Raw delay for an attempt index, ignoring the attempt ceiling
    ///
    /// Saturates at `u64::MAX` milliseconds instead of overflowing.
    pub fn delay_for(&self, attempt: usize) -> Duration {
        let base_ms = u64::try_from(self.base_interval.as_millis()).unwrap_or(u64::MAX);
        let factor = u32::try_from(attempt)
            .ok()
            .and_then(|exp| 2u64.checked_pow(exp))
            .unwrap_or(u64::MAX);
        Duration::from_millis(base_ms.saturating_mul(factor))
    }
}

impl ReconnectionStrategy for ExponentialBackoff {
    fn next_delay(&self, attempt: usize) -> Option<Duration> {
        if !self.should_reconnect(attempt) {
            return None;
        }
        Some(self.delay_for(attempt))
    }

    fn should_reconnect(&self, attempt: usize) -> bool {
        attempt < self.max_attempts
    }
}

/// Never reconnect strategy
///
/// Used when automatic reconnection is switched off in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NeverReconnect;

impl ReconnectionStrategy for NeverReconnect {
    fn next_delay(&self, _attempt: usize) -> Option<Duration> {
        None
    }

    fn should_reconnect(&self, _attempt: usize) -> bool {
        false
    }
}

/// Combined retry gate: caller intent plus strategy ceiling
#[inline]
pub fn should_retry(
    strategy: &dyn ReconnectionStrategy,
    reconnect_enabled: bool,
    attempts_made: usize,
) -> bool {
    reconnect_enabled && strategy.should_reconnect(attempts_made)
}
