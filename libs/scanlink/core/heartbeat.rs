//! Heartbeat for live sessions
//!
//! The scan backend drops clients that stay silent for 30 seconds, so the
//! manager can be configured to send a keep-alive payload on a fixed
//! interval while it is connected.
//!
//! The heartbeat task never touches the session. Every tick it calls back
//! into the manager (which posts a tick event to its own queue) and the
//! manager decides whether the session it was started for is still live.

use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

/// Spawn a heartbeat ticker
///
/// The first tick happens one full `interval` after spawning. The task
/// exits as soon as `tick` returns `false`; abort the handle to stop it
/// earlier.
pub fn spawn_heartbeat<F>(interval: Duration, mut tick: F) -> JoinHandle<()>
where
    F: FnMut() -> bool + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // Skip the first immediate tick
        ticker.tick().await;
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        debug!("Heartbeat task started with interval: {:?}", interval);

        loop {
            ticker.tick().await;
            if !tick() {
                debug!("Heartbeat receiver gone, stopping");
                break;
            }
        }
    })
}
