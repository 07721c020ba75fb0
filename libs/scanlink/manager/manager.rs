use super::actor::{Actor, Command, Event};
use crate::core::builder::ConnectionManagerBuilder;
use crate::core::config::ConnectionConfig;
use crate::core::connection_state::{AtomicConnectionState, AtomicMetrics, ConnectionState};
use crate::core::retry::{PendingRetryTimer, RetryCanceller, RetryState};
use crate::traits::{CloseReason, Message, Payload, Result, ScanLinkError};
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Notifications delivered to subscribers, in the order they happened
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    /// The connection moved to a new state
    StateChanged(ConnectionState),
    /// The peer acknowledged the session
    Opened,
    /// The session ended
    Closed(CloseReason),
    /// A transport error was observed
    Error(String),
    /// A message arrived
    Message(Message),
    /// An automatic retry was armed (attempt is 1-based)
    RetryScheduled { attempt: usize, delay: Duration },
    /// The attempt ceiling was hit; no further automatic retries
    RetriesExhausted { attempts: usize },
}

/// Connection metrics snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metrics {
    pub messages_sent: u64,
    pub messages_received: u64,
    pub reconnect_count: u64,
    pub connection_state: ConnectionState,
}

/// State shared between the public handle and the manager task
///
/// Readers never block on the task. Writes happen on the task, except
/// for the cancellation flags the handle flips synchronously.
pub(crate) struct Shared {
    pub(crate) state: AtomicConnectionState,
    pub(crate) metrics: AtomicMetrics,
    pub(crate) retry: RetryState,
    pub(crate) last_message: RwLock<Option<Message>>,
    subscribers: Mutex<Vec<Sender<ConnectionEvent>>>,
    disposed: AtomicBool,
    /// Disconnects issued by the handle that the task has not finished yet
    pending_teardowns: AtomicUsize,
}

impl Shared {
    fn new() -> Self {
        Self {
            state: AtomicConnectionState::new(ConnectionState::Disconnected),
            metrics: AtomicMetrics::new(),
            retry: RetryState::new(),
            last_message: RwLock::new(None),
            subscribers: Mutex::new(Vec::new()),
            disposed: AtomicBool::new(false),
            pending_teardowns: AtomicUsize::new(0),
        }
    }

    /// State as callers see it
    ///
    /// Reads `Disconnected` from the moment `disconnect()`/`reconnect()`
    /// returns, even before the task has torn the session down.
    pub(crate) fn observed_state(&self) -> ConnectionState {
        if self.pending_teardowns.load(Ordering::Acquire) > 0 {
            ConnectionState::Disconnected
        } else {
            self.state.get()
        }
    }

    fn begin_teardown(&self) {
        self.pending_teardowns.fetch_add(1, Ordering::AcqRel);
    }

    /// Called by the task once a queued teardown has been applied
    pub(crate) fn finish_teardown(&self) {
        let _ = self
            .pending_teardowns
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }

    #[inline]
    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Fan an event out to every live subscriber, dropping closed ones
    pub(crate) fn publish(&self, event: ConnectionEvent) {
        if self.is_disposed() {
            return;
        }
        self.subscribers
            .lock()
            .retain(|tx| tx.send(event.clone()).is_ok());
    }
}

/// Resilient live connection to a single target
///
/// Cheap, non-blocking operations on the caller side; all lifecycle work
/// happens on a dedicated tokio task that processes one event at a time.
///
/// # Example
/// ```ignore
/// let manager = ConnectionManager::builder()
///     .url("ws://localhost:8000/api/v1/ws/notifications?token=...")
///     .max_reconnect_attempts(5)
///     .base_reconnect_interval(Duration::from_secs(1))
///     .on_message(|msg| println!("{:?}", msg.payload()))
///     .build()?;
///
/// manager.connect()?;
/// ```
pub struct ConnectionManager {
    shared: Arc<Shared>,
    event_tx: mpsc::UnboundedSender<Event>,
    canceller: RetryCanceller,
    task_handle: Option<JoinHandle<()>>,
    url: Option<String>,
}

impl ConnectionManager {
    /// Start building a manager
    pub fn builder() -> ConnectionManagerBuilder {
        ConnectionManagerBuilder::new()
    }

    /// Spawn the manager task. Must run inside a tokio runtime.
    pub(crate) fn new(config: ConnectionConfig) -> Self {
        let shared = Arc::new(Shared::new());
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let timer = PendingRetryTimer::new();
        let canceller = timer.canceller();
        let url = config.url.clone();

        let actor = Actor::new(config, Arc::clone(&shared), event_tx.clone(), timer);
        let task_handle = tokio::spawn(actor.run(event_rx));

        Self {
            shared,
            event_tx,
            canceller,
            task_handle: Some(task_handle),
            url,
        }
    }

    fn post(&self, command: Command) -> Result<()> {
        self.event_tx
            .send(Event::Command(command))
            .map_err(|_| ScanLinkError::ManagerStopped)
    }

    /// Begin opening the connection
    ///
    /// No-op when a session is already opening or open, or when no target
    /// address is configured. Returns immediately; watch
    /// [`events`](Self::events) or [`connection_state`](Self::connection_state)
    /// for progress.
    pub fn connect(&self) -> Result<()> {
        self.post(Command::Connect)
    }

    /// Close the connection and stop all automatic reconnection
    ///
    /// Idempotent and safe from any state. Any retry timer that is armed,
    /// or has already elapsed but not yet been processed, is invalidated
    /// before this returns.
    pub fn disconnect(&self) -> Result<()> {
        self.shared.begin_teardown();
        self.shared.retry.set_reconnect_enabled(false);
        self.canceller.cancel();
        self.post(Command::Disconnect)
    }

    /// Drop the current session and connect again right away
    ///
    /// Bypasses the backoff schedule and resets the attempt counter, so
    /// the next automatic retry starts again from the base interval.
    pub fn reconnect(&self) -> Result<()> {
        self.shared.begin_teardown();
        self.canceller.cancel();
        self.post(Command::Reconnect)
    }

    /// Send a payload to the peer
    ///
    /// Fails with [`ScanLinkError::NotConnected`] unless the state is
    /// `Connected`. Nothing is queued for later delivery. A send issued
    /// after `disconnect()` is rejected even if the old session is still
    /// being closed.
    pub fn send(&self, payload: impl Into<Payload>) -> Result<()> {
        let state = self.shared.observed_state();
        if state != ConnectionState::Connected {
            debug!("Rejecting send while {}", state);
            return Err(ScanLinkError::NotConnected(state.to_string()));
        }
        self.post(Command::Send(payload.into()))
    }

    /// Current connection state
    #[inline]
    pub fn connection_state(&self) -> ConnectionState {
        self.shared.observed_state()
    }

    /// True iff the state is `Connected`
    #[inline]
    pub fn is_connected(&self) -> bool {
        self.shared.observed_state() == ConnectionState::Connected
    }

    /// Most recently received message, if any
    pub fn last_message(&self) -> Option<Message> {
        self.shared.last_message.read().clone()
    }

    /// Automatic retries made since the last successful open
    pub fn attempts_made(&self) -> usize {
        self.shared.retry.attempts_made()
    }

    /// False once the caller has disconnected
    pub fn reconnect_enabled(&self) -> bool {
        self.shared.retry.reconnect_enabled()
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// Get current metrics
    pub fn metrics(&self) -> Metrics {
        Metrics {
            messages_sent: self.shared.metrics.messages_sent(),
            messages_received: self.shared.metrics.messages_received(),
            reconnect_count: self.shared.metrics.reconnect_count(),
            connection_state: self.shared.observed_state(),
        }
    }

    /// Subscribe to connection events
    ///
    /// Each receiver sees every event published after it was created.
    /// Dropping the receiver unsubscribes.
    pub fn events(&self) -> Receiver<ConnectionEvent> {
        let (tx, rx) = unbounded();
        self.shared.subscribers.lock().push(tx);
        rx
    }

    /// Disconnect and wait for the manager task to finish
    ///
    /// Callbacks may fire while this runs (the final close); none fire
    /// after it returns.
    pub async fn shutdown(mut self) -> Result<()> {
        info!("Shutting down connection manager");

        self.shared.begin_teardown();
        self.shared.retry.set_reconnect_enabled(false);
        self.canceller.cancel();
        let _ = self.event_tx.send(Event::Command(Command::Shutdown));

        if let Some(handle) = self.task_handle.take() {
            handle
                .await
                .map_err(|e| ScanLinkError::Transport(format!("manager task failed: {}", e)))?;
        }
        self.shared.disposed.store(true, Ordering::Release);
        Ok(())
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if self.task_handle.take().is_none() {
            return;
        }
        // The task finishes closing the transport on its own; nothing it
        // does from here on reaches callbacks or subscribers.
        self.shared.disposed.store(true, Ordering::Release);
        self.shared.begin_teardown();
        self.shared.retry.set_reconnect_enabled(false);
        self.canceller.cancel();
        let _ = self.event_tx.send(Event::Command(Command::Shutdown));
        debug!("Connection manager dropped");
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("url", &self.url)
            .field("state", &self.shared.observed_state())
            .field("attempts_made", &self.shared.retry.attempts_made())
            .finish()
    }
}
