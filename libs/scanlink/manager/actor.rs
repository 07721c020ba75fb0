//! The manager task
//!
//! Everything that can change connection state arrives here as an
//! [`Event`] on one unbounded queue: caller commands, session lifecycle
//! events, retry timer fires and heartbeat ticks. The actor handles them
//! strictly one at a time, so no two transitions ever overlap.
//!
//! Every session gets a fresh id. Events carry the id of the session that
//! produced them, and anything from a session that is no longer current is
//! dropped. The same goes for retry timers via their epoch.

use super::manager::{ConnectionEvent, Shared};
use crate::core::config::ConnectionConfig;
use crate::core::connection_state::ConnectionState;
use crate::core::heartbeat::spawn_heartbeat;
use crate::core::retry::PendingRetryTimer;
use crate::traits::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Upper bound on waiting for the close frame to go out
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// How long an errored session may stay open without reporting a close
/// before it is treated as abnormally closed
const ERROR_CLOSE_GRACE: Duration = Duration::from_secs(10);

/// Caller-issued commands
#[derive(Debug)]
pub(crate) enum Command {
    Connect,
    Disconnect,
    Reconnect,
    Send(Payload),
    Shutdown,
}

/// Everything the manager task reacts to
pub(crate) enum Event {
    Command(Command),
    /// A transport object exists for `session`; it is not open yet
    SessionCreated {
        session: u64,
        sink: Box<dyn SessionSink>,
    },
    /// The connector could not produce a transport for `session`
    OpenFailed { session: u64, error: ScanLinkError },
    /// Lifecycle or data event read from `session`
    Transport { session: u64, event: TransportEvent },
    RetryDue { epoch: u64 },
    HeartbeatTick { session: u64 },
    /// `session` reported an error and no close followed in time
    CloseOverdue { session: u64 },
}

pub(crate) struct Actor {
    config: ConnectionConfig,
    shared: Arc<Shared>,
    tx: mpsc::UnboundedSender<Event>,
    timer: PendingRetryTimer,
    session_id: u64,
    sink: Option<Box<dyn SessionSink>>,
    session_task: Option<JoinHandle<()>>,
    heartbeat: Option<JoinHandle<()>>,
    close_watchdog: Option<JoinHandle<()>>,
}

impl Actor {
    pub(crate) fn new(
        config: ConnectionConfig,
        shared: Arc<Shared>,
        tx: mpsc::UnboundedSender<Event>,
        timer: PendingRetryTimer,
    ) -> Self {
        Self {
            config,
            shared,
            tx,
            timer,
            session_id: 0,
            sink: None,
            session_task: None,
            heartbeat: None,
            close_watchdog: None,
        }
    }

    pub(crate) async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Event>) {
        while let Some(event) = rx.recv().await {
            match event {
                Event::Command(Command::Shutdown) => {
                    debug!("Shutdown requested");
                    self.disconnect_now().await;
                    break;
                }
                Event::Command(command) => self.handle_command(command).await,
                Event::SessionCreated { session, sink } => {
                    self.on_session_created(session, sink).await
                }
                Event::OpenFailed { session, error } => self.on_open_failed(session, error),
                Event::Transport { session, event } => self.on_transport(session, event).await,
                Event::RetryDue { epoch } => self.on_retry_due(epoch),
                Event::HeartbeatTick { session } => self.on_heartbeat(session).await,
                Event::CloseOverdue { session } => self.on_close_overdue(session),
            }
        }

        self.release_session();
        self.timer.cancel();
        debug!("Connection manager task exiting");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect => {
                if self.config.url.is_none() {
                    debug!("No target address configured, ignoring connect");
                    return;
                }
                if self.session_task.is_some() {
                    if self.shared.state.get() != ConnectionState::Errored {
                        debug!(
                            "Connect ignored, session already {}",
                            self.shared.state.get()
                        );
                        return;
                    }
                    info!("Abandoning errored session before connecting");
                    self.abandon_session().await;
                }
                self.timer.cancel();
                self.shared.retry.set_reconnect_enabled(true);
                self.open_session();
            }
            Command::Disconnect => {
                self.disconnect_now().await;
                self.shared.finish_teardown();
            }
            Command::Reconnect => {
                info!("Manual reconnect requested");
                self.disconnect_now().await;
                self.shared.finish_teardown();
                self.shared.retry.set_reconnect_enabled(true);
                self.shared.retry.reset_attempts();
                self.open_session();
            }
            Command::Send(payload) => {
                let state = self.shared.state.get();
                match self.sink.as_mut() {
                    Some(sink) if state == ConnectionState::Connected => {
                        match sink.send(payload).await {
                            Ok(()) => self.shared.metrics.increment_sent(),
                            Err(e) => warn!("Send failed: {}", e),
                        }
                    }
                    _ => debug!("Dropping outbound payload, state is {}", state),
                }
            }
            Command::Shutdown => {}
        }
    }

    async fn on_session_created(&mut self, session: u64, mut sink: Box<dyn SessionSink>) {
        if session != self.session_id {
            debug!("Closing transport of superseded session {}", session);
            let _ = tokio::time::timeout(CLOSE_TIMEOUT, sink.close(CloseReason::normal())).await;
            return;
        }
        self.sink = Some(sink);
    }

    fn on_open_failed(&mut self, session: u64, err: ScanLinkError) {
        if session != self.session_id {
            return;
        }
        error!("Failed to connect: {}", err);
        let reason = CloseReason::abnormal(err.to_string());
        self.on_error(err);
        self.on_closed(reason);
    }

    async fn on_transport(&mut self, session: u64, event: TransportEvent) {
        if session != self.session_id {
            debug!("Ignoring event from superseded session {}", session);
            return;
        }

        match event {
            TransportEvent::Opened => self.on_opened(session).await,
            TransportEvent::Message(payload) => {
                let message = Message::new(payload);
                self.shared.metrics.increment_received();
                *self.shared.last_message.write() = Some(message.clone());

                if !self.shared.is_disposed() {
                    if let Some(cb) = &self.config.callbacks.on_message {
                        cb(&message);
                    }
                }
                self.shared.publish(ConnectionEvent::Message(message));
            }
            TransportEvent::Error(e) => {
                warn!("Transport error: {}", e);
                self.on_error(ScanLinkError::Transport(e));
            }
            TransportEvent::Closed(reason) => self.on_closed(reason),
        }
    }

    async fn on_opened(&mut self, session: u64) {
        if !self.shared.retry.reconnect_enabled() {
            // disconnect() already ran on the caller side; its command is queued
            debug!("Session {} opened after disconnect, not announcing", session);
            return;
        }

        info!(
            "Connected to {}",
            self.config.url.as_deref().unwrap_or_default()
        );
        self.transition(ConnectionState::Connected);
        self.shared.retry.reset_attempts();
        self.timer.cancel();

        if let Some(sink) = self.sink.as_mut() {
            for subscription in &self.config.subscriptions {
                if let Err(e) = sink.send(subscription.clone()).await {
                    warn!("Failed to send subscription: {}", e);
                    break;
                }
                self.shared.metrics.increment_sent();
                debug!("Sent subscription message");
            }
        }

        if let Some((interval, _)) = &self.config.heartbeat {
            let tx = self.tx.clone();
            self.heartbeat = Some(spawn_heartbeat(*interval, move || {
                tx.send(Event::HeartbeatTick { session }).is_ok()
            }));
        }

        if !self.shared.is_disposed() {
            if let Some(cb) = &self.config.callbacks.on_open {
                cb();
            }
        }
        self.shared.publish(ConnectionEvent::Opened);
    }

    /// Errors are observational; only a close drives the retry decision
    ///
    /// A session that stays open after its error gets [`ERROR_CLOSE_GRACE`]
    /// to report the close before one is assumed.
    fn on_error(&mut self, err: ScanLinkError) {
        self.transition(ConnectionState::Errored);
        let armed = self
            .close_watchdog
            .as_ref()
            .map_or(false, |handle| !handle.is_finished());
        if self.session_task.is_some() && !armed {
            let tx = self.tx.clone();
            let session = self.session_id;
            self.close_watchdog = Some(tokio::spawn(async move {
                tokio::time::sleep(ERROR_CLOSE_GRACE).await;
                let _ = tx.send(Event::CloseOverdue { session });
            }));
        }
        if !self.shared.is_disposed() {
            if let Some(cb) = &self.config.callbacks.on_error {
                cb(&err);
            }
        }
        self.shared.publish(ConnectionEvent::Error(err.to_string()));
    }

    fn on_closed(&mut self, reason: CloseReason) {
        self.release_session();

        let attempts = self.shared.retry.attempts_made();
        let enabled = self.shared.retry.reconnect_enabled();
        let strategy = self.config.strategy.as_ref();
        let delay = if !reason.is_normal() && should_retry(strategy, enabled, attempts) {
            strategy.next_delay(attempts)
        } else {
            None
        };

        match delay {
            Some(delay) => {
                let tx = self.tx.clone();
                self.timer.schedule(delay, move |epoch| {
                    let _ = tx.send(Event::RetryDue { epoch });
                });
                let attempt = self.shared.retry.record_attempt() + 1;
                self.shared.metrics.increment_reconnects();

                info!(
                    "Connection closed: {}. Reconnecting in {:?} (attempt {}/{})",
                    reason, delay, attempt, self.config.settings.max_reconnect_attempts
                );
                self.transition(ConnectionState::Disconnected);
                self.emit_close(&reason);
                self.shared
                    .publish(ConnectionEvent::RetryScheduled { attempt, delay });
            }
            None => {
                self.transition(ConnectionState::Disconnected);
                self.emit_close(&reason);

                if !reason.is_normal() && enabled && self.config.settings.reconnect {
                    warn!(
                        "Connection closed: {}. Reconnection attempts exhausted after {}",
                        reason, attempts
                    );
                    self.shared
                        .publish(ConnectionEvent::RetriesExhausted { attempts });
                } else {
                    info!("Connection closed: {}", reason);
                }
            }
        }
    }

    fn on_close_overdue(&mut self, session: u64) {
        if session != self.session_id || self.shared.state.get() != ConnectionState::Errored {
            return;
        }
        warn!(
            "No close reported within {:?} of a transport error, treating session as lost",
            ERROR_CLOSE_GRACE
        );
        self.on_closed(CloseReason::abnormal("no close after transport error"));
    }

    fn on_retry_due(&mut self, epoch: u64) {
        if !self.timer.is_current(epoch) {
            debug!("Ignoring cancelled retry timer (epoch {})", epoch);
            return;
        }
        self.timer.settle();

        if !self.shared.retry.reconnect_enabled() {
            debug!("Reconnection disabled, retry timer has no effect");
            return;
        }
        if self.session_task.is_some() {
            debug!("Retry timer elapsed but a session is already live");
            return;
        }

        info!(
            "Reconnecting (attempt {})",
            self.shared.retry.attempts_made()
        );
        self.open_session();
    }

    async fn on_heartbeat(&mut self, session: u64) {
        if session != self.session_id || self.shared.state.get() != ConnectionState::Connected {
            return;
        }
        if let (Some(sink), Some((_, payload))) = (self.sink.as_mut(), &self.config.heartbeat) {
            debug!("Heartbeat tick, sending payload");
            match sink.send(payload.clone()).await {
                Ok(()) => self.shared.metrics.increment_sent(),
                Err(e) => warn!("Failed to send heartbeat: {}", e),
            }
        }
    }

    /// Close an errored session without announcing it as a disconnect
    async fn abandon_session(&mut self) {
        if let Some(mut sink) = self.sink.take() {
            let _ = tokio::time::timeout(CLOSE_TIMEOUT, sink.close(CloseReason::normal())).await;
        }
        self.release_session();
    }

    /// Caller-initiated teardown; never schedules a retry
    async fn disconnect_now(&mut self) {
        self.shared.retry.set_reconnect_enabled(false);
        if self.timer.cancel() {
            debug!("Cancelled pending retry timer");
        }

        if let Some(mut sink) = self.sink.take() {
            match tokio::time::timeout(CLOSE_TIMEOUT, sink.close(CloseReason::normal())).await {
                Ok(Ok(())) => debug!("Transport closed"),
                Ok(Err(e)) => debug!("Error while closing transport: {}", e),
                Err(_) => warn!("Timed out closing transport"),
            }
        }
        self.release_session();

        if self.shared.state.get() != ConnectionState::Disconnected {
            self.transition(ConnectionState::Disconnected);
            self.emit_close(&CloseReason::normal());
        }
    }

    fn open_session(&mut self) {
        let url = match &self.config.url {
            Some(url) => url.clone(),
            None => {
                warn!("No target address configured, not connecting");
                return;
            }
        };

        self.session_id += 1;
        let session = self.session_id;
        self.transition(ConnectionState::Connecting);
        debug!("Opening session {} to {}", session, url);

        let connector = Arc::clone(&self.config.connector);
        let tx = self.tx.clone();
        self.session_task = Some(tokio::spawn(run_session(connector, url, session, tx)));
    }

    /// Drop the transport and everything tied to it
    ///
    /// Bumps the session id so late events from the old session are ignored.
    fn release_session(&mut self) {
        self.sink = None;
        if let Some(handle) = self.heartbeat.take() {
            handle.abort();
        }
        if let Some(handle) = self.close_watchdog.take() {
            handle.abort();
        }
        if let Some(handle) = self.session_task.take() {
            handle.abort();
        }
        self.session_id += 1;
    }

    fn transition(&self, to: ConnectionState) {
        let from = self.shared.state.set(to);
        if from != to {
            debug!("Connection state {} -> {}", from, to);
            self.shared.publish(ConnectionEvent::StateChanged(to));
        }
    }

    fn emit_close(&self, reason: &CloseReason) {
        if !self.shared.is_disposed() {
            if let Some(cb) = &self.config.callbacks.on_close {
                cb(reason);
            }
        }
        self.shared.publish(ConnectionEvent::Closed(reason.clone()));
    }
}

/// Open a transport and pump its read half into the manager queue
async fn run_session(
    connector: Arc<dyn Connector>,
    url: String,
    session: u64,
    tx: mpsc::UnboundedSender<Event>,
) {
    let (sink, mut stream) = match connector.open(&url).await {
        Ok(halves) => halves,
        Err(error) => {
            let _ = tx.send(Event::OpenFailed { session, error });
            return;
        }
    };

    if tx.send(Event::SessionCreated { session, sink }).is_err() {
        return;
    }

    loop {
        match stream.next_event().await {
            Some(event) => {
                let closed = matches!(event, TransportEvent::Closed(_));
                if tx.send(Event::Transport { session, event }).is_err() || closed {
                    break;
                }
            }
            None => {
                let event = TransportEvent::Closed(CloseReason::abnormal("transport stream ended"));
                let _ = tx.send(Event::Transport { session, event });
                break;
            }
        }
    }
}
