//! Common test utilities for ScanLink integration tests
//!
//! Provides a scripted in-memory connector, a local WebSocket echo server
//! and helpers for draining manager events.

#![allow(dead_code)]

use async_trait::async_trait;
use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use scanlink::{
    CloseReason, ConnectionEvent, ConnectionState, Connector, Payload, Result, ScanLinkError,
    SessionHalves, SessionSink, SessionStream, TransportEvent,
};
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, Notify};

/// Macro for verbose test output (controlled by TEST_VERBOSE env var)
#[macro_export]
macro_rules! verbose_println {
    ($($arg:tt)*) => {
        if std::env::var("TEST_VERBOSE").is_ok() {
            println!($($arg)*);
        }
    };
}

/// What the scripted connector does on the next `open`
#[derive(Debug, Clone)]
pub enum OpenPlan {
    Accept,
    Fail(String),
}

/// Test-side handle to one scripted session
pub struct MockSession {
    events: mpsc::UnboundedSender<TransportEvent>,
    pub sent: Arc<Mutex<Vec<Payload>>>,
    pub closed: Arc<Mutex<Option<CloseReason>>>,
}

impl MockSession {
    pub fn open(&self) {
        let _ = self.events.send(TransportEvent::Opened);
    }

    pub fn message(&self, payload: impl Into<Payload>) {
        let _ = self.events.send(TransportEvent::Message(payload.into()));
    }

    pub fn error(&self, reason: &str) {
        let _ = self.events.send(TransportEvent::Error(reason.to_string()));
    }

    pub fn close(&self, reason: CloseReason) {
        let _ = self.events.send(TransportEvent::Closed(reason));
    }

    pub fn drop_abnormally(&self) {
        self.close(CloseReason::abnormal("connection reset"));
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .filter_map(|p| p.as_text().map(str::to_string))
            .collect()
    }

    pub fn close_reason(&self) -> Option<CloseReason> {
        self.closed.lock().clone()
    }
}

/// Connector whose sessions are driven by the test
pub struct MockConnector {
    plans: Mutex<VecDeque<OpenPlan>>,
    fallback: OpenPlan,
    opens: Arc<AtomicUsize>,
    sessions: mpsc::UnboundedSender<MockSession>,
}

impl MockConnector {
    /// Accepts every open; returns the connector, a stream of session
    /// handles and a shared open counter
    pub fn new() -> (Self, mpsc::UnboundedReceiver<MockSession>, Arc<AtomicUsize>) {
        Self::with_fallback(OpenPlan::Accept)
    }

    /// Fails every open that has no explicit plan
    pub fn failing() -> (Self, mpsc::UnboundedReceiver<MockSession>, Arc<AtomicUsize>) {
        Self::with_fallback(OpenPlan::Fail("connection refused".into()))
    }

    fn with_fallback(
        fallback: OpenPlan,
    ) -> (Self, mpsc::UnboundedReceiver<MockSession>, Arc<AtomicUsize>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let opens = Arc::new(AtomicUsize::new(0));
        let connector = Self {
            plans: Mutex::new(VecDeque::new()),
            fallback,
            opens: Arc::clone(&opens),
            sessions: tx,
        };
        (connector, rx, opens)
    }

    pub fn plan(self, plan: OpenPlan) -> Self {
        self.plans.lock().push_back(plan);
        self
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn open(&self, _url: &str) -> Result<SessionHalves> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let plan = self
            .plans
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        match plan {
            OpenPlan::Fail(reason) => Err(ScanLinkError::OpenFailed(reason)),
            OpenPlan::Accept => {
                let (events_tx, events_rx) = mpsc::unbounded_channel();
                let sent = Arc::new(Mutex::new(Vec::new()));
                let closed = Arc::new(Mutex::new(None));

                let _ = self.sessions.send(MockSession {
                    events: events_tx,
                    sent: Arc::clone(&sent),
                    closed: Arc::clone(&closed),
                });

                Ok((
                    Box::new(MockSink { sent, closed }),
                    Box::new(MockStream { events: events_rx }),
                ))
            }
        }
    }
}

struct MockSink {
    sent: Arc<Mutex<Vec<Payload>>>,
    closed: Arc<Mutex<Option<CloseReason>>>,
}

#[async_trait]
impl SessionSink for MockSink {
    async fn send(&mut self, payload: Payload) -> Result<()> {
        if self.closed.lock().is_some() {
            return Err(ScanLinkError::Transport("sink closed".into()));
        }
        self.sent.lock().push(payload);
        Ok(())
    }

    async fn close(&mut self, reason: CloseReason) -> Result<()> {
        *self.closed.lock() = Some(reason);
        Ok(())
    }
}

struct MockStream {
    events: mpsc::UnboundedReceiver<TransportEvent>,
}

#[async_trait]
impl SessionStream for MockStream {
    async fn next_event(&mut self) -> Option<TransportEvent> {
        self.events.recv().await
    }
}

/// Wait for the next manager event, polling in 1ms steps
///
/// Works under paused time as well: each sleep lets the clock advance.
pub async fn next_event(rx: &Receiver<ConnectionEvent>) -> ConnectionEvent {
    for _ in 0..120_000 {
        if let Ok(event) = rx.try_recv() {
            verbose_println!("  event: {:?}", event);
            return event;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("timed out waiting for a connection event");
}

/// Drain events until `target` state is reached, returning every event seen
pub async fn until_state(
    rx: &Receiver<ConnectionEvent>,
    target: ConnectionState,
) -> Vec<ConnectionEvent> {
    let mut seen = Vec::new();
    loop {
        let event = next_event(rx).await;
        let done = event == ConnectionEvent::StateChanged(target);
        seen.push(event);
        if done {
            return seen;
        }
    }
}

/// Drain events until the next retry is armed
pub async fn until_retry(rx: &Receiver<ConnectionEvent>) -> (usize, Duration) {
    loop {
        if let ConnectionEvent::RetryScheduled { attempt, delay } = next_event(rx).await {
            return (attempt, delay);
        }
    }
}

/// Let `quiet` pass and return whatever was published meanwhile
pub async fn events_during(rx: &Receiver<ConnectionEvent>, quiet: Duration) -> Vec<ConnectionEvent> {
    tokio::time::sleep(quiet).await;
    rx.try_iter().collect()
}

pub fn states(events: &[ConnectionEvent]) -> Vec<ConnectionState> {
    events
        .iter()
        .filter_map(|e| match e {
            ConnectionEvent::StateChanged(s) => Some(*s),
            _ => None,
        })
        .collect()
}

/// A simple WebSocket echo server for testing the real transport
pub struct MockWsServer {
    pub addr: SocketAddr,
    shutdown: Arc<Notify>,
}

impl MockWsServer {
    /// Create and start a new mock WebSocket server
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Arc::new(Notify::new());
        let shutdown_clone = shutdown.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, _)) => {
                                let shutdown = shutdown_clone.clone();
                                tokio::spawn(async move {
                                    Self::handle_connection(stream, shutdown).await;
                                });
                            }
                            Err(e) => {
                                eprintln!("Accept error: {}", e);
                                break;
                            }
                        }
                    }
                    _ = shutdown_clone.notified() => {
                        break;
                    }
                }
            }
        });

        Self { addr, shutdown }
    }

    async fn handle_connection(stream: tokio::net::TcpStream, shutdown: Arc<Notify>) {
        use futures::{SinkExt, StreamExt};
        use tokio_tungstenite::accept_async;
        use tokio_tungstenite::tungstenite::Message;

        let ws_stream = match accept_async(stream).await {
            Ok(ws) => ws,
            Err(e) => {
                eprintln!("WebSocket handshake failed: {}", e);
                return;
            }
        };

        let (mut write, mut read) = ws_stream.split();

        loop {
            tokio::select! {
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) if text == "close-me" => {
                            let _ = write.send(Message::Close(None)).await;
                            break;
                        }
                        Some(Ok(msg)) if msg.is_text() || msg.is_binary() => {
                            // Echo the message back
                            if write.send(msg).await.is_err() {
                                break;
                            }
                        }
                        Some(Ok(msg)) if msg.is_close() => break,
                        Some(Ok(_)) => {}
                        Some(Err(_)) | None => break,
                    }
                }
                _ = shutdown.notified() => {
                    break;
                }
            }
        }
    }

    /// Get the WebSocket URL for this server
    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Shutdown the server
    pub fn shutdown(&self) {
        self.shutdown.notify_waiters();
    }
}

impl Drop for MockWsServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}
