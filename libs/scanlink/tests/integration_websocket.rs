//! Integration tests for the tokio-tungstenite transport
//!
//! These run against a real local echo server in real time.

#[macro_use]
mod common;

use common::*;
use scanlink::{
    CloseReason, ConnectionEvent, ConnectionManager, ConnectionState, Connector, Payload,
    ScanLinkError, SessionSink, SessionStream, TransportEvent, WsConnector,
};
use std::time::Duration;

#[tokio::test]
async fn test_ws_connector_round_trip() {
    let server = MockWsServer::start().await;
    let (mut sink, mut stream) = WsConnector.open(&server.ws_url()).await.unwrap();

    assert_eq!(stream.next_event().await, Some(TransportEvent::Opened));

    sink.send(Payload::from(r#"{"type":"ping"}"#)).await.unwrap();
    assert_eq!(
        stream.next_event().await,
        Some(TransportEvent::Message(Payload::Text(r#"{"type":"ping"}"#.into())))
    );

    sink.send(Payload::Binary(vec![1, 2, 3])).await.unwrap();
    assert_eq!(
        stream.next_event().await,
        Some(TransportEvent::Message(Payload::Binary(vec![1, 2, 3])))
    );

    sink.close(CloseReason::normal()).await.unwrap();
}

#[tokio::test]
async fn test_ws_connector_reports_server_close() {
    let server = MockWsServer::start().await;
    let (mut sink, mut stream) = WsConnector.open(&server.ws_url()).await.unwrap();
    assert_eq!(stream.next_event().await, Some(TransportEvent::Opened));

    sink.send(Payload::from("close-me")).await.unwrap();
    match stream.next_event().await {
        Some(TransportEvent::Closed(reason)) => {
            verbose_println!("  Server closed with {}", reason);
            assert!(!reason.is_normal());
        }
        other => panic!("expected close, got {:?}", other),
    }
    assert_eq!(stream.next_event().await, None);
}

#[tokio::test]
async fn test_ws_connector_open_failure() {
    // Bind then drop to get a port nobody listens on
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let result = WsConnector.open(&format!("ws://{}", addr)).await;
    assert!(matches!(result, Err(ScanLinkError::OpenFailed(_))));
}

#[tokio::test]
async fn test_manager_over_real_socket() {
    verbose_println!("Testing manager against local echo server...");

    let server = MockWsServer::start().await;
    let manager = ConnectionManager::builder()
        .url(server.ws_url())
        .base_reconnect_interval(Duration::from_millis(50))
        .build()
        .unwrap();
    let rx = manager.events();

    manager.connect().unwrap();
    until_state(&rx, ConnectionState::Connected).await;

    manager.send(r#"{"type":"request_status"}"#).unwrap();
    let echoed = loop {
        if let ConnectionEvent::Message(msg) = next_event(&rx).await {
            break msg;
        }
    };
    assert_eq!(echoed.payload().as_text(), Some(r#"{"type":"request_status"}"#));
    assert_eq!(manager.last_message(), Some(echoed));

    // Server-side close is not caller-initiated, so the manager recovers
    manager.send("close-me").unwrap();
    until_state(&rx, ConnectionState::Disconnected).await;
    until_state(&rx, ConnectionState::Connected).await;

    manager.disconnect().unwrap();
    until_state(&rx, ConnectionState::Disconnected).await;
    assert!(!manager.is_connected());

    manager.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_manager_retries_unreachable_target() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let manager = ConnectionManager::builder()
        .url(format!("ws://{}", addr))
        .max_reconnect_attempts(1)
        .base_reconnect_interval(Duration::from_millis(20))
        .build()
        .unwrap();
    let rx = manager.events();

    manager.connect().unwrap();

    let mut seen = Vec::new();
    loop {
        let event = next_event(&rx).await;
        let done = matches!(event, ConnectionEvent::RetriesExhausted { .. });
        seen.push(event);
        if done {
            break;
        }
    }

    assert_eq!(
        states(&seen),
        vec![
            ConnectionState::Connecting,
            ConnectionState::Errored,
            ConnectionState::Disconnected,
            ConnectionState::Connecting,
            ConnectionState::Errored,
            ConnectionState::Disconnected,
        ]
    );
    assert!(seen.contains(&ConnectionEvent::RetryScheduled {
        attempt: 1,
        delay: Duration::from_millis(20)
    }));
}
