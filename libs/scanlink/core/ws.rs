//! WebSocket transport over tokio-tungstenite
//!
//! [`WsConnector`] performs the handshake in `open`, so a returned session
//! has already been accepted by the server. The read half announces that
//! with a leading [`TransportEvent::Opened`] before relaying traffic.

use crate::traits::*;
use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsFrame};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Close code a server sends without a status
const NO_STATUS_RECEIVED: u16 = 1005;

/// Opens WebSocket sessions (`ws://` or `wss://`)
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn open(&self, url: &str) -> Result<SessionHalves> {
        let (stream, response) = connect_async(url)
            .await
            .map_err(|e| ScanLinkError::OpenFailed(e.to_string()))?;
        debug!("WebSocket handshake completed with status {}", response.status());

        let (write, read) = stream.split();
        Ok((
            Box::new(WsSink { write }),
            Box::new(WsReader {
                read,
                announced: false,
                finished: false,
            }),
        ))
    }
}

struct WsSink {
    write: SplitSink<WsStream, WsFrame>,
}

#[async_trait]
impl SessionSink for WsSink {
    async fn send(&mut self, payload: Payload) -> Result<()> {
        self.write
            .send(payload_to_frame(payload))
            .await
            .map_err(|e| ScanLinkError::Transport(e.to_string()))
    }

    async fn close(&mut self, reason: CloseReason) -> Result<()> {
        let frame = CloseFrame {
            code: CloseCode::from(reason.code),
            reason: reason.reason.into(),
        };
        self.write
            .send(WsFrame::Close(Some(frame)))
            .await
            .map_err(|e| ScanLinkError::Transport(e.to_string()))?;
        if let Err(e) = self.write.close().await {
            debug!("Error flushing close frame: {}", e);
        }
        Ok(())
    }
}

struct WsReader {
    read: SplitStream<WsStream>,
    announced: bool,
    finished: bool,
}

#[async_trait]
impl SessionStream for WsReader {
    async fn next_event(&mut self) -> Option<TransportEvent> {
        if !self.announced {
            self.announced = true;
            return Some(TransportEvent::Opened);
        }
        if self.finished {
            return None;
        }

        loop {
            match self.read.next().await {
                Some(Ok(WsFrame::Text(text))) => {
                    return Some(TransportEvent::Message(Payload::Text(text)))
                }
                Some(Ok(WsFrame::Binary(data))) => {
                    return Some(TransportEvent::Message(Payload::Binary(data)))
                }
                Some(Ok(WsFrame::Close(frame))) => {
                    self.finished = true;
                    let reason = frame
                        .map(|f| CloseReason::new(u16::from(f.code), f.reason.into_owned()))
                        .unwrap_or_else(|| CloseReason::new(NO_STATUS_RECEIVED, ""));
                    return Some(TransportEvent::Closed(reason));
                }
                // Control frames are handled by tungstenite
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    warn!("WebSocket read error: {}", e);
                    self.finished = true;
                    return Some(TransportEvent::Error(e.to_string()));
                }
                None => {
                    self.finished = true;
                    return None;
                }
            }
        }
    }
}

fn payload_to_frame(payload: Payload) -> WsFrame {
    match payload {
        Payload::Text(text) => WsFrame::Text(text),
        Payload::Binary(data) => WsFrame::Binary(data),
    }
}
