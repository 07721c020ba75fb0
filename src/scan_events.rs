//! Typed view of the scan backend's WebSocket frames
//!
//! Every frame is a JSON object with a `type` discriminator. Frames are
//! decoded in two steps (peek the `type`, then parse the body for that type)
//! so unknown types survive as [`ScanEvent::Unknown`] instead of failing.

use scanlink::{Message, Payload};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScanProgress {
    /// Percentage, 0-100
    pub progress: f64,
    #[serde(default)]
    pub message: String,
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScanStatusChange {
    pub status: String,
    pub message: Option<String>,
    pub timestamp: Option<String>,
}

impl ScanStatusChange {
    /// Statuses after which the backend sends nothing more for the scan
    pub fn is_final(&self) -> bool {
        matches!(self.status.as_str(), "completed" | "failed" | "cancelled")
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScanCompleted {
    pub vulnerability_count: u64,
    pub duration_seconds: f64,
    pub message: Option<String>,
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VulnerabilityFound {
    /// Free-form finding record as stored by the backend
    pub vulnerability: Value,
    pub message: Option<String>,
    pub timestamp: Option<String>,
}

impl VulnerabilityFound {
    pub fn severity(&self) -> &str {
        self.vulnerability
            .get("severity")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
    }

    pub fn title(&self) -> &str {
        self.vulnerability
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or("Unknown")
    }
}

/// Acknowledgement frames (`scan_subscription_confirmed`, `status_requested`)
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScanAck {
    pub scan_id: Option<String>,
    pub message: Option<String>,
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScanEvent {
    Progress(ScanProgress),
    StatusChange(ScanStatusChange),
    Completed(ScanCompleted),
    VulnerabilityFound(VulnerabilityFound),
    SubscriptionConfirmed(ScanAck),
    StatusRequested(ScanAck),
    Pong,
    Heartbeat,
    /// Any other frame, kept verbatim
    Unknown { kind: Option<String>, raw: Value },
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: Option<String>,
}

impl ScanEvent {
    /// Decode one JSON frame
    pub fn decode(bytes: &[u8]) -> serde_json::Result<Self> {
        let envelope: Envelope = serde_json::from_slice(bytes)?;
        let event = match envelope.kind.as_deref() {
            Some("scan_progress") => ScanEvent::Progress(serde_json::from_slice(bytes)?),
            Some("scan_status_change") => ScanEvent::StatusChange(serde_json::from_slice(bytes)?),
            Some("scan_completed") => ScanEvent::Completed(serde_json::from_slice(bytes)?),
            Some("vulnerability_found") => {
                ScanEvent::VulnerabilityFound(serde_json::from_slice(bytes)?)
            }
            Some("scan_subscription_confirmed") => {
                ScanEvent::SubscriptionConfirmed(serde_json::from_slice(bytes)?)
            }
            Some("status_requested") => ScanEvent::StatusRequested(serde_json::from_slice(bytes)?),
            Some("pong") => ScanEvent::Pong,
            Some("heartbeat") => ScanEvent::Heartbeat,
            _ => ScanEvent::Unknown {
                kind: envelope.kind,
                raw: serde_json::from_slice(bytes)?,
            },
        };
        Ok(event)
    }

    pub fn from_payload(payload: &Payload) -> serde_json::Result<Self> {
        Self::decode(payload.as_bytes())
    }

    pub fn from_message(message: &Message) -> serde_json::Result<Self> {
        Self::from_payload(message.payload())
    }

    /// True once the scan being followed has reached an end state
    pub fn is_terminal(&self) -> bool {
        match self {
            ScanEvent::Completed(_) => true,
            ScanEvent::StatusChange(change) => change.is_final(),
            _ => false,
        }
    }

    /// Keep-alive traffic, not worth surfacing to a user
    pub fn is_keepalive(&self) -> bool {
        matches!(self, ScanEvent::Pong | ScanEvent::Heartbeat)
    }
}

/// Frames the client may send to the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientRequest {
    Ping,
    RequestStatus,
}

impl ClientRequest {
    pub fn to_payload(self) -> serde_json::Result<Payload> {
        serde_json::to_string(&self).map(Payload::Text)
    }
}
