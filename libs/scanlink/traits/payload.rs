use chrono::{DateTime, Utc};

/// Opaque content carried over the live connection
///
/// The manager never looks inside; decoding is up to whoever
/// subscribes to messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Text(String),
    Binary(Vec<u8>),
}

impl Payload {
    /// Get the payload as text, if it is text
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Text(s) => Some(s),
            Payload::Binary(_) => None,
        }
    }

    /// Get the payload as binary, if it is binary
    pub fn as_binary(&self) -> Option<&[u8]> {
        match self {
            Payload::Text(_) => None,
            Payload::Binary(b) => Some(b),
        }
    }

    /// Raw bytes regardless of variant
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Payload::Text(s) => s.as_bytes(),
            Payload::Binary(b) => b,
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Text(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Text(text.to_string())
    }
}

impl From<Vec<u8>> for Payload {
    fn from(data: Vec<u8>) -> Self {
        Payload::Binary(data)
    }
}

/// A message received from the peer
///
/// Immutable once produced. The manager keeps only the latest one
/// around for observation; every message is forwarded to callbacks
/// and subscribers in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    payload: Payload,
    received_at: DateTime<Utc>,
}

impl Message {
    pub fn new(payload: Payload) -> Self {
        Self {
            payload,
            received_at: Utc::now(),
        }
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    pub fn into_payload(self) -> Payload {
        self.payload
    }
}
