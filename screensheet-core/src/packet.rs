//! Relay envelopes.
//!
//! A [`Packet`] pairs an [`EventKind`] with a UTF-8 JSON payload. The
//! payload is always a JSON object so the broker can splice routing
//! fields (`viewerId`, `remoteLabel`) into it without understanding the
//! rest of the message.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::ShareError;
use crate::event::EventKind;

/// Largest JSON payload accepted, before or after compression.
pub const MAX_PAYLOAD_SIZE: usize = 16 * 1024 * 1024;

/// Payloads above this size are compressed on the wire.
pub const COMPRESS_THRESHOLD: usize = 16 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    kind: EventKind,
    payload: Vec<u8>,
}

impl Packet {
    /// Serialize `body` as the payload for `kind`.
    pub fn new<T: Serialize>(kind: EventKind, body: &T) -> Result<Self, ShareError> {
        let payload = serde_json::to_vec(body)?;
        Self::from_raw(kind, payload)
    }

    /// Build a packet from an already-encoded JSON payload.
    pub fn from_raw(kind: EventKind, payload: Vec<u8>) -> Result<Self, ShareError> {
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(ShareError::PayloadTooLarge {
                size: payload.len(),
                max: MAX_PAYLOAD_SIZE,
            });
        }
        Ok(Self { kind, payload })
    }

    pub fn from_object(kind: EventKind, object: Map<String, Value>) -> Result<Self, ShareError> {
        Self::new(kind, &Value::Object(object))
    }

    pub fn heartbeat() -> Self {
        Self {
            kind: EventKind::Heartbeat,
            payload: Vec::new(),
        }
    }

    pub fn register_host() -> Self {
        Self {
            kind: EventKind::RegisterHost,
            payload: b"{}".to_vec(),
        }
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    /// Parse the payload as a typed body.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, ShareError> {
        Ok(serde_json::from_slice(&self.payload)?)
    }

    /// Parse the payload as a JSON object.
    ///
    /// An empty payload is treated as `{}`.
    pub fn object(&self) -> Result<Map<String, Value>, ShareError> {
        if self.payload.is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_slice::<Value>(&self.payload)? {
            Value::Object(map) => Ok(map),
            _ => Err(ShareError::Other(format!(
                "{} payload is not a JSON object",
                self.kind
            ))),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
