//! Domain-specific error types for screensheet.
//!
//! All fallible operations return `Result<T, ShareError>`.
//! No panics on invalid input. Every error is typed, and
//! [`ShareError::class`] maps it onto the failure taxonomy the session
//! layer uses to decide between declining, retrying and tearing down.

use std::time::Duration;
use thiserror::Error;

/// The canonical error type for screensheet.
#[derive(Debug, Error)]
pub enum ShareError {
    // ── Session Errors ───────────────────────────────────────────
    /// Media or transport could not be created for a session.
    #[error("setup failed: {0}")]
    SetupFailure(String),

    /// Offer, answer or description exchange was rejected.
    #[error("negotiation failed: {0}")]
    NegotiationFailure(String),

    /// Candidate gathering did not complete in time.
    #[error("negotiation timed out after {0:?}")]
    NegotiationTimeout(Duration),

    /// A signaling message could not be applied (malformed candidate,
    /// message for an unknown session). Logged and dropped.
    #[error("transient signaling error: {0}")]
    TransientSignaling(String),

    /// The underlying link reported disconnected, failed or closed.
    #[error("transport lost: {0}")]
    TransportLoss(String),

    /// A tile or frame could not be encoded or decoded.
    #[error("encode error: {0}")]
    Encode(String),

    /// The frame source failed to produce a frame.
    #[error("capture error: {0}")]
    Capture(String),

    // ── State Errors ─────────────────────────────────────────────
    /// A lifecycle method was called in a state that does not allow it.
    #[error("invalid transition: {0}")]
    InvalidTransition(&'static str),

    /// A join request did not pass local validation.
    #[error("request rejected: {0}")]
    RequestRejected(&'static str),

    /// An audio confirmation token is not the one currently outstanding.
    #[error("stale or unknown confirmation token")]
    StaleConfirmation,

    // ── Protocol Errors ──────────────────────────────────────────
    /// Received bytes that do not start with the relay magic sequence.
    #[error("invalid magic bytes: expected SSR0")]
    InvalidMagic,

    /// The packet payload failed checksum verification.
    #[error("checksum mismatch")]
    ChecksumMismatch,

    /// A numeric value did not map to any known enum variant.
    #[error("unknown {type_name} discriminant: {value:#x}")]
    UnknownVariant { type_name: &'static str, value: u64 },

    /// The payload exceeds the configured maximum size.
    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// A payload could not be serialized or parsed.
    #[error("payload error: {0}")]
    Payload(#[from] serde_json::Error),

    /// zstd compression or decompression failed.
    #[error("compression error: {0}")]
    Compression(String),

    // ── Connection Errors ────────────────────────────────────────
    /// The TCP/IO layer reported an error.
    #[error("connection error: {0}")]
    Connection(#[from] std::io::Error),

    /// An mpsc channel was closed unexpectedly.
    #[error("channel closed")]
    ChannelClosed,

    /// An operation exceeded its deadline.
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    /// Catch-all for errors that do not fit another variant.
    #[error("{0}")]
    Other(String),
}

// ── ErrorClass ────────────────────────────────────────────────────

/// Coarse failure class used for logging and recovery decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Session is declined; nothing is retried.
    Setup,
    /// Session is torn down; the viewer may retry from idle.
    Negotiation,
    /// Logged and dropped; the session continues.
    TransientSignaling,
    /// Session transitions to disconnected and is removed.
    TransportLoss,
    /// The affected tile is skipped and retried next cycle.
    Encode,
    /// Wire or state error on the local side.
    Protocol,
}

impl ShareError {
    /// Map this error onto the session failure taxonomy.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::SetupFailure(_) | Self::Capture(_) => ErrorClass::Setup,
            Self::NegotiationFailure(_) | Self::NegotiationTimeout(_) => ErrorClass::Negotiation,
            Self::TransientSignaling(_) => ErrorClass::TransientSignaling,
            Self::TransportLoss(_) | Self::Connection(_) | Self::ChannelClosed => {
                ErrorClass::TransportLoss
            }
            Self::Encode(_) => ErrorClass::Encode,
            _ => ErrorClass::Protocol,
        }
    }

    /// Whether the error should be logged and swallowed at the
    /// operation boundary.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.class(),
            ErrorClass::TransientSignaling | ErrorClass::Encode
        )
    }
}

// ── Convenient From implementations ──────────────────────────────

impl From<String> for ShareError {
    fn from(s: String) -> Self {
        ShareError::Other(s)
    }
}

impl From<&str> for ShareError {
    fn from(s: &str) -> Self {
        ShareError::Other(s.to_string())
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for ShareError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        ShareError::ChannelClosed
    }
}

impl From<image::ImageError> for ShareError {
    fn from(e: image::ImageError) -> Self {
        ShareError::Encode(e.to_string())
    }
}

impl From<base64::DecodeError> for ShareError {
    fn from(e: base64::DecodeError) -> Self {
        ShareError::Encode(e.to_string())
    }
}

// ── Tests ────────────────────────────────────────────────────────
