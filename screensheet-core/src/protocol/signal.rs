//! Session signaling payloads.
//!
//! Field names follow the camelCase JSON used on the relay. Routing
//! fields (`viewerId`, `remoteLabel`) are filled in by the broker and
//! are optional on the sending side.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ShareError;

// ── Descriptions & candidates ────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpKind {
    Offer,
    Answer,
}

/// An SDP session description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub kind: SdpKind,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Answer,
            sdp: sdp.into(),
        }
    }
}

/// An ICE candidate in its JSON init form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(rename = "sdpMid", default, skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,
    #[serde(rename = "sdpMLineIndex", default, skip_serializing_if = "Option::is_none")]
    pub sdp_mline_index: Option<u16>,
    #[serde(
        rename = "usernameFragment",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub username_fragment: Option<String>,
}

// ── Request ──────────────────────────────────────────────────────

/// `session:request`: a viewer asks to join.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewer_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_label: Option<String>,
}

impl SessionRequest {
    pub fn with_code(code: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            ..Default::default()
        }
    }

    pub fn with_credentials(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            password: Some(password.into()),
            ..Default::default()
        }
    }

    /// Credentials, when both halves are present.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.username, &self.password) {
            (Some(u), Some(p)) => Some((u.as_str(), p.as_str())),
            _ => None,
        }
    }
}

// ── Offer ────────────────────────────────────────────────────────

/// Stream parameters for the relayed fallback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamParams {
    pub width: u32,
    pub height: u32,
    pub codec: String,
}

/// Codec name advertised by the tile-delta stream.
pub const TILED_CODEC: &str = "tiled";

/// A peer offer: the local description plus the candidates gathered
/// before it was sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerOffer {
    #[serde(rename = "type")]
    pub kind: SdpKind,
    pub sdp: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub candidates: Vec<IceCandidate>,
}

impl PeerOffer {
    pub fn new(description: SessionDescription, candidates: Vec<IceCandidate>) -> Self {
        Self {
            kind: description.kind,
            sdp: description.sdp,
            candidates,
        }
    }

    pub fn description(&self) -> SessionDescription {
        SessionDescription {
            kind: self.kind,
            sdp: self.sdp.clone(),
        }
    }
}

/// Transport-specific half of an offer.
///
/// Untagged: a peer offer has `type`/`sdp`, a relayed one has
/// `width`/`height`/`codec`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OfferBody {
    Peer(PeerOffer),
    Relayed(StreamParams),
}

/// `session:offer`: host response to a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionOffer {
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offer: Option<OfferBody>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub declined: bool,
}

impl SessionOffer {
    pub fn declined(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            offer: None,
            declined: true,
        }
    }

    pub fn accepted(session_id: impl Into<String>, offer: OfferBody) -> Self {
        Self {
            session_id: session_id.into(),
            offer: Some(offer),
            declined: false,
        }
    }
}

// ── Answer / candidate / disconnect ──────────────────────────────

/// `session:answer`: viewer completes the handshake.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionAnswer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewer_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<SessionDescription>,
}

/// `webrtc:candidate` in either direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewer_id: Option<String>,
    pub candidate: IceCandidate,
}

/// `session:disconnect` in either direction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisconnectNotice {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewer_id: Option<String>,
}

impl DisconnectNotice {
    pub fn to_viewer(session_id: impl Into<String>) -> Self {
        Self {
            session_id: Some(session_id.into()),
            viewer_id: None,
        }
    }
}

/// Resolve the session a host-bound message refers to. The broker's
/// `viewerId` wins over a self-declared `sessionId`.
pub fn origin<'a>(viewer_id: &'a Option<String>, session_id: &'a Option<String>) -> Option<&'a str> {
    viewer_id.as_deref().or(session_id.as_deref())
}

// ── Errors ───────────────────────────────────────────────────────

/// Error codes surfaced to viewers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// The connection code does not match an active host.
    InvalidCode,
    /// The host declined the request.
    Declined,
    /// The host ended the session.
    DisconnectedByHost,
    /// Any other code.
    Unknown(u16),
}

impl ErrorCode {
    pub const fn code(self) -> u16 {
        match self {
            Self::InvalidCode => 404,
            Self::Declined => 403,
            Self::DisconnectedByHost => 410,
            Self::Unknown(c) => c,
        }
    }
}

impl From<u16> for ErrorCode {
    fn from(code: u16) -> Self {
        match code {
            404 => Self::InvalidCode,
            403 => Self::Declined,
            410 => Self::DisconnectedByHost,
            other => Self::Unknown(other),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidCode => write!(f, "invalid code (404)"),
            Self::Declined => write!(f, "declined by host (403)"),
            Self::DisconnectedByHost => write!(f, "disconnected by host (410)"),
            Self::Unknown(c) => write!(f, "unknown error ({c})"),
        }
    }
}

/// `error`: routed to a single viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorNotice {
    pub session_id: String,
    pub code: u16,
}

impl ErrorNotice {
    pub fn new(session_id: impl Into<String>, code: ErrorCode) -> Self {
        Self {
            session_id: session_id.into(),
            code: code.code(),
        }
    }

    pub fn error_code(&self) -> ErrorCode {
        ErrorCode::from(self.code)
    }
}

/// Parse `{width, height}` sent by the host over the peer data channel.
pub fn parse_screen_size(text: &str) -> Result<(u32, u32), ShareError> {
    #[derive(Deserialize)]
    struct Size {
        width: u32,
        height: u32,
    }
    let size: Size = serde_json::from_str(text)?;
    Ok((size.width, size.height))
}

// ── Tests ────────────────────────────────────────────────────────
