//! Relay event kinds.
//!
//! Every envelope crossing the relay carries one of these kinds in its
//! header. Uses a proper enum with `TryFrom`, so unknown values are an
//! error rather than a panic.

use std::fmt;

use crate::error::ShareError;

// ── EventKind ────────────────────────────────────────────────────

/// All envelope kinds understood by the relay.
///
/// Organized by category:
/// - `0x0001..0x00FF`: Link-level (heartbeat, host registration)
/// - `0x0100..0x01FF`: Session signaling
/// - `0x0200..0x02FF`: Peer negotiation
/// - `0x0300..0x03FF`: Relayed media
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    // ── Link (0x00xx) ────────────────────────────────────────────
    /// Keep-alive. Consumed by the connection layer.
    Heartbeat = 0x0001,
    /// Host joins the host room.
    RegisterHost = 0x0010,

    // ── Session (0x01xx) ─────────────────────────────────────────
    /// Viewer asks to join.
    SessionRequest = 0x0101,
    /// Host answers a request with an offer (or a decline).
    SessionOffer = 0x0102,
    /// Viewer completes the handshake.
    SessionAnswer = 0x0103,
    /// Either side tears a session down.
    SessionDisconnect = 0x0104,
    /// Remote-control input travelling through the relay.
    SessionInput = 0x0105,
    /// Error code surfaced to a viewer.
    Error = 0x0106,

    // ── Negotiation (0x02xx) ─────────────────────────────────────
    /// ICE candidate exchange.
    Candidate = 0x0201,

    // ── Media (0x03xx) ───────────────────────────────────────────
    /// Tile-delta frame broadcast to viewers.
    StreamFrame = 0x0301,
}

impl EventKind {
    /// The textual event name used in logs and by browser viewers.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Heartbeat => "heartbeat",
            Self::RegisterHost => "register-host",
            Self::SessionRequest => "session:request",
            Self::SessionOffer => "session:offer",
            Self::SessionAnswer => "session:answer",
            Self::SessionDisconnect => "session:disconnect",
            Self::SessionInput => "session:input",
            Self::Error => "error",
            Self::Candidate => "webrtc:candidate",
            Self::StreamFrame => "stream:frame",
        }
    }
}

impl TryFrom<u16> for EventKind {
    type Error = ShareError;

    fn try_from(value: u16) -> Result<Self, ShareError> {
        match value {
            0x0001 => Ok(Self::Heartbeat),
            0x0010 => Ok(Self::RegisterHost),
            0x0101 => Ok(Self::SessionRequest),
            0x0102 => Ok(Self::SessionOffer),
            0x0103 => Ok(Self::SessionAnswer),
            0x0104 => Ok(Self::SessionDisconnect),
            0x0105 => Ok(Self::SessionInput),
            0x0106 => Ok(Self::Error),
            0x0201 => Ok(Self::Candidate),
            0x0301 => Ok(Self::StreamFrame),
            _ => Err(ShareError::UnknownVariant {
                type_name: "EventKind",
                value: value as u64,
            }),
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ── Tests ────────────────────────────────────────────────────────
