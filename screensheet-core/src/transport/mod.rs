//! # Session transports
//!
//! A [`Transport`] opens one [`TransportHandle`] per accepted session and
//! produces the handshake the viewer needs to answer.
//!
//! | Variant   | Media path                         | Audio change   |
//! |-----------|------------------------------------|----------------|
//! | `peer`    | Direct peer connection + `input` channel | swapped in-band |
//! | `relayed` | Tile-delta frames through the relay | restart       |

pub mod peer;
pub mod relayed;
#[cfg(feature = "webrtc")]
pub mod rtc;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ShareError;
use crate::media::source::FrameSource;
use crate::media::types::ScreenSize;
use crate::protocol::signal::{IceCandidate, OfferBody, SessionDescription};
use crate::session::events::SessionEvents;
use crate::session::state::ConnectionStatus;

pub use peer::{
    CandidateQueue, INPUT_CHANNEL, PeerConnection, PeerConnector, PeerEvent, PeerState,
    PeerTransport,
};
pub use relayed::RelayedTransport;

/// Transport-specific handshake sent to the viewer in `session:offer`.
pub type HandshakeOffer = OfferBody;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    #[default]
    Peer,
    Relayed,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Peer => write!(f, "peer"),
            TransportKind::Relayed => write!(f, "relayed"),
        }
    }
}

/// How a transport applies an audio toggle to live sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioSwap {
    /// Replace the outbound audio track on each live session.
    InBand,
    /// Every live session must be torn down and re-established.
    Restart,
}

/// Inputs for opening one session.
#[derive(Clone)]
pub struct AcceptParams {
    pub source: Arc<dyn FrameSource>,
    pub screen: Option<ScreenSize>,
    pub audio_enabled: bool,
}

pub struct Opened {
    pub handle: Box<dyn TransportHandle>,
    pub offer: HandshakeOffer,
}

#[async_trait]
pub trait Transport: Send + Sync {
    fn kind(&self) -> TransportKind;

    fn audio_swap(&self) -> AudioSwap;

    /// Create media and connection state for one session. Anything
    /// created before a failure is released before returning.
    async fn open(&self, params: AcceptParams, events: SessionEvents)
    -> Result<Opened, ShareError>;

    /// Release transport-wide resources.
    async fn shutdown(&self) {}
}

/// Per-session transport state, owned exclusively by its session.
#[async_trait]
pub trait TransportHandle: Send + Sync {
    /// Apply the viewer's answer. Relayed sessions ignore it.
    async fn accept_answer(&mut self, answer: Option<SessionDescription>)
    -> Result<(), ShareError>;

    async fn add_candidate(&mut self, candidate: IceCandidate) -> Result<(), ShareError>;

    async fn set_audio(&mut self, enabled: bool, source: &dyn FrameSource)
    -> Result<(), ShareError>;

    fn status(&self) -> ConnectionStatus;

    /// Release everything the session holds. Idempotent.
    async fn close(&mut self);
}
