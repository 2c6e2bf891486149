//! Session records and their lifecycle.
//!
//! ```text
//!  (request) ──► Pending ──accept──► Connected ──► Disconnected ──► (removed)
//!                   │
//!                   └──decline──► (removed)
//! ```

use std::fmt;
use std::time::SystemTime;

use crate::error::ShareError;
use crate::media::types::ScreenSize;
use crate::transport::TransportKind;

pub type SessionId = String;

// ── SessionState ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    #[default]
    Pending,
    Connected,
    Disconnected,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Connected => write!(f, "connected"),
            Self::Disconnected => write!(f, "disconnected"),
        }
    }
}

// ── ConnectionStatus ─────────────────────────────────────────────

/// Transport-level status of a live session.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionStatus {
    Connecting = 0,
    Connected = 1,
    Disconnected = 2,
}

impl ConnectionStatus {
    pub(crate) fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Connected,
            2 => Self::Disconnected,
            _ => Self::Connecting,
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Disconnected => write!(f, "disconnected"),
        }
    }
}

/// Selector for `filter_connections`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusFilter {
    /// Every live session, whatever its transport status.
    All,
    Connecting,
    Connected,
    Disconnected,
    Pending,
}

// ── Session ──────────────────────────────────────────────────────

/// One viewer's session as tracked by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: SessionId,
    pub state: SessionState,
    pub transport: TransportKind,
    /// Printable origin of the viewer, as resolved by the relay.
    pub remote_label: Option<String>,
    pub connected_at: Option<SystemTime>,
    pub screen: Option<ScreenSize>,
    pub audio_enabled: bool,
}

impl Session {
    pub fn pending(id: impl Into<SessionId>, transport: TransportKind) -> Self {
        Self {
            id: id.into(),
            state: SessionState::Pending,
            transport,
            remote_label: None,
            connected_at: None,
            screen: None,
            audio_enabled: false,
        }
    }

    /// Transition to `Connected`.
    ///
    /// Valid from: `Pending`.
    pub fn connect(&mut self, screen: Option<ScreenSize>, audio_enabled: bool) -> Result<(), ShareError> {
        match self.state {
            SessionState::Pending => {
                self.state = SessionState::Connected;
                self.connected_at = Some(SystemTime::now());
                self.screen = screen;
                self.audio_enabled = audio_enabled;
                Ok(())
            }
            _ => Err(ShareError::InvalidTransition(
                "cannot connect: session is not pending",
            )),
        }
    }

    /// Transition to `Disconnected`.
    ///
    /// Valid from: `Connected`.
    pub fn disconnect(&mut self) -> Result<(), ShareError> {
        match self.state {
            SessionState::Connected => {
                self.state = SessionState::Disconnected;
                Ok(())
            }
            _ => Err(ShareError::InvalidTransition(
                "cannot disconnect: session is not connected",
            )),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
