//! Per-session event channel.
//!
//! Transports report status changes, inbound input and locally gathered
//! candidates through a [`SessionEvents`]. Status reports are
//! de-duplicated so each transition is delivered once.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use tokio::sync::mpsc;

use crate::protocol::input::InputEvent;
use crate::protocol::signal::IceCandidate;
use crate::session::state::{ConnectionStatus, SessionId};

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    StatusChanged {
        id: SessionId,
        status: ConnectionStatus,
    },
    Input {
        id: SessionId,
        event: InputEvent,
    },
    LocalCandidate {
        id: SessionId,
        candidate: IceCandidate,
    },
}

pub type SessionEventReceiver = mpsc::UnboundedReceiver<SessionEvent>;

#[derive(Debug, Clone)]
pub struct SessionEvents {
    id: SessionId,
    tx: mpsc::UnboundedSender<SessionEvent>,
    status: Arc<AtomicU8>,
}

impl SessionEvents {
    pub fn new(id: impl Into<SessionId>, tx: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self {
            id: id.into(),
            tx,
            status: Arc::new(AtomicU8::new(ConnectionStatus::Connecting as u8)),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn current(&self) -> ConnectionStatus {
        ConnectionStatus::from_u8(self.status.load(Ordering::SeqCst))
    }

    /// Record `status` and emit it if it differs from the last one.
    /// Nothing is emitted after `Disconnected`.
    pub fn status(&self, status: ConnectionStatus) -> bool {
        let changed = self
            .status
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |cur| {
                let cur = ConnectionStatus::from_u8(cur);
                (cur != status && cur != ConnectionStatus::Disconnected).then_some(status as u8)
            })
            .is_ok();
        if !changed {
            return false;
        }
        let _ = self.tx.send(SessionEvent::StatusChanged {
            id: self.id.clone(),
            status,
        });
        true
    }

    /// Record the final status without emitting anything; used when the
    /// owner itself tore the session down.
    pub fn settle(&self) {
        self.status
            .store(ConnectionStatus::Disconnected as u8, Ordering::SeqCst);
    }

    pub fn input(&self, event: InputEvent) {
        let _ = self.tx.send(SessionEvent::Input {
            id: self.id.clone(),
            event,
        });
    }

    pub fn local_candidate(&self, candidate: IceCandidate) {
        let _ = self.tx.send(SessionEvent::LocalCandidate {
            id: self.id.clone(),
            candidate,
        });
    }
}
