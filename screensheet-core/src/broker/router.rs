//! Envelope routing between hosts and viewers.
//!
//! The router knows which connections are live, which of them joined
//! the host room, and how to reach each one. It reads and writes only
//! the routing fields `sessionId`, `viewerId` and `remoteLabel`; every
//! other payload field passes through untouched.
//!
//! Delivery never waits on a recipient: a connection whose outbound
//! queue is full loses that packet, and the sender moves on.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};

use crate::error::ShareError;
use crate::event::EventKind;
use crate::network::ConnectionSender;
use crate::packet::Packet;

pub type ConnId = String;

/// Name of the single group every host joins.
pub const HOST_ROOM: &str = "host-room";

const SESSION_ID: &str = "sessionId";
const VIEWER_ID: &str = "viewerId";
const REMOTE_LABEL: &str = "remoteLabel";

#[derive(Debug, Clone)]
struct Member {
    tx: ConnectionSender,
    remote_label: String,
    in_host_room: bool,
}

/// Live connection table.
#[derive(Debug, Default)]
pub struct Router {
    members: RwLock<HashMap<ConnId, Member>>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a freshly accepted connection.
    pub async fn attach(&self, id: &str, tx: ConnectionSender, addr: Option<SocketAddr>) {
        let member = Member {
            tx,
            remote_label: addr.map(remote_label).unwrap_or_default(),
            in_host_room: false,
        };
        self.members.write().await.insert(id.to_string(), member);
        debug!(conn = %id, "connection attached");
    }

    pub async fn connection_count(&self) -> usize {
        self.members.read().await.len()
    }

    pub async fn host_count(&self) -> usize {
        self.members
            .read()
            .await
            .values()
            .filter(|m| m.in_host_room)
            .count()
    }

    pub async fn is_host(&self, id: &str) -> bool {
        self.members
            .read()
            .await
            .get(id)
            .is_some_and(|m| m.in_host_room)
    }

    // ── Operations ───────────────────────────────────────────────

    /// Add `conn` to the host room. Idempotent.
    pub async fn register_host(&self, conn: &str) {
        let mut members = self.members.write().await;
        match members.get_mut(conn) {
            Some(m) if !m.in_host_room => {
                m.in_host_room = true;
                info!(conn = %conn, "host joined {HOST_ROOM}");
            }
            Some(_) => {}
            None => warn!(conn = %conn, "register-host from unknown connection"),
        }
    }

    /// Forward a join request to every host, tagged with the viewer's
    /// connection id and resolved address.
    pub async fn relay_request(&self, viewer: &str, mut payload: Map<String, Value>) -> usize {
        let label = self
            .members
            .read()
            .await
            .get(viewer)
            .map(|m| m.remote_label.clone())
            .unwrap_or_default();
        payload.insert(VIEWER_ID.into(), Value::String(viewer.to_string()));
        payload.insert(REMOTE_LABEL.into(), Value::String(label));
        self.send_to_hosts(EventKind::SessionRequest, payload).await
    }

    /// Unicast to a single connection. Absent targets are dropped.
    pub async fn relay_to_viewer(&self, target: &str, packet: Packet) -> bool {
        let tx = self.members.read().await.get(target).map(|m| m.tx.clone());
        match tx {
            Some(tx) => deliver(&tx, target, packet),
            None => {
                debug!(target = %target, kind = %packet.kind(), "dropping message for absent target");
                false
            }
        }
    }

    /// Forward a viewer-originated message to every host.
    pub async fn relay_to_host_room(
        &self,
        kind: EventKind,
        viewer: &str,
        mut payload: Map<String, Value>,
    ) -> usize {
        payload.insert(VIEWER_ID.into(), Value::String(viewer.to_string()));
        self.send_to_hosts(kind, payload).await
    }

    /// Fan a frame out to every viewer except `sender`.
    pub async fn broadcast_frame(&self, sender: &str, packet: Packet) -> usize {
        let targets: Vec<(ConnId, ConnectionSender)> = self
            .members
            .read()
            .await
            .iter()
            .filter(|(id, m)| id.as_str() != sender && !m.in_host_room)
            .map(|(id, m)| (id.clone(), m.tx.clone()))
            .collect();

        targets
            .iter()
            .filter(|(id, tx)| deliver(tx, id, packet.clone()))
            .count()
    }

    /// Drop all routes for `conn` and tell the hosts it is gone.
    pub async fn on_disconnect(&self, conn: &str) {
        let removed = self.members.write().await.remove(conn);
        if removed.is_none() {
            return;
        }
        info!(conn = %conn, "connection closed");
        let mut payload = Map::new();
        payload.insert(VIEWER_ID.into(), Value::String(conn.to_string()));
        self.send_to_hosts(EventKind::SessionDisconnect, payload).await;
    }

    // ── Dispatch ─────────────────────────────────────────────────

    /// Route one inbound packet from `from`.
    pub async fn dispatch(&self, from: &str, packet: Packet) -> Result<(), ShareError> {
        match packet.kind() {
            EventKind::Heartbeat => {}
            EventKind::RegisterHost => self.register_host(from).await,
            EventKind::SessionRequest => {
                let payload = packet.object()?;
                let hosts = self.relay_request(from, payload).await;
                if hosts == 0 {
                    debug!(viewer = %from, "request with no host registered");
                }
            }
            EventKind::SessionOffer | EventKind::Error => {
                let payload = packet.object()?;
                match session_target(&payload) {
                    Some(target) => {
                        self.relay_to_viewer(&target, packet).await;
                    }
                    None => warn!(from = %from, kind = %packet.kind(), "missing sessionId"),
                }
            }
            EventKind::SessionAnswer | EventKind::SessionInput => {
                let payload = packet.object()?;
                self.relay_to_host_room(packet.kind(), from, payload).await;
            }
            EventKind::Candidate | EventKind::SessionDisconnect => {
                let payload = packet.object()?;
                match session_target(&payload) {
                    Some(target) => {
                        self.relay_to_viewer(&target, packet).await;
                    }
                    None => {
                        self.relay_to_host_room(packet.kind(), from, payload).await;
                    }
                }
            }
            EventKind::StreamFrame => {
                self.broadcast_frame(from, packet).await;
            }
        }
        Ok(())
    }

    async fn send_to_hosts(&self, kind: EventKind, payload: Map<String, Value>) -> usize {
        let hosts: Vec<(ConnId, ConnectionSender)> = self
            .members
            .read()
            .await
            .iter()
            .filter(|(_, m)| m.in_host_room)
            .map(|(id, m)| (id.clone(), m.tx.clone()))
            .collect();
        if hosts.is_empty() {
            return 0;
        }

        let packet = match Packet::from_object(kind, payload) {
            Ok(p) => p,
            Err(e) => {
                warn!(%kind, "cannot re-encode payload: {e}");
                return 0;
            }
        };

        hosts
            .iter()
            .filter(|(id, tx)| deliver(tx, id, packet.clone()))
            .count()
    }
}

/// Queue `packet` for `target` without waiting.
fn deliver(tx: &ConnectionSender, target: &str, packet: Packet) -> bool {
    let kind = packet.kind();
    match tx.try_send(packet) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            debug!(target = %target, %kind, "outbound queue full, packet dropped");
            false
        }
        Err(TrySendError::Closed(_)) => {
            debug!(target = %target, %kind, "target closed before delivery");
            false
        }
    }
}

fn session_target(payload: &Map<String, Value>) -> Option<String> {
    payload
        .get(SESSION_ID)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Printable peer address; IPv4-mapped IPv6 addresses are shown as
/// plain IPv4.
pub fn remote_label(addr: SocketAddr) -> String {
    match addr.ip() {
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => v4.to_string(),
            None => v6.to_string(),
        },
        IpAddr::V4(v4) => v4.to_string(),
    }
}

// ── Tests ────────────────────────────────────────────────────────
