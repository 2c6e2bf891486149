//! Async viewer driver.
//!
//! Owns the relay connection and a [`ViewerSession`], multiplexing relay
//! packets, peer-stack events and local commands on one task. Progress
//! is published through a `watch` channel so a UI can poll the latest
//! state without blocking the loop.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::ShareError;
use crate::network::{ConnectionInfo, RelayConnection};
use crate::packet::Packet;
use crate::protocol::input::InputEvent;
use crate::transport::peer::{PeerConnector, PeerEvent};
use crate::viewer::session::{JoinRequest, ViewerEvent, ViewerPhase, ViewerSession};

// ── ViewerStats ──────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewerStats {
    pub phase: ViewerPhase,
    pub session_id: Option<String>,
    pub frames: u64,
    pub tiles: u64,
    pub width: u32,
    pub height: u32,
}

/// Local requests fed into [`ViewerClient::run`].
#[derive(Debug)]
pub enum ViewerCommand {
    Input(InputEvent),
    /// Write the current relayed surface as PNG.
    Snapshot(PathBuf),
    Leave,
}

// ── ViewerClient ─────────────────────────────────────────────────

pub struct ViewerClient {
    conn: RelayConnection,
    session: ViewerSession,
    peer_rx: Option<mpsc::UnboundedReceiver<PeerEvent>>,
    stats_tx: watch::Sender<ViewerStats>,
    stats_rx: watch::Receiver<ViewerStats>,
}

impl ViewerClient {
    pub async fn connect(
        info: &ConnectionInfo,
        connector: Option<Arc<dyn PeerConnector>>,
    ) -> Result<Self, ShareError> {
        let conn = RelayConnection::connect(info).await?;
        info!(relay = %info, "connected to relay");
        Ok(Self::from_connection(conn, connector))
    }

    pub fn from_connection(conn: RelayConnection, connector: Option<Arc<dyn PeerConnector>>) -> Self {
        let (stats_tx, stats_rx) = watch::channel(ViewerStats::default());
        Self {
            conn,
            session: ViewerSession::new(connector),
            peer_rx: None,
            stats_tx,
            stats_rx,
        }
    }

    pub fn session(&self) -> &ViewerSession {
        &self.session
    }

    pub fn stats_receiver(&self) -> watch::Receiver<ViewerStats> {
        self.stats_rx.clone()
    }

    /// Send the join request for `join`.
    pub async fn join(&mut self, join: &JoinRequest) -> Result<(), ShareError> {
        let packet = self.session.request(join)?;
        self.conn.send(packet).await?;
        self.session.request_sent();
        self.publish(0);
        Ok(())
    }

    /// Drive the session until the relay closes or `shutdown` fires.
    ///
    /// Every [`ViewerEvent`] is forwarded on `events`.
    pub async fn run(
        &mut self,
        mut commands: mpsc::Receiver<ViewerCommand>,
        events: mpsc::Sender<ViewerEvent>,
        shutdown: CancellationToken,
    ) -> Result<(), ShareError> {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    self.leave().await?;
                    break;
                }
                packet = self.conn.recv() => {
                    let Some(packet) = packet else {
                        info!("relay closed");
                        break;
                    };
                    match self.session.handle(packet).await {
                        Ok(replies) => self.send_all(replies).await?,
                        Err(e) if e.is_transient() => debug!("dropped relay packet: {e}"),
                        Err(e) => warn!(class = ?e.class(), "relay packet rejected: {e}"),
                    }
                    if let Some(rx) = self.session.take_peer_events() {
                        self.peer_rx = Some(rx);
                    }
                }
                event = next_peer_event(&mut self.peer_rx) => match event {
                    Some(event) => {
                        let replies = self.session.handle_peer_event(event).await?;
                        self.send_all(replies).await?;
                    }
                    None => self.peer_rx = None,
                },
                command = commands.recv() => match command {
                    Some(ViewerCommand::Input(event)) => match self.session.send_input(event).await {
                        Ok(Some(packet)) => self.conn.send(packet).await?,
                        Ok(None) => {}
                        Err(e) => warn!("input not delivered: {e}"),
                    },
                    Some(ViewerCommand::Snapshot(path)) => self.snapshot(&path),
                    Some(ViewerCommand::Leave) => self.leave().await?,
                    None => {
                        self.leave().await?;
                        break;
                    }
                },
            }

            if self.session.transport().is_none() {
                self.peer_rx = None;
            }
            let mut tiles = 0;
            while let Some(event) = self.session.next_event() {
                if let ViewerEvent::Frame { tiles: n } = event {
                    tiles += n as u64;
                }
                if events.send(event).await.is_err() {
                    debug!("event receiver dropped");
                }
            }
            self.publish(tiles);
        }
        self.publish(0);
        Ok(())
    }

    async fn leave(&mut self) -> Result<(), ShareError> {
        if let Some(packet) = self.session.disconnect().await? {
            self.conn.send(packet).await?;
        }
        self.peer_rx = None;
        Ok(())
    }

    async fn send_all(&self, packets: Vec<Packet>) -> Result<(), ShareError> {
        for packet in packets {
            self.conn.send(packet).await?;
        }
        Ok(())
    }

    fn snapshot(&self, path: &Path) {
        let Some(compositor) = self.session.compositor() else {
            debug!("no relayed surface to snapshot");
            return;
        };
        match compositor.save_png(path) {
            Ok(()) => debug!(path = %path.display(), "snapshot written"),
            Err(e) => warn!(path = %path.display(), "snapshot failed: {e}"),
        }
    }

    fn publish(&self, new_tiles: u64) {
        let session = &self.session;
        self.stats_tx.send_modify(|stats| {
            stats.phase = session.phase();
            stats.session_id = session.session_id().map(str::to_string);
            if let Some(screen) = session.screen_size() {
                stats.width = screen.width;
                stats.height = screen.height;
            }
            if let Some(compositor) = session.compositor() {
                stats.frames = compositor.frame_count();
            }
            stats.tiles += new_tiles;
        });
    }
}

async fn next_peer_event(rx: &mut Option<mpsc::UnboundedReceiver<PeerEvent>>) -> Option<PeerEvent> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
