//! The sharing side of a session.
//!
//! A [`HostAgent`] registers with the relay, hands out a connection
//! code, screens join requests and drives the [`SessionRegistry`]. It
//! runs as a single task that owns the registry; everything else talks
//! to it over channels.
//!
//! ```text
//!  relay packets ─┐
//!  session events ─┼─► HostAgent::run ──► relay packets
//!  relayed frames ─┤        │
//!  HostCommand    ─┘        └──► HostEvent
//! ```

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::code::{generate_code, normalize_code};
use crate::error::ShareError;
use crate::event::EventKind;
use crate::host::config::{HostConfig, NegotiationSettings, RelaySettings};
use crate::host::policy::{ApprovalPolicy, InputSink, JoinAttempt, Review};
use crate::media::source::FrameSource;
use crate::media::types::ScreenSize;
use crate::network::{ConnectionInfo, ConnectionSender, RelayConnection};
use crate::packet::Packet;
use crate::protocol::frame::StreamFrame;
use crate::protocol::input::{InputEvent, InputMessage};
use crate::protocol::signal::{
    CandidateMessage, DisconnectNotice, ErrorCode, ErrorNotice, SessionAnswer, SessionOffer,
    SessionRequest, origin,
};
use crate::session::events::{SessionEvent, SessionEventReceiver};
use crate::session::registry::{AudioChange, ConfirmationToken, Drained, SessionRegistry};
use crate::session::state::{ConnectionStatus, SessionId};
use crate::transport::{PeerConnector, PeerTransport, RelayedTransport, Transport, TransportKind};

/// Depth of the relayed frame queue. The cadence loop waits for space
/// while it is full, so capture runs no faster than frames are relayed.
const FRAME_QUEUE: usize = 4;

// ── Status & events ──────────────────────────────────────────────

/// Aggregate status shown to the local user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HostStatus {
    #[default]
    Inactive,
    /// Registered and waiting for viewers.
    Active,
    Connected,
    /// The last connected viewer went away.
    Disconnected,
}

impl fmt::Display for HostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inactive => write!(f, "inactive"),
            Self::Active => write!(f, "active"),
            Self::Connected => write!(f, "connected"),
            Self::Disconnected => write!(f, "disconnected"),
        }
    }
}

#[derive(Debug)]
pub enum HostEvent {
    Status(HostStatus),
    /// A coded request waits for `Approve` or `Decline`.
    Request(JoinAttempt),
    SessionConnected(SessionId),
    SessionClosed(SessionId),
    /// Applying the audio toggle would drop live sessions.
    AudioConfirmation(ConfirmationToken),
    AudioChanged(bool),
}

#[derive(Debug)]
pub enum HostCommand {
    Approve(SessionId),
    Decline(SessionId),
    Disconnect(SessionId),
    SetAudio(bool),
    ConfirmAudio(ConfirmationToken),
    DeclineAudio(ConfirmationToken),
    SetControl(bool),
    Stop,
}

/// Collaborators the agent needs from the embedding application.
#[derive(Clone)]
pub struct HostParts {
    pub source: Arc<dyn FrameSource>,
    pub policy: Arc<dyn ApprovalPolicy>,
    pub input: Arc<dyn InputSink>,
    /// Peer method only. When `None`, a connector is built from
    /// `negotiation.ice_servers` if the `webrtc` feature is enabled.
    pub connector: Option<Arc<dyn PeerConnector>>,
}

// ── HostAgent ────────────────────────────────────────────────────

pub struct HostAgent {
    code: String,
    relay: RelaySettings,
    control: bool,
    status: HostStatus,
    screen: Option<ScreenSize>,
    registry: SessionRegistry,
    session_events: SessionEventReceiver,
    frames: Option<mpsc::Receiver<StreamFrame>>,
    parts: HostParts,
    out: Option<ConnectionSender>,
    commands_tx: mpsc::Sender<HostCommand>,
    commands_rx: mpsc::Receiver<HostCommand>,
    events: mpsc::UnboundedSender<HostEvent>,
}

impl HostAgent {
    /// Build an agent for `config.sharing.method`. Returns the agent and
    /// the stream of [`HostEvent`]s.
    pub fn new(
        config: &HostConfig,
        parts: HostParts,
    ) -> Result<(Self, mpsc::UnboundedReceiver<HostEvent>), ShareError> {
        let (transport, frames): (Box<dyn Transport>, _) = match config.sharing.method {
            TransportKind::Peer => {
                let connector = match parts.connector.clone() {
                    Some(connector) => connector,
                    None => default_connector(&config.negotiation)?,
                };
                let transport = PeerTransport::new(connector, config.negotiation.ice_timeout());
                (Box::new(transport), None)
            }
            TransportKind::Relayed => {
                let (tx, rx) = mpsc::channel(FRAME_QUEUE);
                (Box::new(RelayedTransport::new(config.tiles, tx)?), Some(rx))
            }
        };
        let (registry, session_events) = SessionRegistry::new(transport, config.sharing.audio);
        let (commands_tx, commands_rx) = mpsc::channel(32);
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let agent = Self {
            code: generate_code(),
            relay: config.relay.clone(),
            control: config.sharing.control,
            status: HostStatus::Inactive,
            screen: None,
            registry,
            session_events,
            frames,
            parts,
            out: None,
            commands_tx,
            commands_rx,
            events: events_tx,
        };
        Ok((agent, events_rx))
    }

    /// The code viewers type to join.
    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn commands(&self) -> mpsc::Sender<HostCommand> {
        self.commands_tx.clone()
    }

    pub fn status(&self) -> HostStatus {
        self.status
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Open a connection to the configured relay, heartbeating at the
    /// configured interval.
    pub async fn dial(&self) -> Result<RelayConnection, ShareError> {
        let info = ConnectionInfo::parse(&self.relay.address)?;
        let conn = RelayConnection::connect_with_heartbeat(&info, self.relay.heartbeat()).await?;
        info!(relay = %info, "connected to relay");
        Ok(conn)
    }

    /// [`dial`](Self::dial) the relay, then [`run`](Self::run) on it.
    pub async fn serve(self, shutdown: CancellationToken) -> Result<(), ShareError> {
        let conn = self.dial().await?;
        self.run(conn, shutdown).await
    }

    /// Serve viewers over `conn` until the relay closes, `Stop` is
    /// received or `shutdown` fires.
    pub async fn run(
        mut self,
        conn: RelayConnection,
        shutdown: CancellationToken,
    ) -> Result<(), ShareError> {
        let (out, mut inbound) = conn.into_parts();
        out.send(Packet::register_host()).await?;
        self.out = Some(out);

        self.screen = match self.parts.source.capture().await {
            Ok(frame) => Some(frame.size()),
            Err(e) => {
                warn!("screen size unavailable: {e}");
                None
            }
        };
        info!(code = %self.code, transport = %self.registry.kind(), "host registered");
        self.set_status(HostStatus::Active);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                packet = inbound.recv() => match packet {
                    Some(packet) => self.on_packet(packet).await,
                    None => {
                        warn!("relay closed");
                        break;
                    }
                },
                Some(event) = self.session_events.recv() => self.on_session_event(event).await,
                Some(frame) = next_frame(&mut self.frames) => {
                    self.send(EventKind::StreamFrame, &frame).await;
                }
                Some(command) = self.commands_rx.recv() => {
                    if matches!(command, HostCommand::Stop) {
                        break;
                    }
                    self.on_command(command).await;
                }
            }
        }

        self.stop().await;
        Ok(())
    }

    async fn stop(&mut self) {
        let drained = self.registry.disconnect_all().await;
        self.notify_drained(&drained).await;
        self.registry.shutdown().await;
        self.parts.source.stop();
        self.out = None;
        self.set_status(HostStatus::Inactive);
        info!(
            dropped = drained.connected.len(),
            declined = drained.pending.len(),
            "host stopped"
        );
    }

    /// Tell every viewer removed by `disconnect_all`: live sessions get a
    /// disconnect notice, unanswered requests a declined offer.
    async fn notify_drained(&self, drained: &Drained) {
        for id in &drained.connected {
            self.notify_viewer(id).await;
        }
        for id in &drained.pending {
            self.send(EventKind::SessionOffer, &SessionOffer::declined(id))
                .await;
        }
    }

    // ── Relay packets ────────────────────────────────────────────

    async fn on_packet(&mut self, packet: Packet) {
        let kind = packet.kind();
        let result = match kind {
            EventKind::SessionRequest => match packet.decode() {
                Ok(req) => self.on_request(req).await,
                Err(e) => Err(e),
            },
            EventKind::SessionAnswer => match packet.decode() {
                Ok(answer) => self.on_answer(answer).await,
                Err(e) => Err(e),
            },
            EventKind::Candidate => match packet.decode::<CandidateMessage>() {
                Ok(msg) => match origin(&msg.viewer_id, &msg.session_id) {
                    Some(id) => self.registry.add_candidate(id, msg.candidate).await,
                    None => Err(ShareError::TransientSignaling("candidate without origin".into())),
                },
                Err(e) => Err(e),
            },
            EventKind::SessionDisconnect => match packet.decode::<DisconnectNotice>() {
                Ok(notice) => {
                    if let Some(id) = origin(&notice.viewer_id, &notice.session_id) {
                        self.on_viewer_gone(id.to_string()).await;
                    }
                    Ok(())
                }
                Err(e) => Err(e),
            },
            EventKind::SessionInput => match packet.decode::<InputMessage>() {
                Ok(msg) => {
                    if let Some(id) = origin(&msg.viewer_id, &msg.session_id) {
                        self.forward_input(id, &msg.event);
                    }
                    Ok(())
                }
                Err(e) => Err(e),
            },
            other => {
                debug!(kind = %other, "ignoring packet");
                Ok(())
            }
        };
        if let Err(e) = result {
            warn!(%kind, class = ?e.class(), "{e}");
        }
    }

    async fn on_request(&mut self, req: SessionRequest) -> Result<(), ShareError> {
        let Some(id) = req.viewer_id.clone() else {
            return Err(ShareError::TransientSignaling("request without viewer id".into()));
        };
        let attempt = JoinAttempt {
            session_id: id.clone(),
            remote_label: req.remote_label.clone().filter(|l| !l.is_empty()),
        };

        if let Some((username, password)) = req.credentials() {
            if !self.parts.policy.authenticate(username, password) {
                info!(session = %id, "credentials rejected");
                return self.send_error(&id, ErrorCode::InvalidCode).await;
            }
            self.registry.add_offer(id.clone(), attempt.remote_label)?;
            info!(session = %id, "unattended access granted");
            self.approve(&id).await;
            return Ok(());
        }

        let matches = req
            .code
            .as_deref()
            .and_then(normalize_code)
            .is_some_and(|code| code == self.code);
        if !matches {
            debug!(session = %id, "request with wrong code");
            return self.send_error(&id, ErrorCode::InvalidCode).await;
        }

        self.registry
            .add_offer(id.clone(), attempt.remote_label.clone())?;
        match self.parts.policy.review(&attempt) {
            Review::Approve => self.approve(&id).await,
            Review::Decline => self.decline(&id).await,
            Review::Prompt => self.emit(HostEvent::Request(attempt)),
        }
        Ok(())
    }

    async fn approve(&mut self, id: &str) {
        let offer = self
            .registry
            .accept_offer(id, Arc::clone(&self.parts.source), self.screen)
            .await;
        let reply = match offer {
            Some(offer) => SessionOffer::accepted(id, offer),
            None => SessionOffer::declined(id),
        };
        self.send(EventKind::SessionOffer, &reply).await;
    }

    async fn decline(&mut self, id: &str) {
        if self.registry.remove_offer(id).is_none() {
            debug!(session = %id, "decline for unknown request");
        }
        info!(session = %id, "request declined");
        self.send(EventKind::SessionOffer, &SessionOffer::declined(id))
            .await;
    }

    async fn on_answer(&mut self, answer: SessionAnswer) -> Result<(), ShareError> {
        let Some(id) = origin(&answer.viewer_id, &answer.session_id).map(str::to_string) else {
            return Err(ShareError::TransientSignaling("answer without origin".into()));
        };
        let result = self.registry.accept_answer(&id, answer.answer).await;
        if result.is_err() && !self.registry.is_connected(&id) {
            // Torn down by the registry.
            self.notify_viewer(&id).await;
            self.emit(HostEvent::SessionClosed(id));
            self.refresh_status();
        }
        result
    }

    /// The viewer left or its relay connection dropped.
    async fn on_viewer_gone(&mut self, id: SessionId) {
        if self.registry.is_connected(&id) {
            self.registry.disconnect(&id).await;
            self.emit(HostEvent::SessionClosed(id));
            self.refresh_status();
        } else if self.registry.remove_offer(&id).is_some() {
            debug!(session = %id, "pending request withdrawn");
            self.emit(HostEvent::SessionClosed(id));
        }
    }

    fn forward_input(&self, id: &str, event: &InputEvent) {
        if !self.control {
            debug!(session = %id, "control disabled, input dropped");
            return;
        }
        if !self.registry.is_connected(id) {
            debug!(session = %id, "input from unknown session");
            return;
        }
        self.parts.input.inject(id, event);
    }

    // ── Session events ───────────────────────────────────────────

    async fn on_session_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::StatusChanged { id, status } => match status {
                ConnectionStatus::Connecting => {}
                ConnectionStatus::Connected => {
                    info!(session = %id, "viewer connected");
                    self.emit(HostEvent::SessionConnected(id));
                    self.refresh_status();
                }
                ConnectionStatus::Disconnected => {
                    if self.registry.disconnect(&id).await.is_some() {
                        self.notify_viewer(&id).await;
                        self.emit(HostEvent::SessionClosed(id));
                    }
                    self.refresh_status();
                }
            },
            SessionEvent::Input { id, event } => self.forward_input(&id, &event),
            SessionEvent::LocalCandidate { id, candidate } => {
                let msg = CandidateMessage {
                    session_id: Some(id),
                    viewer_id: None,
                    candidate,
                };
                self.send(EventKind::Candidate, &msg).await;
            }
        }
    }

    // ── Commands ─────────────────────────────────────────────────

    async fn on_command(&mut self, command: HostCommand) {
        match command {
            HostCommand::Approve(id) => {
                if self.registry.is_pending(&id) {
                    self.approve(&id).await;
                } else {
                    debug!(session = %id, "approve for unknown request");
                }
            }
            HostCommand::Decline(id) => self.decline(&id).await,
            HostCommand::Disconnect(id) => {
                if self.registry.disconnect(&id).await.is_some() {
                    self.notify_viewer(&id).await;
                    self.emit(HostEvent::SessionClosed(id));
                    self.refresh_status();
                }
            }
            HostCommand::SetAudio(enabled) => {
                let source = Arc::clone(&self.parts.source);
                match self.registry.request_audio_change(enabled, &*source).await {
                    Ok(AudioChange::Unchanged) => {}
                    Ok(AudioChange::Applied) => self.emit(HostEvent::AudioChanged(enabled)),
                    Ok(AudioChange::NeedsConfirmation(token)) => {
                        self.emit(HostEvent::AudioConfirmation(token));
                    }
                    Err(e) => warn!("audio change failed: {e}"),
                }
            }
            HostCommand::ConfirmAudio(token) => {
                let enabled = token.enabled();
                let source = Arc::clone(&self.parts.source);
                match self.registry.confirm_audio_change(token, &*source).await {
                    Ok(drained) => {
                        self.notify_drained(&drained).await;
                        for id in drained.connected.into_iter().chain(drained.pending) {
                            self.emit(HostEvent::SessionClosed(id));
                        }
                        self.refresh_status();
                        self.emit(HostEvent::AudioChanged(enabled));
                    }
                    Err(e) => warn!("audio confirmation rejected: {e}"),
                }
            }
            HostCommand::DeclineAudio(token) => {
                if let Err(e) = self.registry.decline_audio_change(token) {
                    warn!("audio decline rejected: {e}");
                }
            }
            HostCommand::SetControl(enabled) => {
                self.control = enabled;
                info!(enabled, "remote control toggled");
            }
            HostCommand::Stop => {}
        }
    }

    // ── Helpers ──────────────────────────────────────────────────

    fn refresh_status(&mut self) {
        let next = if self.registry.connected_count() > 0 {
            HostStatus::Connected
        } else if self.status == HostStatus::Connected {
            HostStatus::Disconnected
        } else {
            self.status
        };
        self.set_status(next);
    }

    fn set_status(&mut self, status: HostStatus) {
        if self.status != status {
            self.status = status;
            self.emit(HostEvent::Status(status));
        }
    }

    fn emit(&self, event: HostEvent) {
        let _ = self.events.send(event);
    }

    async fn notify_viewer(&self, id: &str) {
        self.send(EventKind::SessionDisconnect, &DisconnectNotice::to_viewer(id))
            .await;
    }

    async fn send_error(&self, id: &str, code: ErrorCode) -> Result<(), ShareError> {
        self.send(EventKind::Error, &ErrorNotice::new(id, code)).await;
        Ok(())
    }

    async fn send<T: Serialize>(&self, kind: EventKind, body: &T) {
        let Some(out) = &self.out else { return };
        let packet = match Packet::new(kind, body) {
            Ok(p) => p,
            Err(e) => {
                warn!(%kind, "cannot encode: {e}");
                return;
            }
        };
        if out.send(packet).await.is_err() {
            debug!(%kind, "relay gone, packet dropped");
        }
    }
}

async fn next_frame(rx: &mut Option<mpsc::Receiver<StreamFrame>>) -> Option<StreamFrame> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Connector for the peer method when the embedder supplies none.
#[cfg(feature = "webrtc")]
fn default_connector(
    negotiation: &NegotiationSettings,
) -> Result<Arc<dyn PeerConnector>, ShareError> {
    let connector = crate::transport::rtc::RtcPeerConnector::new(negotiation.ice_servers.clone())?;
    Ok(Arc::new(connector))
}

#[cfg(not(feature = "webrtc"))]
fn default_connector(
    _negotiation: &NegotiationSettings,
) -> Result<Arc<dyn PeerConnector>, ShareError> {
    Err(ShareError::SetupFailure(
        "peer method needs a peer connector (build with the `webrtc` feature)".into(),
    ))
}
