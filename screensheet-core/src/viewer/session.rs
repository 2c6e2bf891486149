//! Viewer-side session state machine.
//!
//! ```text
//!  Idle ──request──► Requesting ──sent──► AwaitingOffer ──offer──► Connected
//!   ▲                                          │                      │
//!   └──────── error / declined ────────────────┘        disconnect ──► Disconnected
//! ```
//!
//! Inbound relay packets go through [`ViewerSession::handle`], which
//! returns the packets to send back. Anything the UI should know about
//! is queued as a [`ViewerEvent`].

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::code::normalize_code;
use crate::error::ShareError;
use crate::event::EventKind;
use crate::media::source::TrackKind;
use crate::media::types::ScreenSize;
use crate::packet::Packet;
use crate::protocol::frame::StreamFrame;
use crate::protocol::input::{InputEvent, InputMessage, PointerEvent, PointerMethod};
use crate::protocol::signal::{
    CandidateMessage, DisconnectNotice, ErrorCode, ErrorNotice, OfferBody, PeerOffer,
    SessionAnswer, SessionOffer, SessionRequest, StreamParams, TILED_CODEC, parse_screen_size,
};
use crate::session::state::ConnectionStatus;
use crate::tiles::compositor::TileCompositor;
use crate::transport::TransportKind;
use crate::transport::peer::{PeerConnection, PeerConnector, PeerEvent};
use crate::viewer::scaling::SurfaceRect;

// ── Phase ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ViewerPhase {
    #[default]
    Idle,
    Requesting,
    AwaitingOffer,
    Connected,
    Disconnected,
}

impl fmt::Display for ViewerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Requesting => write!(f, "requesting"),
            Self::AwaitingOffer => write!(f, "awaiting-offer"),
            Self::Connected => write!(f, "connected"),
            Self::Disconnected => write!(f, "disconnected"),
        }
    }
}

// ── Join payload ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinRequest {
    Code(String),
    Credentials { username: String, password: String },
}

impl JoinRequest {
    /// Normalize a typed connection code.
    pub fn code(input: &str) -> Result<Self, ShareError> {
        normalize_code(input)
            .map(Self::Code)
            .ok_or(ShareError::RequestRejected(
                "connection code must be 8 letters or digits",
            ))
    }

    pub fn credentials(username: &str, password: &str) -> Result<Self, ShareError> {
        let (username, password) = (username.trim(), password.trim());
        if username.is_empty() || password.is_empty() {
            return Err(ShareError::RequestRejected(
                "username and password are both required",
            ));
        }
        Ok(Self::Credentials {
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    pub fn to_request(&self) -> SessionRequest {
        match self {
            Self::Code(code) => SessionRequest::with_code(code.clone()),
            Self::Credentials { username, password } => {
                SessionRequest::with_credentials(username.clone(), password.clone())
            }
        }
    }
}

// ── Events ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewerEvent {
    /// Error code surfaced by the host, relay or local teardown.
    Error(ErrorCode),
    Connected {
        session_id: String,
        transport: TransportKind,
    },
    /// Source dimensions are known and input may flow.
    ScreenSize(ScreenSize),
    /// A relayed frame was composited.
    Frame { tiles: usize },
    /// Inbound peer media arrived.
    Track(TrackKind),
    Disconnected,
}

enum Link {
    Peer(Arc<dyn PeerConnection>),
    Relayed(TileCompositor),
}

// ── ViewerSession ────────────────────────────────────────────────

pub struct ViewerSession {
    phase: ViewerPhase,
    connector: Option<Arc<dyn PeerConnector>>,
    session_id: Option<String>,
    link: Option<Link>,
    screen: Option<ScreenSize>,
    events_ready: bool,
    peer_events: Option<mpsc::UnboundedReceiver<PeerEvent>>,
    events: VecDeque<ViewerEvent>,
}

impl Default for ViewerSession {
    fn default() -> Self {
        Self::new(None)
    }
}

impl ViewerSession {
    /// `connector` is needed to accept peer offers; without one, peer
    /// offers are refused and only relayed sessions work.
    pub fn new(connector: Option<Arc<dyn PeerConnector>>) -> Self {
        Self {
            phase: ViewerPhase::Idle,
            connector,
            session_id: None,
            link: None,
            screen: None,
            events_ready: false,
            peer_events: None,
            events: VecDeque::new(),
        }
    }

    pub fn phase(&self) -> ViewerPhase {
        self.phase
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn screen_size(&self) -> Option<ScreenSize> {
        self.screen
    }

    pub fn transport(&self) -> Option<TransportKind> {
        match self.link {
            Some(Link::Peer(_)) => Some(TransportKind::Peer),
            Some(Link::Relayed(_)) => Some(TransportKind::Relayed),
            None => None,
        }
    }

    /// Input is forwarded only when this is true.
    pub fn input_ready(&self) -> bool {
        self.phase == ViewerPhase::Connected && self.events_ready && self.screen.is_some()
    }

    pub fn compositor(&self) -> Option<&TileCompositor> {
        match &self.link {
            Some(Link::Relayed(c)) => Some(c),
            _ => None,
        }
    }

    pub fn next_event(&mut self) -> Option<ViewerEvent> {
        self.events.pop_front()
    }

    pub fn drain_events(&mut self) -> Vec<ViewerEvent> {
        self.events.drain(..).collect()
    }

    /// Peer-stack events for the current session. The driver polls them
    /// and feeds them back through [`Self::handle_peer_event`].
    pub fn take_peer_events(&mut self) -> Option<mpsc::UnboundedReceiver<PeerEvent>> {
        self.peer_events.take()
    }

    // ── Request ──────────────────────────────────────────────────

    /// Build the join request. Rejected unless idle (or after a
    /// finished session).
    pub fn request(&mut self, join: &JoinRequest) -> Result<Packet, ShareError> {
        match self.phase {
            ViewerPhase::Idle | ViewerPhase::Disconnected => {}
            _ => {
                return Err(ShareError::InvalidTransition(
                    "a request is already in flight",
                ));
            }
        }
        let packet = Packet::new(EventKind::SessionRequest, &join.to_request())?;
        self.reset();
        self.phase = ViewerPhase::Requesting;
        Ok(packet)
    }

    /// The request left the socket.
    pub fn request_sent(&mut self) {
        if self.phase == ViewerPhase::Requesting {
            self.phase = ViewerPhase::AwaitingOffer;
        }
    }

    // ── Inbound ──────────────────────────────────────────────────

    /// Apply one packet from the relay. Returns packets to send back.
    pub async fn handle(&mut self, packet: Packet) -> Result<Vec<Packet>, ShareError> {
        match packet.kind() {
            EventKind::Error => {
                let notice: ErrorNotice = packet.decode()?;
                self.on_error(notice.error_code());
                Ok(Vec::new())
            }
            EventKind::SessionOffer => self.on_offer(packet.decode()?).await,
            EventKind::Candidate => {
                let msg: CandidateMessage = packet.decode()?;
                if let Some(Link::Peer(pc)) = &self.link {
                    if let Err(e) = pc.add_ice_candidate(msg.candidate).await {
                        warn!("remote candidate rejected: {e}");
                    }
                }
                Ok(Vec::new())
            }
            EventKind::StreamFrame => {
                let frame: StreamFrame = packet.decode()?;
                self.on_frame(&frame);
                Ok(Vec::new())
            }
            EventKind::SessionDisconnect => {
                if matches!(self.phase, ViewerPhase::Connected | ViewerPhase::AwaitingOffer) {
                    info!("session ended by host");
                    self.teardown().await;
                    self.events.push_back(ViewerEvent::Error(ErrorCode::DisconnectedByHost));
                }
                Ok(Vec::new())
            }
            other => {
                debug!(kind = %other, "ignoring packet");
                Ok(Vec::new())
            }
        }
    }

    fn on_error(&mut self, code: ErrorCode) {
        debug!(%code, "relay error");
        if matches!(self.phase, ViewerPhase::Requesting | ViewerPhase::AwaitingOffer) {
            self.phase = ViewerPhase::Idle;
        }
        self.events.push_back(ViewerEvent::Error(code));
    }

    async fn on_offer(&mut self, offer: SessionOffer) -> Result<Vec<Packet>, ShareError> {
        if !matches!(self.phase, ViewerPhase::Requesting | ViewerPhase::AwaitingOffer) {
            return Err(ShareError::TransientSignaling(format!(
                "offer received while {}",
                self.phase
            )));
        }
        if offer.declined {
            self.on_error(ErrorCode::Declined);
            return Ok(Vec::new());
        }

        let session_id = offer.session_id;
        self.session_id = Some(session_id.clone());

        let accepted = match offer.offer {
            Some(OfferBody::Peer(p)) => self.accept_peer(&session_id, p).await,
            Some(OfferBody::Relayed(p)) => self.accept_relayed(&session_id, p),
            None => Err(ShareError::NegotiationFailure("offer carries no body".into())),
        };

        match accepted {
            Ok(answer) => {
                self.phase = ViewerPhase::Connected;
                if let Some(transport) = self.transport() {
                    info!(session = %session_id, %transport, "connected");
                    self.events.push_back(ViewerEvent::Connected {
                        session_id,
                        transport,
                    });
                }
                if let Some(screen) = self.screen {
                    self.events.push_back(ViewerEvent::ScreenSize(screen));
                }
                Ok(vec![answer])
            }
            Err(e) => {
                warn!(session = %session_id, class = ?e.class(), "cannot accept offer: {e}");
                self.teardown().await;
                self.events
                    .push_back(ViewerEvent::Error(ErrorCode::DisconnectedByHost));
                Ok(vec![Packet::new(
                    EventKind::SessionDisconnect,
                    &DisconnectNotice::default(),
                )?])
            }
        }
    }

    async fn accept_peer(&mut self, session_id: &str, offer: PeerOffer) -> Result<Packet, ShareError> {
        let connector = self
            .connector
            .clone()
            .ok_or_else(|| ShareError::SetupFailure("no peer stack available".into()))?;
        let (tx, rx) = mpsc::unbounded_channel();
        let pc = connector.connect(tx).await?;

        let answer = async {
            pc.set_remote_description(offer.description()).await?;
            for candidate in offer.candidates.iter().cloned() {
                if let Err(e) = pc.add_ice_candidate(candidate).await {
                    warn!("offered candidate rejected: {e}");
                }
            }
            let answer = pc.create_answer().await?;
            pc.set_local_description(answer.clone()).await?;
            Ok::<_, ShareError>(answer)
        }
        .await;

        let answer = match answer {
            Ok(a) => a,
            Err(e) => {
                let _ = pc.close().await;
                return Err(e);
            }
        };

        self.link = Some(Link::Peer(pc));
        self.peer_events = Some(rx);
        Packet::new(
            EventKind::SessionAnswer,
            &SessionAnswer {
                session_id: Some(session_id.to_string()),
                viewer_id: None,
                answer: Some(answer),
            },
        )
    }

    fn accept_relayed(&mut self, session_id: &str, params: StreamParams) -> Result<Packet, ShareError> {
        if params.codec != TILED_CODEC {
            return Err(ShareError::SetupFailure(format!(
                "unsupported stream codec {:?}",
                params.codec
            )));
        }
        let screen = ScreenSize::new(params.width, params.height);
        if screen.is_empty() {
            return Err(ShareError::SetupFailure("offer without screen size".into()));
        }
        let compositor = TileCompositor::new(screen.width, screen.height)
            .map_err(|e| ShareError::SetupFailure(format!("offer rejected: {e}")))?;
        self.link = Some(Link::Relayed(compositor));
        self.screen = Some(screen);
        self.events_ready = true;
        Packet::new(
            EventKind::SessionAnswer,
            &SessionAnswer {
                session_id: Some(session_id.to_string()),
                viewer_id: None,
                answer: None,
            },
        )
    }

    fn on_frame(&mut self, frame: &StreamFrame) {
        if self.phase != ViewerPhase::Connected {
            return;
        }
        if let Some(Link::Relayed(compositor)) = &mut self.link {
            match compositor.apply(frame) {
                Ok(tiles) => self.events.push_back(ViewerEvent::Frame { tiles }),
                Err(e) => warn!("frame dropped: {e}"),
            }
        }
    }

    // ── Peer events ──────────────────────────────────────────────

    pub async fn handle_peer_event(&mut self, event: PeerEvent) -> Result<Vec<Packet>, ShareError> {
        match event {
            PeerEvent::LocalCandidate(candidate) => {
                // Host-bound: no sessionId, the relay adds our id.
                let msg = CandidateMessage {
                    session_id: None,
                    viewer_id: None,
                    candidate,
                };
                return Ok(vec![Packet::new(EventKind::Candidate, &msg)?]);
            }
            PeerEvent::ChannelMessage(text) => match parse_screen_size(&text) {
                Ok((width, height)) if width > 0 && height > 0 => {
                    let screen = ScreenSize::new(width, height);
                    self.screen = Some(screen);
                    self.events_ready = true;
                    self.events.push_back(ViewerEvent::ScreenSize(screen));
                }
                _ => debug!("ignoring channel message"),
            },
            PeerEvent::StateChanged(state) => {
                if state.classify() == ConnectionStatus::Disconnected
                    && self.phase == ViewerPhase::Connected
                {
                    info!(%state, "peer link lost");
                    self.teardown().await;
                    self.events
                        .push_back(ViewerEvent::Error(ErrorCode::DisconnectedByHost));
                }
            }
            PeerEvent::RemoteTrack(track) => {
                self.events.push_back(ViewerEvent::Track(track.kind()));
            }
            PeerEvent::ChannelOpen => {}
        }
        Ok(Vec::new())
    }

    // ── Input ────────────────────────────────────────────────────

    /// Build a pointer event from client coordinates. `None` until the
    /// screen size is known.
    pub fn pointer(
        &self,
        method: PointerMethod,
        client_x: f64,
        client_y: f64,
        surface: &SurfaceRect,
        button: Option<u8>,
    ) -> Option<InputEvent> {
        let screen = self.screen?;
        let (x, y) = surface.to_source(client_x, client_y, screen)?;
        let button = match method {
            PointerMethod::PointerMove => None,
            _ => button,
        };
        Some(InputEvent::Pointer(PointerEvent { method, x, y, button }))
    }

    /// Forward input to the host. Returns a packet for the relay when
    /// the session is relayed; peer input goes out on the data channel.
    /// Input before the session is ready is dropped.
    pub async fn send_input(&mut self, event: InputEvent) -> Result<Option<Packet>, ShareError> {
        if !self.input_ready() {
            return Ok(None);
        }
        match &self.link {
            Some(Link::Peer(pc)) => {
                pc.send_text(serde_json::to_string(&event)?).await?;
                Ok(None)
            }
            Some(Link::Relayed(_)) => {
                let msg = InputMessage {
                    session_id: None,
                    viewer_id: None,
                    event,
                };
                Ok(Some(Packet::new(EventKind::SessionInput, &msg)?))
            }
            None => Ok(None),
        }
    }

    // ── Teardown ─────────────────────────────────────────────────

    /// Leave the session. Returns the notice to send to the host.
    pub async fn disconnect(&mut self) -> Result<Option<Packet>, ShareError> {
        if !matches!(self.phase, ViewerPhase::Connected | ViewerPhase::AwaitingOffer) {
            return Ok(None);
        }
        self.teardown().await;
        Ok(Some(Packet::new(
            EventKind::SessionDisconnect,
            &DisconnectNotice::default(),
        )?))
    }

    async fn teardown(&mut self) {
        if let Some(Link::Peer(pc)) = self.link.take() {
            if let Err(e) = pc.close().await {
                debug!("peer close: {e}");
            }
        }
        self.peer_events = None;
        self.events_ready = false;
        self.screen = None;
        self.phase = ViewerPhase::Disconnected;
        self.events.push_back(ViewerEvent::Disconnected);
    }

    fn reset(&mut self) {
        self.session_id = None;
        self.link = None;
        self.screen = None;
        self.events_ready = false;
        self.peer_events = None;
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::frame::TilePatch;
    use crate::protocol::signal::SessionDescription;
    use serde_json::json;

    fn offer_packet(body: serde_json::Value) -> Packet {
        Packet::new(EventKind::SessionOffer, &body).unwrap()
    }

    fn relayed_offer() -> Packet {
        offer_packet(json!({
            "sessionId": "v1",
            "offer": {"width": 1280, "height": 720, "codec": "tiled"}
        }))
    }

    fn awaiting() -> ViewerSession {
        let mut s = ViewerSession::default();
        s.request(&JoinRequest::code("abcd-1234").unwrap()).unwrap();
        s.request_sent();
        s
    }

    #[test]
    fn join_payloads() {
        assert_eq!(
            JoinRequest::code(" abcd 1234 ").unwrap(),
            JoinRequest::Code("ABCD1234".into())
        );
        assert!(JoinRequest::code("short").is_err());
        assert!(JoinRequest::credentials("ada", "  ").is_err());

        let req = JoinRequest::credentials(" ada ", "pw").unwrap().to_request();
        assert_eq!(req.credentials(), Some(("ada", "pw")));
    }

    #[test]
    fn request_emits_packet_and_locks() {
        let mut s = ViewerSession::default();
        let packet = s.request(&JoinRequest::Code("ABCD1234".into())).unwrap();
        assert_eq!(packet.kind(), EventKind::SessionRequest);
        let body: SessionRequest = packet.decode().unwrap();
        assert_eq!(body.code.as_deref(), Some("ABCD1234"));
        assert_eq!(s.phase(), ViewerPhase::Requesting);

        s.request_sent();
        assert_eq!(s.phase(), ViewerPhase::AwaitingOffer);
        assert!(matches!(
            s.request(&JoinRequest::Code("ABCD1234".into())),
            Err(ShareError::InvalidTransition(_))
        ));
    }

    #[tokio::test]
    async fn declined_offer_returns_to_idle() {
        let mut s = awaiting();
        let out = s
            .handle(offer_packet(json!({"sessionId": "v1", "declined": true})))
            .await
            .unwrap();
        assert!(out.is_empty());
        assert_eq!(s.phase(), ViewerPhase::Idle);
        assert_eq!(s.next_event(), Some(ViewerEvent::Error(ErrorCode::Declined)));
    }

    #[tokio::test]
    async fn error_code_surfaces() {
        let mut s = awaiting();
        let packet = Packet::new(EventKind::Error, &ErrorNotice::new("v1", ErrorCode::InvalidCode)).unwrap();
        s.handle(packet).await.unwrap();
        assert_eq!(s.phase(), ViewerPhase::Idle);
        assert_eq!(s.next_event(), Some(ViewerEvent::Error(ErrorCode::InvalidCode)));
    }

    #[tokio::test]
    async fn relayed_offer_connects_and_composites() {
        let mut s = awaiting();
        let out = s.handle(relayed_offer()).await.unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].kind(), EventKind::SessionAnswer);
        let answer: SessionAnswer = out[0].decode().unwrap();
        assert_eq!(answer.session_id.as_deref(), Some("v1"));
        assert!(answer.answer.is_none());

        assert_eq!(s.phase(), ViewerPhase::Connected);
        assert!(s.input_ready());
        assert_eq!(s.screen_size(), Some(ScreenSize::new(1280, 720)));
        assert_eq!(
            s.drain_events(),
            [
                ViewerEvent::Connected {
                    session_id: "v1".into(),
                    transport: TransportKind::Relayed
                },
                ViewerEvent::ScreenSize(ScreenSize::new(1280, 720)),
            ]
        );

        let frame = StreamFrame::tiled(
            1280,
            720,
            vec![TilePatch {
                x: 0,
                y: 0,
                data: "not-an-image".into(),
            }],
        );
        s.handle(Packet::new(EventKind::StreamFrame, &frame).unwrap())
            .await
            .unwrap();
        assert_eq!(s.next_event(), Some(ViewerEvent::Frame { tiles: 0 }));
        assert_eq!(s.compositor().map(|c| c.frame_count()), Some(1));
    }

    #[tokio::test]
    async fn legacy_codec_is_refused() {
        let mut s = awaiting();
        let out = s
            .handle(offer_packet(json!({
                "sessionId": "v1",
                "offer": {"width": 10, "height": 10, "codec": "video/webm"}
            })))
            .await
            .unwrap();
        assert_eq!(out[0].kind(), EventKind::SessionDisconnect);
        assert_eq!(s.phase(), ViewerPhase::Disconnected);
        assert!(s.drain_events().contains(&ViewerEvent::Error(ErrorCode::DisconnectedByHost)));
    }

    #[tokio::test]
    async fn oversized_offer_is_refused() {
        let mut s = awaiting();
        let out = s
            .handle(offer_packet(json!({
                "sessionId": "v1",
                "offer": {"width": u32::MAX, "height": u32::MAX, "codec": "tiled"}
            })))
            .await
            .unwrap();
        assert_eq!(out[0].kind(), EventKind::SessionDisconnect);
        assert_eq!(s.phase(), ViewerPhase::Disconnected);
        assert!(s.compositor().is_none());
    }

    #[tokio::test]
    async fn oversized_frame_is_dropped() {
        let mut s = awaiting();
        s.handle(relayed_offer()).await.unwrap();
        s.drain_events();

        let huge = StreamFrame::tiled(u32::MAX, u32::MAX, Vec::new());
        s.handle(Packet::new(EventKind::StreamFrame, &huge).unwrap())
            .await
            .unwrap();
        assert_eq!(s.next_event(), None);
        assert_eq!(s.phase(), ViewerPhase::Connected);
        let compositor = s.compositor().unwrap();
        assert_eq!(compositor.dimensions(), (1280, 720));
        assert_eq!(compositor.frame_count(), 0);
    }

    #[tokio::test]
    async fn peer_offer_without_stack_is_refused() {
        let mut s = awaiting();
        let body = SessionOffer::accepted(
            "v1",
            OfferBody::Peer(PeerOffer::new(SessionDescription::offer("v=0"), Vec::new())),
        );
        let out = s
            .handle(Packet::new(EventKind::SessionOffer, &body).unwrap())
            .await
            .unwrap();
        assert_eq!(out[0].kind(), EventKind::SessionDisconnect);
        let notice: DisconnectNotice = out[0].decode().unwrap();
        assert!(notice.session_id.is_none());
    }

    #[tokio::test]
    async fn input_gated_until_ready_then_scaled() {
        let mut s = awaiting();
        let surface = SurfaceRect::new(0.0, 0.0, 640.0, 360.0);
        assert!(s.pointer(PointerMethod::PointerMove, 10.0, 10.0, &surface, None).is_none());
        assert!(
            s.send_input(InputEvent::Pointer(PointerEvent::move_to(1, 1)))
                .await
                .unwrap()
                .is_none()
        );

        s.handle(relayed_offer()).await.unwrap();
        let event = s
            .pointer(PointerMethod::PointerDown, 320.5, 180.0, &surface, Some(0))
            .unwrap();
        assert_eq!(event, InputEvent::Pointer(PointerEvent::press(641, 360, 0)));

        let packet = s.send_input(event).await.unwrap().unwrap();
        assert_eq!(packet.kind(), EventKind::SessionInput);
        let msg: InputMessage = packet.decode().unwrap();
        assert!(msg.session_id.is_none());
    }

    #[tokio::test]
    async fn host_disconnect_surfaces_410() {
        let mut s = awaiting();
        s.handle(relayed_offer()).await.unwrap();
        s.drain_events();

        let notice = Packet::new(EventKind::SessionDisconnect, &DisconnectNotice::to_viewer("v1")).unwrap();
        s.handle(notice).await.unwrap();
        assert_eq!(s.phase(), ViewerPhase::Disconnected);
        assert!(!s.input_ready());
        assert_eq!(
            s.drain_events(),
            [
                ViewerEvent::Disconnected,
                ViewerEvent::Error(ErrorCode::DisconnectedByHost)
            ]
        );

        // A new request is allowed after the session ended.
        assert!(s.request(&JoinRequest::Code("ABCD1234".into())).is_ok());
    }

    #[tokio::test]
    async fn local_leave_notifies_host() {
        let mut s = awaiting();
        s.handle(relayed_offer()).await.unwrap();
        let packet = s.disconnect().await.unwrap().unwrap();
        assert_eq!(packet.kind(), EventKind::SessionDisconnect);
        assert!(s.disconnect().await.unwrap().is_none());
    }
}
