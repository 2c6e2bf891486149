//! Direct peer transport.
//!
//! Negotiation sequence for one session:
//!
//! ```text
//! connect ─► add video (+ audio | silent) ─► open "input" channel
//!         ─► create offer ─► set local ─► wait for gathering (bounded)
//!         ─► handshake {type, sdp, candidates}
//! ```
//!
//! Remote candidates that arrive before the answer are queued and applied
//! in arrival order once the remote description is set.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::ShareError;
use crate::media::source::{FrameSource, TrackHandle};
use crate::media::types::ScreenSize;
use crate::protocol::input::InputEvent;
use crate::protocol::signal::{IceCandidate, OfferBody, PeerOffer, SdpKind, SessionDescription};
use crate::session::events::SessionEvents;
use crate::session::state::ConnectionStatus;
use crate::transport::{
    AcceptParams, AudioSwap, Opened, Transport, TransportHandle, TransportKind,
};

/// Label of the host-created data channel carrying viewer input.
pub const INPUT_CHANNEL: &str = "input";

// ── Peer stack seam ──────────────────────────────────────────────

/// Raw connection state reported by a peer stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeerState {
    New,
    Checking,
    Connecting,
    Connected,
    Completed,
    Disconnected,
    Failed,
    Closed,
}

impl PeerState {
    pub fn classify(self) -> ConnectionStatus {
        match self {
            PeerState::New | PeerState::Checking | PeerState::Connecting => {
                ConnectionStatus::Connecting
            }
            PeerState::Connected | PeerState::Completed => ConnectionStatus::Connected,
            PeerState::Disconnected | PeerState::Failed | PeerState::Closed => {
                ConnectionStatus::Disconnected
            }
        }
    }
}

impl fmt::Display for PeerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PeerState::New => "new",
            PeerState::Checking => "checking",
            PeerState::Connecting => "connecting",
            PeerState::Connected => "connected",
            PeerState::Completed => "completed",
            PeerState::Disconnected => "disconnected",
            PeerState::Failed => "failed",
            PeerState::Closed => "closed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub enum PeerEvent {
    StateChanged(PeerState),
    LocalCandidate(IceCandidate),
    /// The `input` channel is open.
    ChannelOpen,
    ChannelMessage(String),
    RemoteTrack(TrackHandle),
}

/// Factory for peer connections.
#[async_trait]
pub trait PeerConnector: Send + Sync {
    async fn connect(
        &self,
        events: mpsc::UnboundedSender<PeerEvent>,
    ) -> Result<Arc<dyn PeerConnection>, ShareError>;

    /// A track carrying silence, used while audio is off.
    fn silent_audio(&self) -> Option<TrackHandle>;
}

#[async_trait]
pub trait PeerConnection: Send + Sync {
    async fn add_track(&self, track: TrackHandle) -> Result<(), ShareError>;

    /// Swap the outbound audio track without renegotiating.
    async fn replace_audio(&self, track: TrackHandle) -> Result<(), ShareError>;

    async fn create_data_channel(&self, label: &str) -> Result<(), ShareError>;

    async fn create_offer(&self) -> Result<SessionDescription, ShareError>;

    async fn create_answer(&self) -> Result<SessionDescription, ShareError>;

    async fn set_local_description(&self, desc: SessionDescription) -> Result<(), ShareError>;

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<(), ShareError>;

    /// Resolves once candidate gathering has finished.
    async fn gathering_complete(&self) -> Result<(), ShareError>;

    async fn local_description(&self) -> Option<SessionDescription>;

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), ShareError>;

    /// Send text on the `input` channel.
    async fn send_text(&self, text: String) -> Result<(), ShareError>;

    async fn close(&self) -> Result<(), ShareError>;
}

// ── CandidateQueue ───────────────────────────────────────────────

/// FIFO of remote candidates received before the remote description.
#[derive(Debug, Default)]
pub struct CandidateQueue {
    ready: bool,
    queued: VecDeque<IceCandidate>,
}

impl CandidateQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `candidate`, or hand it back if it can be applied now.
    pub fn push(&mut self, candidate: IceCandidate) -> Option<IceCandidate> {
        if self.ready {
            Some(candidate)
        } else {
            self.queued.push_back(candidate);
            None
        }
    }

    /// Mark the remote description as set and drain the backlog in
    /// arrival order.
    pub fn mark_ready(&mut self) -> Vec<IceCandidate> {
        self.ready = true;
        self.queued.drain(..).collect()
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn len(&self) -> usize {
        self.queued.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queued.is_empty()
    }
}

// ── PeerTransport ────────────────────────────────────────────────

pub struct PeerTransport {
    connector: Arc<dyn PeerConnector>,
    gather_timeout: Duration,
}

impl PeerTransport {
    pub fn new(connector: Arc<dyn PeerConnector>, gather_timeout: Duration) -> Self {
        Self {
            connector,
            gather_timeout,
        }
    }

    fn outbound_audio(&self, enabled: bool, source: &dyn FrameSource) -> Option<TrackHandle> {
        if enabled {
            source
                .audio_track()
                .or_else(|| self.connector.silent_audio())
        } else {
            self.connector.silent_audio()
        }
    }

    async fn negotiate(
        &self,
        pc: &Arc<dyn PeerConnection>,
        params: &AcceptParams,
    ) -> Result<SessionDescription, ShareError> {
        let video = params
            .source
            .video_track()
            .ok_or_else(|| ShareError::SetupFailure("frame source has no video track".into()))?;
        pc.add_track(video).await.map_err(setup)?;
        if let Some(audio) = self.outbound_audio(params.audio_enabled, &*params.source) {
            pc.add_track(audio).await.map_err(setup)?;
        }
        pc.create_data_channel(INPUT_CHANNEL).await.map_err(setup)?;

        let offer = pc.create_offer().await.map_err(negotiation)?;
        pc.set_local_description(offer).await.map_err(negotiation)?;
        tokio::time::timeout(self.gather_timeout, pc.gathering_complete())
            .await
            .map_err(|_| ShareError::NegotiationTimeout(self.gather_timeout))?
            .map_err(negotiation)?;

        pc.local_description()
            .await
            .ok_or_else(|| ShareError::NegotiationFailure("no local description after gathering".into()))
    }
}

fn setup(e: ShareError) -> ShareError {
    match e {
        ShareError::SetupFailure(_) => e,
        other => ShareError::SetupFailure(other.to_string()),
    }
}

fn negotiation(e: ShareError) -> ShareError {
    match e {
        ShareError::NegotiationFailure(_) | ShareError::NegotiationTimeout(_) => e,
        other => ShareError::NegotiationFailure(other.to_string()),
    }
}

#[async_trait]
impl Transport for PeerTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Peer
    }

    fn audio_swap(&self) -> AudioSwap {
        AudioSwap::InBand
    }

    async fn open(
        &self,
        params: AcceptParams,
        events: SessionEvents,
    ) -> Result<Opened, ShareError> {
        let (peer_tx, mut peer_rx) = mpsc::unbounded_channel();
        let pc = self.connector.connect(peer_tx).await.map_err(setup)?;

        let description = match self.negotiate(&pc, &params).await {
            Ok(d) => d,
            Err(e) => {
                if let Err(close_err) = pc.close().await {
                    debug!(session = %events.id(), "close after failed setup: {close_err}");
                }
                return Err(e);
            }
        };

        // Candidates emitted during gathering ride along with the offer.
        let mut candidates = Vec::new();
        let mut backlog = Vec::new();
        while let Ok(event) = peer_rx.try_recv() {
            match event {
                PeerEvent::LocalCandidate(c) => candidates.push(c),
                other => backlog.push(other),
            }
        }

        let cancel = CancellationToken::new();
        let pump = EventPump {
            pc: Arc::clone(&pc),
            events: events.clone(),
            screen: params.screen,
        };
        tokio::spawn(pump.run(backlog, peer_rx, cancel.clone()));

        debug!(
            session = %events.id(),
            candidates = candidates.len(),
            "peer offer ready"
        );

        let handle = PeerHandle {
            pc,
            events,
            candidates: CandidateQueue::new(),
            silent: self.connector.silent_audio(),
            cancel,
            closed: false,
        };
        Ok(Opened {
            handle: Box::new(handle),
            offer: OfferBody::Peer(PeerOffer::new(description, candidates)),
        })
    }
}

// ── Event pump ───────────────────────────────────────────────────

struct EventPump {
    pc: Arc<dyn PeerConnection>,
    events: SessionEvents,
    screen: Option<ScreenSize>,
}

impl EventPump {
    async fn run(
        self,
        backlog: Vec<PeerEvent>,
        mut rx: mpsc::UnboundedReceiver<PeerEvent>,
        cancel: CancellationToken,
    ) {
        for event in backlog {
            self.handle(event).await;
        }
        loop {
            let event = tokio::select! {
                e = rx.recv() => e,
                _ = cancel.cancelled() => break,
            };
            match event {
                Some(e) => self.handle(e).await,
                None => break,
            }
        }
        debug!(session = %self.events.id(), "peer event pump stopped");
    }

    async fn handle(&self, event: PeerEvent) {
        match event {
            PeerEvent::StateChanged(state) => {
                debug!(session = %self.events.id(), %state, "peer state");
                self.events.status(state.classify());
            }
            PeerEvent::LocalCandidate(c) => self.events.local_candidate(c),
            PeerEvent::ChannelOpen => {
                let Some(screen) = self.screen else { return };
                match serde_json::to_string(&screen) {
                    Ok(text) => {
                        if let Err(e) = self.pc.send_text(text).await {
                            warn!(session = %self.events.id(), "screen size not sent: {e}");
                        }
                    }
                    Err(e) => warn!("screen size not serialisable: {e}"),
                }
            }
            PeerEvent::ChannelMessage(text) => match serde_json::from_str::<InputEvent>(&text) {
                Ok(event) => self.events.input(event),
                Err(e) => debug!(session = %self.events.id(), "dropping malformed input: {e}"),
            },
            PeerEvent::RemoteTrack(track) => {
                debug!(session = %self.events.id(), kind = %track.kind(), "ignoring inbound track");
            }
        }
    }
}

// ── PeerHandle ───────────────────────────────────────────────────

struct PeerHandle {
    pc: Arc<dyn PeerConnection>,
    events: SessionEvents,
    candidates: CandidateQueue,
    silent: Option<TrackHandle>,
    cancel: CancellationToken,
    closed: bool,
}

#[async_trait]
impl TransportHandle for PeerHandle {
    async fn accept_answer(
        &mut self,
        answer: Option<SessionDescription>,
    ) -> Result<(), ShareError> {
        let answer = answer
            .ok_or_else(|| ShareError::NegotiationFailure("answer carries no description".into()))?;
        if answer.kind != SdpKind::Answer {
            return Err(ShareError::NegotiationFailure(
                "expected an answer description".into(),
            ));
        }
        self.pc
            .set_remote_description(answer)
            .await
            .map_err(negotiation)?;

        for candidate in self.candidates.mark_ready() {
            if let Err(e) = self.pc.add_ice_candidate(candidate).await {
                warn!(session = %self.events.id(), "queued candidate rejected: {e}");
            }
        }
        Ok(())
    }

    async fn add_candidate(&mut self, candidate: IceCandidate) -> Result<(), ShareError> {
        match self.candidates.push(candidate) {
            Some(candidate) => self
                .pc
                .add_ice_candidate(candidate)
                .await
                .map_err(|e| ShareError::TransientSignaling(e.to_string())),
            None => Ok(()),
        }
    }

    async fn set_audio(
        &mut self,
        enabled: bool,
        source: &dyn FrameSource,
    ) -> Result<(), ShareError> {
        let track = if enabled {
            source.audio_track().or_else(|| self.silent.clone())
        } else {
            self.silent.clone()
        };
        match track {
            Some(track) => self.pc.replace_audio(track).await,
            None => Ok(()),
        }
    }

    fn status(&self) -> ConnectionStatus {
        self.events.current()
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.cancel.cancel();
        self.events.settle();
        if let Err(e) = self.pc.close().await {
            debug!(session = %self.events.id(), "peer close: {e}");
        }
    }
}

impl Drop for PeerHandle {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        self.cancel.cancel();
        self.events.settle();
        if let Ok(rt) = tokio::runtime::Handle::try_current() {
            let pc = Arc::clone(&self.pc);
            rt.spawn(async move {
                let _ = pc.close().await;
            });
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::source::{MediaTrack, TrackKind};
    use crate::media::types::{PixelFormat, RawFrame};
    use crate::session::events::SessionEvent;
    use std::any::Any;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Debug)]
    struct Track(TrackKind);

    impl MediaTrack for Track {
        fn id(&self) -> &str {
            "t"
        }
        fn kind(&self) -> TrackKind {
            self.0
        }
        fn stop(&self) {}
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    struct Source;

    #[async_trait]
    impl FrameSource for Source {
        async fn capture(&self) -> Result<RawFrame, ShareError> {
            Ok(RawFrame::filled(4, 4, PixelFormat::Rgba8, 0))
        }
        fn video_track(&self) -> Option<TrackHandle> {
            Some(Arc::new(Track(TrackKind::Video)))
        }
        fn audio_track(&self) -> Option<TrackHandle> {
            Some(Arc::new(Track(TrackKind::Audio)))
        }
    }

    #[derive(Default)]
    struct Conn {
        hang_gathering: bool,
        fail_offer: bool,
        closed: AtomicBool,
        applied: Mutex<Vec<String>>,
        sent: Mutex<Vec<String>>,
        events: Mutex<Option<mpsc::UnboundedSender<PeerEvent>>>,
    }

    #[async_trait]
    impl PeerConnection for Conn {
        async fn add_track(&self, _: TrackHandle) -> Result<(), ShareError> {
            Ok(())
        }
        async fn replace_audio(&self, _: TrackHandle) -> Result<(), ShareError> {
            Ok(())
        }
        async fn create_data_channel(&self, _: &str) -> Result<(), ShareError> {
            Ok(())
        }
        async fn create_offer(&self) -> Result<SessionDescription, ShareError> {
            if self.fail_offer {
                return Err("no codecs".into());
            }
            Ok(SessionDescription::offer("v=0"))
        }
        async fn create_answer(&self) -> Result<SessionDescription, ShareError> {
            Ok(SessionDescription::answer("v=0"))
        }
        async fn set_local_description(&self, _: SessionDescription) -> Result<(), ShareError> {
            let tx = self.events.lock().unwrap().clone();
            if let Some(tx) = tx {
                let _ = tx.send(PeerEvent::LocalCandidate(cand("local")));
            }
            Ok(())
        }
        async fn set_remote_description(&self, _: SessionDescription) -> Result<(), ShareError> {
            Ok(())
        }
        async fn gathering_complete(&self) -> Result<(), ShareError> {
            if self.hang_gathering {
                std::future::pending::<()>().await;
            }
            Ok(())
        }
        async fn local_description(&self) -> Option<SessionDescription> {
            Some(SessionDescription::offer("v=0 gathered"))
        }
        async fn add_ice_candidate(&self, c: IceCandidate) -> Result<(), ShareError> {
            self.applied.lock().unwrap().push(c.candidate);
            Ok(())
        }
        async fn send_text(&self, text: String) -> Result<(), ShareError> {
            self.sent.lock().unwrap().push(text);
            Ok(())
        }
        async fn close(&self) -> Result<(), ShareError> {
            self.closed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Connector(Arc<Conn>);

    #[async_trait]
    impl PeerConnector for Connector {
        async fn connect(
            &self,
            events: mpsc::UnboundedSender<PeerEvent>,
        ) -> Result<Arc<dyn PeerConnection>, ShareError> {
            *self.0.events.lock().unwrap() = Some(events);
            Ok(self.0.clone())
        }
        fn silent_audio(&self) -> Option<TrackHandle> {
            Some(Arc::new(Track(TrackKind::Audio)))
        }
    }

    fn cand(s: &str) -> IceCandidate {
        IceCandidate {
            candidate: s.into(),
            sdp_mid: Some("0".into()),
            sdp_mline_index: Some(0),
            username_fragment: None,
        }
    }

    fn params() -> AcceptParams {
        AcceptParams {
            source: Arc::new(Source),
            screen: Some(ScreenSize::new(1280, 720)),
            audio_enabled: true,
        }
    }

    fn transport(conn: Arc<Conn>) -> PeerTransport {
        PeerTransport::new(Arc::new(Connector(conn)), Duration::from_millis(200))
    }

    #[test]
    fn state_classification() {
        use PeerState::*;
        for s in [New, Checking, Connecting] {
            assert_eq!(s.classify(), ConnectionStatus::Connecting);
        }
        for s in [Connected, Completed] {
            assert_eq!(s.classify(), ConnectionStatus::Connected);
        }
        for s in [Disconnected, Failed, Closed] {
            assert_eq!(s.classify(), ConnectionStatus::Disconnected);
        }
    }

    #[test]
    fn candidate_queue_preserves_order() {
        let mut q = CandidateQueue::new();
        assert!(q.push(cand("a")).is_none());
        assert!(q.push(cand("b")).is_none());
        assert_eq!(q.len(), 2);
        let drained: Vec<_> = q.mark_ready().into_iter().map(|c| c.candidate).collect();
        assert_eq!(drained, ["a", "b"]);
        assert!(q.is_empty());
        assert_eq!(q.push(cand("c")).map(|c| c.candidate).as_deref(), Some("c"));
    }

    #[tokio::test]
    async fn offer_carries_gathered_candidates() {
        let conn = Arc::new(Conn::default());
        let (tx, _rx) = mpsc::unbounded_channel();
        let opened = transport(conn.clone())
            .open(params(), SessionEvents::new("v1", tx))
            .await
            .unwrap();

        match opened.offer {
            OfferBody::Peer(offer) => {
                assert_eq!(offer.sdp, "v=0 gathered");
                assert_eq!(offer.candidates.len(), 1);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(opened.handle.status(), ConnectionStatus::Connecting);
    }

    #[tokio::test]
    async fn early_candidates_apply_after_answer() {
        let conn = Arc::new(Conn::default());
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut handle = transport(conn.clone())
            .open(params(), SessionEvents::new("v1", tx))
            .await
            .unwrap()
            .handle;

        handle.add_candidate(cand("early-1")).await.unwrap();
        handle.add_candidate(cand("early-2")).await.unwrap();
        assert!(conn.applied.lock().unwrap().is_empty());

        handle
            .accept_answer(Some(SessionDescription::answer("v=0")))
            .await
            .unwrap();
        handle.add_candidate(cand("late")).await.unwrap();
        assert_eq!(*conn.applied.lock().unwrap(), ["early-1", "early-2", "late"]);
    }

    #[tokio::test]
    async fn missing_answer_is_negotiation_failure() {
        let conn = Arc::new(Conn::default());
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut handle = transport(conn)
            .open(params(), SessionEvents::new("v1", tx))
            .await
            .unwrap()
            .handle;
        assert!(matches!(
            handle.accept_answer(None).await,
            Err(ShareError::NegotiationFailure(_))
        ));
    }

    #[tokio::test]
    async fn failed_setup_closes_connection() {
        let conn = Arc::new(Conn {
            fail_offer: true,
            ..Conn::default()
        });
        let (tx, _rx) = mpsc::unbounded_channel();
        let err = transport(conn.clone())
            .open(params(), SessionEvents::new("v1", tx))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ShareError::NegotiationFailure(_)));
        assert!(conn.closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn gathering_is_bounded() {
        let conn = Arc::new(Conn {
            hang_gathering: true,
            ..Conn::default()
        });
        let (tx, _rx) = mpsc::unbounded_channel();
        let err = transport(conn.clone())
            .open(params(), SessionEvents::new("v1", tx))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ShareError::NegotiationTimeout(_)));
        assert!(conn.closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn channel_events_reach_session() {
        let conn = Arc::new(Conn::default());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut handle = transport(conn.clone())
            .open(params(), SessionEvents::new("v1", tx))
            .await
            .unwrap()
            .handle;

        let peer_tx = conn.events.lock().unwrap().clone().unwrap();
        peer_tx.send(PeerEvent::ChannelOpen).unwrap();
        peer_tx
            .send(PeerEvent::ChannelMessage(
                r#"{"name":"pointer","method":"pointermove","x":5,"y":6}"#.into(),
            ))
            .unwrap();
        peer_tx.send(PeerEvent::ChannelMessage("garbage".into())).unwrap();
        peer_tx
            .send(PeerEvent::StateChanged(PeerState::Connected))
            .unwrap();

        let mut saw_input = false;
        let mut saw_connected = false;
        while !(saw_input && saw_connected) {
            let ev = tokio::time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .expect("timeout")
                .expect("event");
            match ev {
                SessionEvent::Input { .. } => saw_input = true,
                SessionEvent::StatusChanged {
                    status: ConnectionStatus::Connected,
                    ..
                } => saw_connected = true,
                _ => {}
            }
        }
        assert_eq!(*conn.sent.lock().unwrap(), [r#"{"width":1280,"height":720}"#]);

        handle.close().await;
        handle.close().await;
        assert!(conn.closed.load(Ordering::SeqCst));
        assert_eq!(handle.status(), ConnectionStatus::Disconnected);
    }
}
