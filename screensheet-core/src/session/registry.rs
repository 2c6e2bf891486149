//! Host-side registry of viewer sessions.
//!
//! Owns the pending and connected collections and the one [`Transport`]
//! chosen at construction. A session id lives in at most one of the two
//! collections at any time. The registry has a single owner (the host
//! agent task), so it takes `&mut self` and holds no locks.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::{ErrorClass, ShareError};
use crate::media::source::FrameSource;
use crate::media::types::ScreenSize;
use crate::protocol::signal::{IceCandidate, OfferBody, SessionDescription};
use crate::session::events::{SessionEvent, SessionEventReceiver, SessionEvents};
use crate::session::state::{ConnectionStatus, Session, SessionId, StatusFilter};
use crate::transport::{
    AcceptParams, AudioSwap, HandshakeOffer, Transport, TransportHandle, TransportKind,
};

/// Snapshot of one session. `status` is `None` while pending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub session: Session,
    pub status: Option<ConnectionStatus>,
}

/// Ids removed by [`SessionRegistry::disconnect_all`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Drained {
    /// Live sessions that were closed.
    pub connected: Vec<SessionId>,
    /// Requests that were never answered.
    pub pending: Vec<SessionId>,
}

impl Drained {
    pub fn is_empty(&self) -> bool {
        self.connected.is_empty() && self.pending.is_empty()
    }
}

struct Live {
    session: Session,
    handle: Box<dyn TransportHandle>,
}

// ── Audio confirmation ───────────────────────────────────────────

/// Outcome of [`SessionRegistry::request_audio_change`].
#[derive(Debug, PartialEq, Eq)]
pub enum AudioChange {
    Unchanged,
    Applied,
    /// Applying the change would drop every live session. Pass the token
    /// to `confirm_audio_change` or `decline_audio_change`.
    NeedsConfirmation(ConfirmationToken),
}

#[must_use]
#[derive(Debug, PartialEq, Eq)]
pub struct ConfirmationToken {
    serial: u64,
    enabled: bool,
}

impl ConfirmationToken {
    /// The audio setting this token would apply.
    pub fn enabled(&self) -> bool {
        self.enabled
    }
}

// ── SessionRegistry ──────────────────────────────────────────────

pub struct SessionRegistry {
    transport: Box<dyn Transport>,
    pending: HashMap<SessionId, Session>,
    connected: HashMap<SessionId, Live>,
    events: mpsc::UnboundedSender<SessionEvent>,
    audio_enabled: bool,
    outstanding: Option<u64>,
    next_serial: u64,
}

impl SessionRegistry {
    pub fn new(transport: Box<dyn Transport>, audio_enabled: bool) -> (Self, SessionEventReceiver) {
        let (events, rx) = mpsc::unbounded_channel();
        let registry = Self {
            transport,
            pending: HashMap::new(),
            connected: HashMap::new(),
            events,
            audio_enabled,
            outstanding: None,
            next_serial: 0,
        };
        (registry, rx)
    }

    pub fn kind(&self) -> TransportKind {
        self.transport.kind()
    }

    pub fn audio_enabled(&self) -> bool {
        self.audio_enabled
    }

    pub fn get(&self, id: &str) -> Option<&Session> {
        self.pending
            .get(id)
            .or_else(|| self.connected.get(id).map(|l| &l.session))
    }

    pub fn is_pending(&self, id: &str) -> bool {
        self.pending.contains_key(id)
    }

    pub fn is_connected(&self, id: &str) -> bool {
        self.connected.contains_key(id)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn connected_count(&self) -> usize {
        self.connected.len()
    }

    // ── Offers ───────────────────────────────────────────────────

    /// Record a viewer's request as a pending session.
    pub fn add_offer(
        &mut self,
        id: impl Into<SessionId>,
        remote_label: Option<String>,
    ) -> Result<(), ShareError> {
        let id = id.into();
        if self.connected.contains_key(&id) {
            return Err(ShareError::InvalidTransition(
                "cannot add offer: session already connected",
            ));
        }
        if self.pending.contains_key(&id) {
            return Err(ShareError::TransientSignaling(format!(
                "duplicate request for pending session {id}"
            )));
        }
        let mut session = Session::pending(id.clone(), self.transport.kind());
        session.remote_label = remote_label;
        debug!(session = %id, "pending session added");
        self.pending.insert(id, session);
        Ok(())
    }

    /// Drop a pending session.
    pub fn remove_offer(&mut self, id: &str) -> Option<Session> {
        self.pending.remove(id)
    }

    /// Open the transport for a pending session. `None` means the
    /// session could not be set up and the caller must decline it.
    pub async fn accept_offer(
        &mut self,
        id: &str,
        source: Arc<dyn FrameSource>,
        screen: Option<ScreenSize>,
    ) -> Option<HandshakeOffer> {
        let Some(mut session) = self.pending.remove(id) else {
            warn!(session = %id, "accept for unknown pending session");
            return None;
        };

        let params = AcceptParams {
            source,
            screen,
            audio_enabled: self.audio_enabled,
        };
        let events = SessionEvents::new(id, self.events.clone());
        let opened = match self.transport.open(params, events).await {
            Ok(opened) => opened,
            Err(e) => {
                warn!(session = %id, class = ?e.class(), "session setup failed: {e}");
                return None;
            }
        };

        let screen = screen.or(match &opened.offer {
            OfferBody::Relayed(p) => Some(ScreenSize::new(p.width, p.height)),
            OfferBody::Peer(_) => None,
        });
        let mut handle = opened.handle;
        if let Err(e) = session.connect(screen, self.audio_enabled) {
            warn!(session = %id, "{e}");
            handle.close().await;
            return None;
        }

        info!(session = %id, transport = %self.transport.kind(), "session accepted");
        self.connected
            .insert(id.to_string(), Live { session, handle });
        Some(opened.offer)
    }

    /// Apply the viewer's answer. A negotiation failure tears the session
    /// down before the error is returned.
    pub async fn accept_answer(
        &mut self,
        id: &str,
        answer: Option<SessionDescription>,
    ) -> Result<(), ShareError> {
        let live = self
            .connected
            .get_mut(id)
            .ok_or_else(|| ShareError::TransientSignaling(format!("answer for unknown session {id}")))?;
        let result = live.handle.accept_answer(answer).await;
        if let Err(e) = &result {
            if e.class() == ErrorClass::Negotiation {
                warn!(session = %id, "negotiation failed, tearing down: {e}");
                self.disconnect(id).await;
            }
        }
        result
    }

    pub async fn add_candidate(
        &mut self,
        id: &str,
        candidate: IceCandidate,
    ) -> Result<(), ShareError> {
        let live = self
            .connected
            .get_mut(id)
            .ok_or_else(|| ShareError::TransientSignaling(format!("candidate for unknown session {id}")))?;
        live.handle.add_candidate(candidate).await
    }

    // ── Audio ────────────────────────────────────────────────────

    /// Apply an audio toggle to every live session. For transports that
    /// must restart, this drains both collections and returns the ids.
    pub async fn update_audio(
        &mut self,
        enabled: bool,
        source: &dyn FrameSource,
    ) -> Result<Drained, ShareError> {
        self.audio_enabled = enabled;
        self.outstanding = None;

        match self.transport.audio_swap() {
            AudioSwap::InBand => {
                for (id, live) in self.connected.iter_mut() {
                    if let Err(e) = live.handle.set_audio(enabled, source).await {
                        warn!(session = %id, "audio swap failed: {e}");
                        continue;
                    }
                    live.session.audio_enabled = enabled;
                }
                info!(enabled, "audio updated in-band");
                Ok(Drained::default())
            }
            // Nothing live to restart; queued requests pick up the new setting.
            AudioSwap::Restart if self.connected.is_empty() => {
                info!(enabled, "audio updated");
                Ok(Drained::default())
            }
            AudioSwap::Restart => {
                let dropped = self.disconnect_all().await;
                info!(
                    enabled,
                    dropped = dropped.connected.len(),
                    withdrawn = dropped.pending.len(),
                    "audio updated with restart"
                );
                Ok(dropped)
            }
        }
    }

    /// First step of an audio toggle. Changes that would drop live
    /// sessions are held until confirmed.
    pub async fn request_audio_change(
        &mut self,
        enabled: bool,
        source: &dyn FrameSource,
    ) -> Result<AudioChange, ShareError> {
        if enabled == self.audio_enabled {
            return Ok(AudioChange::Unchanged);
        }
        if self.transport.audio_swap() == AudioSwap::Restart && !self.connected.is_empty() {
            self.next_serial += 1;
            self.outstanding = Some(self.next_serial);
            return Ok(AudioChange::NeedsConfirmation(ConfirmationToken {
                serial: self.next_serial,
                enabled,
            }));
        }
        self.update_audio(enabled, source).await?;
        Ok(AudioChange::Applied)
    }

    /// Apply a held audio change. Returns the sessions that were dropped.
    pub async fn confirm_audio_change(
        &mut self,
        token: ConfirmationToken,
        source: &dyn FrameSource,
    ) -> Result<Drained, ShareError> {
        self.redeem(&token)?;
        self.update_audio(token.enabled, source).await
    }

    /// Discard a held audio change. Nothing is modified.
    pub fn decline_audio_change(&mut self, token: ConfirmationToken) -> Result<(), ShareError> {
        self.redeem(&token)?;
        debug!("audio change declined");
        Ok(())
    }

    fn redeem(&mut self, token: &ConfirmationToken) -> Result<(), ShareError> {
        if self.outstanding != Some(token.serial) {
            return Err(ShareError::StaleConfirmation);
        }
        self.outstanding = None;
        Ok(())
    }

    // ── Teardown ─────────────────────────────────────────────────

    /// Close and remove a session from both collections.
    pub async fn disconnect(&mut self, id: &str) -> Option<Session> {
        if let Some(session) = self.pending.remove(id) {
            return Some(session);
        }
        let mut live = self.connected.remove(id)?;
        live.handle.close().await;
        if let Err(e) = live.session.disconnect() {
            debug!(session = %id, "{e}");
        }
        info!(session = %id, "session disconnected");
        Some(live.session)
    }

    /// Close every connected session and forget every pending request.
    pub async fn disconnect_all(&mut self) -> Drained {
        let pending = self.pending.drain().map(|(id, _)| id).collect();
        let connected: Vec<SessionId> = self.connected.keys().cloned().collect();
        for id in &connected {
            self.disconnect(id).await;
        }
        Drained { connected, pending }
    }

    /// Pending requests, or live sessions whose transport currently
    /// reports the selected status. `All` covers every live session.
    pub fn filter_connections(&self, filter: StatusFilter) -> Vec<SessionInfo> {
        let wanted = match filter {
            StatusFilter::Pending => {
                return self
                    .pending
                    .values()
                    .map(|s| SessionInfo {
                        session: s.clone(),
                        status: None,
                    })
                    .collect();
            }
            StatusFilter::All => None,
            StatusFilter::Connecting => Some(ConnectionStatus::Connecting),
            StatusFilter::Connected => Some(ConnectionStatus::Connected),
            StatusFilter::Disconnected => Some(ConnectionStatus::Disconnected),
        };
        self.connected
            .values()
            .filter_map(|l| {
                let status = l.handle.status();
                wanted.is_none_or(|w| w == status).then(|| SessionInfo {
                    session: l.session.clone(),
                    status: Some(status),
                })
            })
            .collect()
    }

    /// Drop every session and release transport-wide resources.
    pub async fn shutdown(&mut self) {
        self.disconnect_all().await;
        self.outstanding = None;
        self.transport.shutdown().await;
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::source::TrackHandle;
    use crate::media::types::{PixelFormat, RawFrame};
    use crate::protocol::signal::{PeerOffer, StreamParams};
    use crate::transport::Opened;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Source;

    #[async_trait]
    impl FrameSource for Source {
        async fn capture(&self) -> Result<RawFrame, ShareError> {
            Ok(RawFrame::filled(8, 8, PixelFormat::Rgba8, 0))
        }
        fn video_track(&self) -> Option<TrackHandle> {
            None
        }
        fn audio_track(&self) -> Option<TrackHandle> {
            None
        }
    }

    #[derive(Default)]
    struct Log {
        opened: AtomicUsize,
        closed: AtomicUsize,
        audio: Mutex<Vec<bool>>,
        answers: Mutex<Vec<String>>,
        sessions: Mutex<Vec<SessionEvents>>,
    }

    struct FakeTransport {
        swap: AudioSwap,
        fail: bool,
        reject_answers: bool,
        log: Arc<Log>,
    }

    struct FakeHandle {
        log: Arc<Log>,
        events: SessionEvents,
        reject_answers: bool,
        closed: bool,
    }

    #[async_trait]
    impl Transport for FakeTransport {
        fn kind(&self) -> TransportKind {
            match self.swap {
                AudioSwap::InBand => TransportKind::Peer,
                AudioSwap::Restart => TransportKind::Relayed,
            }
        }
        fn audio_swap(&self) -> AudioSwap {
            self.swap
        }
        async fn open(
            &self,
            _params: AcceptParams,
            events: SessionEvents,
        ) -> Result<Opened, ShareError> {
            if self.fail {
                return Err(ShareError::SetupFailure("no encoder".into()));
            }
            self.log.opened.fetch_add(1, Ordering::SeqCst);
            self.log.sessions.lock().unwrap().push(events.clone());
            let offer = match self.swap {
                AudioSwap::InBand => OfferBody::Peer(PeerOffer::new(
                    SessionDescription::offer("v=0"),
                    Vec::new(),
                )),
                AudioSwap::Restart => {
                    events.status(ConnectionStatus::Connected);
                    OfferBody::Relayed(StreamParams {
                        width: 8,
                        height: 8,
                        codec: "tiled".into(),
                    })
                }
            };
            Ok(Opened {
                handle: Box::new(FakeHandle {
                    log: self.log.clone(),
                    events,
                    reject_answers: self.reject_answers,
                    closed: false,
                }),
                offer,
            })
        }
    }

    #[async_trait]
    impl TransportHandle for FakeHandle {
        async fn accept_answer(
            &mut self,
            answer: Option<SessionDescription>,
        ) -> Result<(), ShareError> {
            if self.reject_answers {
                return Err(ShareError::NegotiationFailure("bad sdp".into()));
            }
            if let Some(a) = answer {
                self.log.answers.lock().unwrap().push(a.sdp);
            }
            Ok(())
        }
        async fn add_candidate(&mut self, _: IceCandidate) -> Result<(), ShareError> {
            Ok(())
        }
        async fn set_audio(&mut self, enabled: bool, _: &dyn FrameSource) -> Result<(), ShareError> {
            self.log.audio.lock().unwrap().push(enabled);
            Ok(())
        }
        fn status(&self) -> ConnectionStatus {
            self.events.current()
        }
        async fn close(&mut self) {
            if !self.closed {
                self.closed = true;
                self.log.closed.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    fn registry(swap: AudioSwap) -> (SessionRegistry, Arc<Log>) {
        let log = Arc::new(Log::default());
        let transport = FakeTransport {
            swap,
            fail: false,
            reject_answers: false,
            log: log.clone(),
        };
        let (reg, _rx) = SessionRegistry::new(Box::new(transport), true);
        (reg, log)
    }

    fn source() -> Arc<dyn FrameSource> {
        Arc::new(Source)
    }

    fn assert_disjoint(reg: &SessionRegistry) {
        for id in reg.pending.keys() {
            assert!(!reg.connected.contains_key(id), "{id} in both collections");
        }
    }

    #[tokio::test]
    async fn accept_moves_pending_to_connected() {
        let (mut reg, log) = registry(AudioSwap::InBand);
        reg.add_offer("v1", Some("10.0.0.2".into())).unwrap();
        assert!(reg.is_pending("v1"));
        assert_disjoint(&reg);

        let offer = reg.accept_offer("v1", source(), None).await;
        assert!(matches!(offer, Some(OfferBody::Peer(_))));
        assert!(reg.is_connected("v1") && !reg.is_pending("v1"));
        assert_disjoint(&reg);
        assert_eq!(log.opened.load(Ordering::SeqCst), 1);
        assert_eq!(
            reg.get("v1").and_then(|s| s.remote_label.clone()).as_deref(),
            Some("10.0.0.2")
        );
    }

    #[tokio::test]
    async fn accept_unknown_or_failed_yields_none() {
        let log = Arc::new(Log::default());
        let (mut reg, _rx) = SessionRegistry::new(
            Box::new(FakeTransport {
                swap: AudioSwap::InBand,
                fail: true,
                reject_answers: false,
                log,
            }),
            false,
        );
        assert!(reg.accept_offer("ghost", source(), None).await.is_none());

        reg.add_offer("v1", None).unwrap();
        assert!(reg.accept_offer("v1", source(), None).await.is_none());
        assert!(reg.get("v1").is_none());
    }

    #[tokio::test]
    async fn add_offer_rejects_connected_id() {
        let (mut reg, _) = registry(AudioSwap::InBand);
        reg.add_offer("v1", None).unwrap();
        reg.accept_offer("v1", source(), None).await.unwrap();
        assert!(matches!(
            reg.add_offer("v1", None),
            Err(ShareError::InvalidTransition(_))
        ));
    }

    #[tokio::test]
    async fn duplicate_request_creates_one_handshake() {
        let (mut reg, log) = registry(AudioSwap::InBand);
        reg.add_offer("v1", None).unwrap();
        let err = reg.add_offer("v1", None).unwrap_err();
        assert!(err.is_transient());
        assert_eq!(reg.pending_count(), 1);

        reg.accept_offer("v1", source(), None).await.unwrap();
        assert!(reg.accept_offer("v1", source(), None).await.is_none());
        assert_eq!(log.opened.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn disconnect_frees_id_for_new_request() {
        let (mut reg, _) = registry(AudioSwap::InBand);
        reg.add_offer("v1", None).unwrap();
        reg.accept_offer("v1", source(), None).await.unwrap();
        reg.disconnect("v1").await.unwrap();
        reg.add_offer("v1", None).unwrap();
        assert!(reg.is_pending("v1"));
    }

    #[tokio::test]
    async fn disconnect_removes_from_both() {
        let (mut reg, log) = registry(AudioSwap::InBand);
        reg.add_offer("a", None).unwrap();
        reg.add_offer("b", None).unwrap();
        reg.accept_offer("a", source(), None).await.unwrap();

        let a = reg.disconnect("a").await.unwrap();
        assert_eq!(a.state, crate::session::state::SessionState::Disconnected);
        assert!(reg.disconnect("b").await.is_some());
        assert!(reg.get("a").is_none() && reg.get("b").is_none());
        assert!(reg.disconnect("a").await.is_none());
        assert_eq!(log.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn answers_route_to_handle() {
        let (mut reg, log) = registry(AudioSwap::InBand);
        reg.add_offer("v1", None).unwrap();
        reg.accept_offer("v1", source(), None).await.unwrap();
        reg.accept_answer("v1", Some(SessionDescription::answer("ans")))
            .await
            .unwrap();
        assert_eq!(*log.answers.lock().unwrap(), ["ans"]);

        let err = reg.accept_answer("nobody", None).await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn negotiation_failure_tears_down() {
        let log = Arc::new(Log::default());
        let (mut reg, _rx) = SessionRegistry::new(
            Box::new(FakeTransport {
                swap: AudioSwap::InBand,
                fail: false,
                reject_answers: true,
                log: log.clone(),
            }),
            true,
        );
        reg.add_offer("v1", None).unwrap();
        reg.accept_offer("v1", source(), None).await.unwrap();
        assert!(reg.accept_answer("v1", None).await.is_err());
        assert!(!reg.is_connected("v1"));
        assert_eq!(log.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn in_band_audio_applies_immediately() {
        let (mut reg, log) = registry(AudioSwap::InBand);
        reg.add_offer("v1", None).unwrap();
        reg.accept_offer("v1", source(), None).await.unwrap();

        assert_eq!(
            reg.request_audio_change(true, &Source).await.unwrap(),
            AudioChange::Unchanged
        );
        assert_eq!(
            reg.request_audio_change(false, &Source).await.unwrap(),
            AudioChange::Applied
        );
        assert!(!reg.audio_enabled());
        assert_eq!(*log.audio.lock().unwrap(), [false]);
        assert!(reg.is_connected("v1"));
    }

    #[tokio::test]
    async fn audio_toggle_keeps_session_identity() {
        let (mut reg, log) = registry(AudioSwap::InBand);
        reg.add_offer("v1", None).unwrap();
        reg.accept_offer("v1", source(), Some(ScreenSize::new(1920, 1080)))
            .await
            .unwrap();

        reg.update_audio(false, &Source).await.unwrap();
        reg.update_audio(true, &Source).await.unwrap();

        assert_eq!(*log.audio.lock().unwrap(), [false, true]);
        let session = reg.get("v1").unwrap();
        assert_eq!(session.id, "v1");
        assert!(session.audio_enabled);
        assert_eq!(session.screen, Some(ScreenSize::new(1920, 1080)));
    }

    #[tokio::test]
    async fn restart_audio_needs_confirmation() {
        let (mut reg, log) = registry(AudioSwap::Restart);
        reg.add_offer("a", None).unwrap();
        reg.add_offer("b", None).unwrap();
        reg.accept_offer("a", source(), None).await.unwrap();
        reg.accept_offer("b", source(), None).await.unwrap();

        let AudioChange::NeedsConfirmation(token) =
            reg.request_audio_change(false, &Source).await.unwrap()
        else {
            panic!("expected confirmation");
        };
        assert!(!token.enabled());
        assert!(reg.audio_enabled());

        let mut dropped = reg.confirm_audio_change(token, &Source).await.unwrap();
        dropped.connected.sort();
        assert_eq!(dropped.connected, ["a", "b"]);
        assert!(dropped.pending.is_empty());
        assert!(!reg.audio_enabled());
        assert_eq!(reg.connected_count(), 0);
        assert_eq!(log.closed.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn declined_confirmation_changes_nothing() {
        let (mut reg, log) = registry(AudioSwap::Restart);
        reg.add_offer("a", None).unwrap();
        reg.accept_offer("a", source(), None).await.unwrap();

        let AudioChange::NeedsConfirmation(token) =
            reg.request_audio_change(false, &Source).await.unwrap()
        else {
            panic!("expected confirmation");
        };
        reg.decline_audio_change(token).unwrap();
        assert!(reg.audio_enabled());
        assert!(reg.is_connected("a"));
        assert_eq!(log.closed.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn stale_token_is_rejected() {
        let (mut reg, _) = registry(AudioSwap::Restart);
        reg.add_offer("a", None).unwrap();
        reg.accept_offer("a", source(), None).await.unwrap();

        let AudioChange::NeedsConfirmation(first) =
            reg.request_audio_change(false, &Source).await.unwrap()
        else {
            panic!("expected confirmation");
        };
        let AudioChange::NeedsConfirmation(second) =
            reg.request_audio_change(false, &Source).await.unwrap()
        else {
            panic!("expected confirmation");
        };
        assert!(matches!(
            reg.confirm_audio_change(first, &Source).await,
            Err(ShareError::StaleConfirmation)
        ));
        assert!(reg.is_connected("a"));
        reg.decline_audio_change(second).unwrap();
    }

    #[tokio::test]
    async fn restart_without_sessions_applies() {
        let (mut reg, _) = registry(AudioSwap::Restart);
        assert_eq!(
            reg.request_audio_change(false, &Source).await.unwrap(),
            AudioChange::Applied
        );
        assert!(!reg.audio_enabled());
    }

    #[tokio::test]
    async fn filter_by_status() {
        let (mut reg, _) = registry(AudioSwap::Restart);
        reg.add_offer("a", None).unwrap();
        reg.add_offer("b", None).unwrap();
        reg.accept_offer("a", source(), None).await.unwrap();

        let connected = reg.filter_connections(StatusFilter::Connected);
        assert_eq!(connected.len(), 1);
        assert_eq!(connected[0].session.id, "a");
        assert_eq!(connected[0].session.screen, Some(ScreenSize::new(8, 8)));

        let pending = reg.filter_connections(StatusFilter::Pending);
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].status, None);
        assert!(reg.filter_connections(StatusFilter::Connecting).is_empty());
    }

    #[tokio::test]
    async fn filter_all_reports_live_status() {
        let (mut reg, log) = registry(AudioSwap::InBand);
        for id in ["a", "b", "c", "d"] {
            reg.add_offer(id, None).unwrap();
        }
        for id in ["a", "b", "c"] {
            reg.accept_offer(id, source(), None).await.unwrap();
        }
        {
            let sessions = log.sessions.lock().unwrap();
            sessions[1].status(ConnectionStatus::Connected);
            sessions[2].status(ConnectionStatus::Disconnected);
        }

        let mut all: Vec<(String, Option<ConnectionStatus>)> = reg
            .filter_connections(StatusFilter::All)
            .into_iter()
            .map(|i| (i.session.id, i.status))
            .collect();
        all.sort_by(|x, y| x.0.cmp(&y.0));
        assert_eq!(
            all,
            [
                ("a".to_string(), Some(ConnectionStatus::Connecting)),
                ("b".to_string(), Some(ConnectionStatus::Connected)),
                ("c".to_string(), Some(ConnectionStatus::Disconnected)),
            ]
        );

        let connecting = reg.filter_connections(StatusFilter::Connecting);
        assert_eq!(connecting.len(), 1);
        assert_eq!(connecting[0].session.id, "a");
        let gone = reg.filter_connections(StatusFilter::Disconnected);
        assert_eq!(gone.len(), 1);
        assert_eq!(gone[0].status, Some(ConnectionStatus::Disconnected));
    }

    #[tokio::test]
    async fn disconnect_all_drains_pending_too() {
        let (mut reg, log) = registry(AudioSwap::Restart);
        reg.add_offer("a", None).unwrap();
        reg.add_offer("b", None).unwrap();
        reg.accept_offer("a", source(), None).await.unwrap();

        let drained = reg.disconnect_all().await;
        assert_eq!(drained.connected, ["a"]);
        assert_eq!(drained.pending, ["b"]);
        assert_eq!(reg.pending_count(), 0);
        assert_eq!(reg.connected_count(), 0);
        assert_eq!(log.closed.load(Ordering::SeqCst), 1);
        assert!(reg.accept_offer("b", source(), None).await.is_none());
    }

    #[tokio::test]
    async fn audio_restart_withdraws_pending_requests() {
        let (mut reg, _) = registry(AudioSwap::Restart);
        reg.add_offer("a", None).unwrap();
        reg.add_offer("b", None).unwrap();
        reg.accept_offer("a", source(), None).await.unwrap();

        let AudioChange::NeedsConfirmation(token) =
            reg.request_audio_change(false, &Source).await.unwrap()
        else {
            panic!("expected confirmation");
        };
        let drained = reg.confirm_audio_change(token, &Source).await.unwrap();
        assert_eq!(drained.pending, ["b"]);
        assert!(!reg.is_pending("b"));
    }

    #[tokio::test]
    async fn shutdown_clears_everything() {
        let (mut reg, log) = registry(AudioSwap::InBand);
        reg.add_offer("a", None).unwrap();
        reg.add_offer("b", None).unwrap();
        reg.accept_offer("a", source(), None).await.unwrap();
        reg.shutdown().await;
        assert_eq!(reg.connected_count() + reg.pending_count(), 0);
        assert_eq!(log.closed.load(Ordering::SeqCst), 1);
    }
}
