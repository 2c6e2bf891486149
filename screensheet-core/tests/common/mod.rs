//! Test doubles shared by the integration tests.

#![allow(dead_code)]

use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use screensheet_core::error::ShareError;
use screensheet_core::host::InputSink;
use screensheet_core::media::{FrameSource, MediaTrack, PixelFormat, RawFrame, TrackHandle, TrackKind};
use screensheet_core::protocol::{IceCandidate, InputEvent, SdpKind, SessionDescription};
use screensheet_core::transport::{PeerConnection, PeerConnector, PeerEvent, PeerState};

// ── Media ────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct FakeTrack {
    kind: TrackKind,
}

impl MediaTrack for FakeTrack {
    fn id(&self) -> &str {
        match self.kind {
            TrackKind::Audio => "audio",
            TrackKind::Video => "video",
        }
    }

    fn kind(&self) -> TrackKind {
        self.kind
    }

    fn stop(&self) {}

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A frame source that always shows the same solid frame.
pub struct StillSource {
    width: u32,
    height: u32,
    stopped: AtomicBool,
}

impl StillSource {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            stopped: AtomicBool::new(false),
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FrameSource for StillSource {
    async fn capture(&self) -> Result<RawFrame, ShareError> {
        Ok(RawFrame::filled(self.width, self.height, PixelFormat::Bgra8, 0x80))
    }

    fn video_track(&self) -> Option<TrackHandle> {
        Some(Arc::new(FakeTrack {
            kind: TrackKind::Video,
        }))
    }

    fn audio_track(&self) -> Option<TrackHandle> {
        None
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

// ── Input ────────────────────────────────────────────────────────

/// Forwards every injected event to a channel.
pub struct RecordingInputSink {
    tx: mpsc::UnboundedSender<(String, InputEvent)>,
}

impl RecordingInputSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<(String, InputEvent)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl InputSink for RecordingInputSink {
    fn inject(&self, session_id: &str, event: &InputEvent) {
        let _ = self.tx.send((session_id.to_string(), event.clone()));
    }
}

// ── Peer stack ───────────────────────────────────────────────────

/// Screen size the fake viewer-side channel reports.
pub const FAKE_SCREEN: (u32, u32) = (96, 64);

/// An in-memory peer connection. Applying an answer (host side) or
/// producing one (viewer side) reports the link as connected.
#[derive(Default)]
pub struct FakePeer {
    events: Mutex<Option<mpsc::UnboundedSender<PeerEvent>>>,
    sent: Mutex<Vec<String>>,
    remote_candidates: Mutex<Vec<String>>,
    closed: AtomicBool,
}

impl FakePeer {
    fn emit(&self, event: PeerEvent) {
        if let Some(tx) = self.events.lock().unwrap().as_ref() {
            let _ = tx.send(event);
        }
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    pub fn remote_candidates(&self) -> Vec<String> {
        self.remote_candidates.lock().unwrap().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Simulate the link dropping.
    pub fn drop_link(&self) {
        self.emit(PeerEvent::StateChanged(PeerState::Failed));
    }
}

fn candidate(text: &str) -> IceCandidate {
    IceCandidate {
        candidate: text.into(),
        sdp_mid: Some("0".into()),
        sdp_mline_index: Some(0),
        username_fragment: None,
    }
}

#[async_trait]
impl PeerConnection for FakePeer {
    async fn add_track(&self, _track: TrackHandle) -> Result<(), ShareError> {
        Ok(())
    }

    async fn replace_audio(&self, _track: TrackHandle) -> Result<(), ShareError> {
        Ok(())
    }

    async fn create_data_channel(&self, _label: &str) -> Result<(), ShareError> {
        Ok(())
    }

    async fn create_offer(&self) -> Result<SessionDescription, ShareError> {
        Ok(SessionDescription::offer("v=0 host"))
    }

    async fn create_answer(&self) -> Result<SessionDescription, ShareError> {
        Ok(SessionDescription::answer("v=0 viewer"))
    }

    async fn set_local_description(&self, desc: SessionDescription) -> Result<(), ShareError> {
        match desc.kind {
            SdpKind::Offer => self.emit(PeerEvent::LocalCandidate(candidate("host-1"))),
            SdpKind::Answer => {
                self.emit(PeerEvent::LocalCandidate(candidate("viewer-1")));
                self.emit(PeerEvent::StateChanged(PeerState::Connected));
                let (width, height) = FAKE_SCREEN;
                self.emit(PeerEvent::ChannelMessage(format!(
                    r#"{{"width":{width},"height":{height}}}"#
                )));
            }
        }
        Ok(())
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<(), ShareError> {
        if desc.kind == SdpKind::Answer {
            self.emit(PeerEvent::StateChanged(PeerState::Connecting));
            self.emit(PeerEvent::StateChanged(PeerState::Connected));
            self.emit(PeerEvent::ChannelOpen);
        }
        Ok(())
    }

    async fn gathering_complete(&self) -> Result<(), ShareError> {
        Ok(())
    }

    async fn local_description(&self) -> Option<SessionDescription> {
        Some(SessionDescription::offer("v=0 host gathered"))
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), ShareError> {
        self.remote_candidates
            .lock()
            .unwrap()
            .push(candidate.candidate);
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

/// Hands out [`FakePeer`]s and keeps them for inspection.
#[derive(Default)]
pub struct FakeConnector {
    peers: Mutex<Vec<Arc<FakePeer>>>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn peers(&self) -> Vec<Arc<FakePeer>> {
        self.peers.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<Arc<FakePeer>> {
        self.peers.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl PeerConnector for FakeConnector {
    async fn connect(
        &self,
        events: mpsc::UnboundedSender<PeerEvent>,
    ) -> Result<Arc<dyn PeerConnection>, ShareError> {
        let peer = Arc::new(FakePeer::default());
        *peer.events.lock().unwrap() = Some(events);
        self.peers.lock().unwrap().push(Arc::clone(&peer));
        Ok(peer)
    }

    fn silent_audio(&self) -> Option<TrackHandle> {
        Some(Arc::new(FakeTrack {
            kind: TrackKind::Audio,
        }))
    }
}
