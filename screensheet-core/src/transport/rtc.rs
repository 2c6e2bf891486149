//! `webrtc`-backed peer stack.
//!
//! Enabled with the `webrtc` feature. Callbacks registered on the
//! `RTCPeerConnection` forward into the [`PeerEvent`] channel handed to
//! [`PeerConnector::connect`].

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};
use tracing::debug;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MediaEngine};
use webrtc::api::{API, APIBuilder};
use webrtc::data_channel::RTCDataChannel;
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::rtp_codec::{RTCRtpCodecCapability, RTPCodecType};
use webrtc::rtp_transceiver::rtp_sender::RTCRtpSender;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_remote::TrackRemote;

use crate::error::ShareError;
use crate::media::source::{MediaTrack, TrackHandle, TrackKind};
use crate::protocol::signal::{IceCandidate, SdpKind, SessionDescription};
use crate::transport::peer::{PeerConnection, PeerConnector, PeerEvent, PeerState};

fn rtc_err(e: webrtc::Error) -> ShareError {
    ShareError::Other(e.to_string())
}

// ── Tracks ───────────────────────────────────────────────────────

/// A local sample track a capture pipeline writes into.
#[derive(Debug)]
pub struct RtcTrack {
    id: String,
    kind: TrackKind,
    track: Arc<TrackLocalStaticSample>,
}

impl RtcTrack {
    pub fn new(kind: TrackKind, mime_type: &str, id: impl Into<String>) -> Self {
        let id = id.into();
        let track = Arc::new(TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: mime_type.to_string(),
                ..Default::default()
            },
            id.clone(),
            "screensheet".to_string(),
        ));
        Self { id, kind, track }
    }

    pub fn sample_track(&self) -> Arc<TrackLocalStaticSample> {
        Arc::clone(&self.track)
    }
}

impl MediaTrack for RtcTrack {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> TrackKind {
        self.kind
    }

    fn stop(&self) {}

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// An inbound track announced by the remote side.
#[derive(Debug)]
pub struct RtcRemoteTrack {
    id: String,
    kind: TrackKind,
    track: Arc<TrackRemote>,
}

impl RtcRemoteTrack {
    pub fn remote(&self) -> Arc<TrackRemote> {
        Arc::clone(&self.track)
    }
}

impl MediaTrack for RtcRemoteTrack {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> TrackKind {
        self.kind
    }

    fn stop(&self) {}

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn local_track(track: &TrackHandle) -> Result<Arc<dyn TrackLocal + Send + Sync>, ShareError> {
    track
        .as_any()
        .downcast_ref::<RtcTrack>()
        .map(|t| t.sample_track() as Arc<dyn TrackLocal + Send + Sync>)
        .ok_or_else(|| ShareError::SetupFailure(format!("track {} is not an RtcTrack", track.id())))
}

// ── Conversions ──────────────────────────────────────────────────

fn to_rtc(desc: SessionDescription) -> Result<RTCSessionDescription, ShareError> {
    match desc.kind {
        SdpKind::Offer => RTCSessionDescription::offer(desc.sdp),
        SdpKind::Answer => RTCSessionDescription::answer(desc.sdp),
    }
    .map_err(rtc_err)
}

fn from_rtc(desc: RTCSessionDescription) -> Result<SessionDescription, ShareError> {
    match desc.sdp_type {
        RTCSdpType::Offer => Ok(SessionDescription::offer(desc.sdp)),
        RTCSdpType::Answer => Ok(SessionDescription::answer(desc.sdp)),
        other => Err(ShareError::NegotiationFailure(format!(
            "unsupported description type {other}"
        ))),
    }
}

fn from_state(state: RTCPeerConnectionState) -> PeerState {
    match state {
        RTCPeerConnectionState::New | RTCPeerConnectionState::Unspecified => PeerState::New,
        RTCPeerConnectionState::Connecting => PeerState::Connecting,
        RTCPeerConnectionState::Connected => PeerState::Connected,
        RTCPeerConnectionState::Disconnected => PeerState::Disconnected,
        RTCPeerConnectionState::Failed => PeerState::Failed,
        RTCPeerConnectionState::Closed => PeerState::Closed,
    }
}

// ── Connector ────────────────────────────────────────────────────

pub struct RtcPeerConnector {
    api: API,
    ice_servers: Vec<String>,
    silent: Arc<RtcTrack>,
}

impl RtcPeerConnector {
    pub fn new(ice_servers: Vec<String>) -> Result<Self, ShareError> {
        let mut media = MediaEngine::default();
        media.register_default_codecs().map_err(rtc_err)?;
        let registry = register_default_interceptors(Registry::new(), &mut media).map_err(rtc_err)?;
        let api = APIBuilder::new()
            .with_media_engine(media)
            .with_interceptor_registry(registry)
            .build();
        Ok(Self {
            api,
            ice_servers,
            // Never written to: the remote side hears silence.
            silent: Arc::new(RtcTrack::new(TrackKind::Audio, MIME_TYPE_OPUS, "silence")),
        })
    }
}

#[async_trait]
impl PeerConnector for RtcPeerConnector {
    async fn connect(
        &self,
        events: mpsc::UnboundedSender<PeerEvent>,
    ) -> Result<Arc<dyn PeerConnection>, ShareError> {
        let config = RTCConfiguration {
            ice_servers: vec![RTCIceServer {
                urls: self.ice_servers.clone(),
                ..Default::default()
            }],
            ..Default::default()
        };
        let pc = Arc::new(self.api.new_peer_connection(config).await.map_err(rtc_err)?);

        let tx = events.clone();
        pc.on_peer_connection_state_change(Box::new(move |state: RTCPeerConnectionState| {
            let _ = tx.send(PeerEvent::StateChanged(from_state(state)));
            Box::pin(async {})
        }));

        let tx = events.clone();
        pc.on_ice_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
            let tx = tx.clone();
            Box::pin(async move {
                let Some(candidate) = candidate else { return };
                match candidate.to_json() {
                    Ok(init) => {
                        let _ = tx.send(PeerEvent::LocalCandidate(IceCandidate {
                            candidate: init.candidate,
                            sdp_mid: init.sdp_mid,
                            sdp_mline_index: init.sdp_mline_index,
                            username_fragment: init.username_fragment,
                        }));
                    }
                    Err(e) => debug!("unserialisable local candidate: {e}"),
                }
            })
        }));

        let tx = events.clone();
        pc.on_track(Box::new(move |track: Arc<TrackRemote>, _, _| {
            let kind = match track.kind() {
                RTPCodecType::Audio => TrackKind::Audio,
                _ => TrackKind::Video,
            };
            let handle: TrackHandle = Arc::new(RtcRemoteTrack {
                id: track.id(),
                kind,
                track,
            });
            let _ = tx.send(PeerEvent::RemoteTrack(handle));
            Box::pin(async {})
        }));

        let conn = Arc::new(RtcPeerConnection {
            pc: Arc::clone(&pc),
            channel: Arc::new(Mutex::new(None)),
            audio_sender: Mutex::new(None),
            events: events.clone(),
        });

        // Viewer side: the host creates the channel.
        let slot = Arc::clone(&conn.channel);
        let tx = events;
        pc.on_data_channel(Box::new(move |dc: Arc<RTCDataChannel>| {
            let slot = Arc::clone(&slot);
            let tx = tx.clone();
            Box::pin(async move {
                wire_channel(&dc, tx);
                *slot.lock().await = Some(dc);
            })
        }));

        Ok(conn)
    }

    fn silent_audio(&self) -> Option<TrackHandle> {
        Some(Arc::clone(&self.silent) as TrackHandle)
    }
}

fn wire_channel(dc: &Arc<RTCDataChannel>, events: mpsc::UnboundedSender<PeerEvent>) {
    let tx = events.clone();
    dc.on_open(Box::new(move || {
        let _ = tx.send(PeerEvent::ChannelOpen);
        Box::pin(async {})
    }));
    dc.on_message(Box::new(move |msg: DataChannelMessage| {
        let text = String::from_utf8_lossy(&msg.data).into_owned();
        let _ = events.send(PeerEvent::ChannelMessage(text));
        Box::pin(async {})
    }));
}

// ── Connection ───────────────────────────────────────────────────

pub struct RtcPeerConnection {
    pc: Arc<RTCPeerConnection>,
    channel: Arc<Mutex<Option<Arc<RTCDataChannel>>>>,
    audio_sender: Mutex<Option<Arc<RTCRtpSender>>>,
    events: mpsc::UnboundedSender<PeerEvent>,
}

#[async_trait]
impl PeerConnection for RtcPeerConnection {
    async fn add_track(&self, track: TrackHandle) -> Result<(), ShareError> {
        let local = local_track(&track)?;
        let sender = self.pc.add_track(local).await.map_err(rtc_err)?;
        if track.kind() == TrackKind::Audio {
            *self.audio_sender.lock().await = Some(sender);
        }
        Ok(())
    }

    async fn replace_audio(&self, track: TrackHandle) -> Result<(), ShareError> {
        let local = local_track(&track)?;
        let sender = self.audio_sender.lock().await.clone();
        match sender {
            Some(sender) => sender.replace_track(Some(local)).await.map_err(rtc_err),
            None => self.add_track(track).await,
        }
    }

    async fn create_data_channel(&self, label: &str) -> Result<(), ShareError> {
        let dc = self
            .pc
            .create_data_channel(label, None)
            .await
            .map_err(rtc_err)?;
        wire_channel(&dc, self.events.clone());
        *self.channel.lock().await = Some(dc);
        Ok(())
    }

    async fn create_offer(&self) -> Result<SessionDescription, ShareError> {
        from_rtc(self.pc.create_offer(None).await.map_err(rtc_err)?)
    }

    async fn create_answer(&self) -> Result<SessionDescription, ShareError> {
        from_rtc(self.pc.create_answer(None).await.map_err(rtc_err)?)
    }

    async fn set_local_description(&self, desc: SessionDescription) -> Result<(), ShareError> {
        self.pc
            .set_local_description(to_rtc(desc)?)
            .await
            .map_err(rtc_err)
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<(), ShareError> {
        self.pc
            .set_remote_description(to_rtc(desc)?)
            .await
            .map_err(rtc_err)
    }

    async fn gathering_complete(&self) -> Result<(), ShareError> {
        let mut done = self.pc.gathering_complete_promise().await;
        let _ = done.recv().await;
        Ok(())
    }

    async fn local_description(&self) -> Option<SessionDescription> {
        self.pc
            .local_description()
            .await
            .and_then(|d| from_rtc(d).ok())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), ShareError> {
        self.pc
            .add_ice_candidate(RTCIceCandidateInit {
                candidate: candidate.candidate,
                sdp_mid: candidate.sdp_mid,
                sdp_mline_index: candidate.sdp_mline_index,
                username_fragment: candidate.username_fragment,
            })
            .await
            .map_err(rtc_err)
    }

    async fn send_text(&self, text: String) -> Result<(), ShareError> {
        let dc = self
            .channel
            .lock()
            .await
            .clone()
            .ok_or_else(|| ShareError::TransportLoss("input channel not open".into()))?;
        dc.send_text(text).await.map(|_| ()).map_err(rtc_err)
    }

    async fn close(&self) -> Result<(), ShareError> {
        self.pc.close().await.map_err(rtc_err)
    }
}
