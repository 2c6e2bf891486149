//! Relayed transport: tile-delta frames through the broker.
//!
//! Every relayed session shares one [`TileStreamer`]. It starts with the
//! first accepted viewer and is cancelled when the last one closes. Each
//! new viewer invalidates the grid so it starts from a full frame.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::ShareError;
use crate::media::source::FrameSource;
use crate::protocol::frame::StreamFrame;
use crate::protocol::signal::{
    IceCandidate, OfferBody, SessionDescription, StreamParams, TILED_CODEC,
};
use crate::session::events::SessionEvents;
use crate::session::state::ConnectionStatus;
use crate::tiles::cadence::TileStreamer;
use crate::tiles::encoder::{TileConfig, TileEncoder};
use crate::transport::{
    AcceptParams, AudioSwap, Opened, Transport, TransportHandle, TransportKind,
};

struct Running {
    cancel: CancellationToken,
    encoder: Arc<TileEncoder>,
}

#[derive(Default)]
struct SharedStream {
    running: Option<Running>,
    viewers: usize,
}

impl SharedStream {
    fn release(&mut self) {
        self.viewers = self.viewers.saturating_sub(1);
        if self.viewers == 0 {
            if let Some(running) = self.running.take() {
                running.cancel.cancel();
                info!("relayed stream stopped");
            }
        }
    }

    fn stop(&mut self) {
        self.viewers = 0;
        if let Some(running) = self.running.take() {
            running.cancel.cancel();
        }
    }
}

pub struct RelayedTransport {
    config: TileConfig,
    frames: mpsc::Sender<StreamFrame>,
    stream: Arc<Mutex<SharedStream>>,
}

impl RelayedTransport {
    /// Frames produced for any relayed session are sent on `frames`.
    pub fn new(config: TileConfig, frames: mpsc::Sender<StreamFrame>) -> Result<Self, ShareError> {
        config.validate()?;
        Ok(Self {
            config,
            frames,
            stream: Arc::new(Mutex::new(SharedStream::default())),
        })
    }

    /// Number of sessions currently holding the stream.
    pub fn viewers(&self) -> usize {
        self.stream
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .viewers
    }

    pub fn is_streaming(&self) -> bool {
        self.stream
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .running
            .is_some()
    }
}

#[async_trait]
impl Transport for RelayedTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Relayed
    }

    fn audio_swap(&self) -> AudioSwap {
        AudioSwap::Restart
    }

    async fn open(
        &self,
        params: AcceptParams,
        events: SessionEvents,
    ) -> Result<Opened, ShareError> {
        let first = params
            .source
            .capture()
            .await
            .map_err(|e| ShareError::SetupFailure(format!("initial capture failed: {e}")))?;
        let screen = params.screen.unwrap_or_else(|| first.size());

        {
            let mut stream = self.stream.lock().unwrap_or_else(PoisonError::into_inner);
            let running = match stream.running.take() {
                Some(running) => running,
                None => {
                    let streamer = TileStreamer::new(
                        &self.config,
                        Arc::clone(&params.source),
                        self.frames.clone(),
                    )?;
                    let encoder = streamer.encoder();
                    let cancel = CancellationToken::new();
                    streamer.spawn(cancel.clone());
                    info!(fps = self.config.fps, tile = self.config.tile_size, "relayed stream started");
                    Running { cancel, encoder }
                }
            };
            running.encoder.invalidate();
            stream.running = Some(running);
            stream.viewers += 1;
        }

        events.status(ConnectionStatus::Connected);
        debug!(session = %events.id(), width = screen.width, height = screen.height, "relayed session open");

        Ok(Opened {
            handle: Box::new(RelayedHandle {
                stream: Arc::clone(&self.stream),
                events,
                closed: false,
            }),
            offer: OfferBody::Relayed(StreamParams {
                width: screen.width,
                height: screen.height,
                codec: TILED_CODEC.to_string(),
            }),
        })
    }

    async fn shutdown(&self) {
        self.stream
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .stop();
    }
}

struct RelayedHandle {
    stream: Arc<Mutex<SharedStream>>,
    events: SessionEvents,
    closed: bool,
}

impl RelayedHandle {
    fn release(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.events.settle();
        self.stream
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .release();
    }
}

#[async_trait]
impl TransportHandle for RelayedHandle {
    async fn accept_answer(
        &mut self,
        _answer: Option<SessionDescription>,
    ) -> Result<(), ShareError> {
        Ok(())
    }

    async fn add_candidate(&mut self, _candidate: IceCandidate) -> Result<(), ShareError> {
        debug!(session = %self.events.id(), "relayed session ignores candidates");
        Ok(())
    }

    async fn set_audio(
        &mut self,
        _enabled: bool,
        _source: &dyn FrameSource,
    ) -> Result<(), ShareError> {
        Ok(())
    }

    fn status(&self) -> ConnectionStatus {
        self.events.current()
    }

    async fn close(&mut self) {
        self.release();
    }
}

impl Drop for RelayedHandle {
    fn drop(&mut self) {
        self.release();
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::source::TrackHandle;
    use crate::media::types::{PixelFormat, RawFrame, ScreenSize};
    use std::time::Duration;

    struct Still {
        fail: bool,
    }

    #[async_trait]
    impl FrameSource for Still {
        async fn capture(&self) -> Result<RawFrame, ShareError> {
            if self.fail {
                return Err(ShareError::Capture("no display".into()));
            }
            Ok(RawFrame::filled(96, 64, PixelFormat::Bgra8, 9))
        }
        fn video_track(&self) -> Option<TrackHandle> {
            None
        }
        fn audio_track(&self) -> Option<TrackHandle> {
            None
        }
    }

    fn params(fail: bool) -> AcceptParams {
        AcceptParams {
            source: Arc::new(Still { fail }),
            screen: None,
            audio_enabled: false,
        }
    }

    fn events(id: &str) -> SessionEvents {
        let (tx, _rx) = mpsc::unbounded_channel();
        SessionEvents::new(id, tx)
    }

    async fn next(rx: &mut mpsc::Receiver<StreamFrame>) -> StreamFrame {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timeout")
            .expect("frame")
    }

    #[tokio::test]
    async fn handshake_and_status() {
        let (tx, mut rx) = mpsc::channel(8);
        let transport = RelayedTransport::new(TileConfig::default(), tx).unwrap();
        let opened = transport.open(params(false), events("v1")).await.unwrap();

        assert_eq!(
            opened.offer,
            OfferBody::Relayed(StreamParams {
                width: 96,
                height: 64,
                codec: "tiled".into()
            })
        );
        assert_eq!(opened.handle.status(), ConnectionStatus::Connected);

        let frame = next(&mut rx).await;
        assert_eq!(frame.dimensions(), (96, 64));
        assert_eq!(frame.tiles().len(), 2);
    }

    #[tokio::test]
    async fn new_viewer_gets_full_frame() {
        let (tx, mut rx) = mpsc::channel(8);
        let transport = RelayedTransport::new(
            TileConfig {
                fps: 50,
                ..TileConfig::default()
            },
            tx,
        )
        .unwrap();
        let _a = transport.open(params(false), events("a")).await.unwrap();
        next(&mut rx).await;

        let _b = transport.open(params(false), events("b")).await.unwrap();
        assert_eq!(next(&mut rx).await.tiles().len(), 2);
        assert_eq!(transport.viewers(), 2);
    }

    #[tokio::test]
    async fn stream_stops_with_last_viewer() {
        let (tx, _rx) = mpsc::channel(8);
        let transport = RelayedTransport::new(TileConfig::default(), tx).unwrap();
        let mut a = transport.open(params(false), events("a")).await.unwrap().handle;
        let b = transport.open(params(false), events("b")).await.unwrap().handle;

        a.close().await;
        a.close().await;
        assert!(transport.is_streaming());
        assert_eq!(transport.viewers(), 1);

        drop(b);
        assert!(!transport.is_streaming());
        assert_eq!(transport.viewers(), 0);
    }

    #[tokio::test]
    async fn failed_initial_capture_is_setup_failure() {
        let (tx, _rx) = mpsc::channel(8);
        let transport = RelayedTransport::new(TileConfig::default(), tx).unwrap();
        let err = transport.open(params(true), events("a")).await.err().unwrap();
        assert!(matches!(err, ShareError::SetupFailure(_)));
        assert!(!transport.is_streaming());
    }

    #[test]
    fn zero_tile_size_is_refused_up_front() {
        let (tx, _rx) = mpsc::channel(8);
        let cfg = TileConfig {
            tile_size: 0,
            ..TileConfig::default()
        };
        assert!(matches!(
            RelayedTransport::new(cfg, tx),
            Err(ShareError::SetupFailure(_))
        ));
    }

    #[tokio::test]
    async fn explicit_screen_size_wins() {
        let (tx, _rx) = mpsc::channel(8);
        let transport = RelayedTransport::new(TileConfig::default(), tx).unwrap();
        let mut p = params(false);
        p.screen = Some(ScreenSize::new(1920, 1080));
        let opened = transport.open(p, events("a")).await.unwrap();
        assert!(matches!(
            opened.offer,
            OfferBody::Relayed(StreamParams { width: 1920, .. })
        ));
    }
}
