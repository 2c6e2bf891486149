//! Capture cadence for the relayed stream.
//!
//! Runs the capture → diff → encode → send loop at a fixed rate until
//! cancelled. Capture and encode failures skip the cycle; the loop only
//! ends on cancellation or when the frame receiver goes away.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::ShareError;
use crate::media::source::FrameSource;
use crate::protocol::frame::StreamFrame;
use crate::tiles::encoder::{TileConfig, TileEncoder};

pub struct TileStreamer {
    encoder: Arc<TileEncoder>,
    source: Arc<dyn FrameSource>,
    frames: mpsc::Sender<StreamFrame>,
    interval: Duration,
}

impl TileStreamer {
    pub fn new(
        config: &TileConfig,
        source: Arc<dyn FrameSource>,
        frames: mpsc::Sender<StreamFrame>,
    ) -> Result<Self, ShareError> {
        Ok(Self {
            encoder: Arc::new(TileEncoder::new(config)?),
            source,
            frames,
            interval: config.frame_interval(),
        })
    }

    /// Shared handle to the encoder, e.g. for [`TileEncoder::invalidate`].
    pub fn encoder(&self) -> Arc<TileEncoder> {
        Arc::clone(&self.encoder)
    }

    /// Spawn the loop on the runtime.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }

    pub async fn run(self, cancel: CancellationToken) {
        let mut frame_number: u64 = 0;

        loop {
            let loop_start = Instant::now();

            let captured = tokio::select! {
                r = self.source.capture() => r,
                _ = cancel.cancelled() => break,
            };

            match captured {
                Ok(raw) => {
                    let encoder = Arc::clone(&self.encoder);
                    let encoded =
                        tokio::task::spawn_blocking(move || encoder.encode_frame(&raw)).await;
                    match encoded {
                        Ok(Ok(Some(frame))) => {
                            frame_number += 1;
                            if self.frames.send(frame).await.is_err() {
                                debug!("frame receiver closed; stopping cadence");
                                break;
                            }
                        }
                        Ok(Ok(None)) => {}
                        Ok(Err(e)) => warn!("tile pass failed: {e}"),
                        Err(e) => warn!("tile pass panicked: {e}"),
                    }
                }
                Err(e) => warn!("capture failed, skipping cycle: {e}"),
            }

            let elapsed = loop_start.elapsed();
            if elapsed < self.interval {
                tokio::select! {
                    _ = tokio::time::sleep(self.interval - elapsed) => {}
                    _ = cancel.cancelled() => break,
                }
            }
        }

        debug!(frames = frame_number, "tile cadence stopped");
    }
}

// ── Tests ────────────────────────────────────────────────────────
