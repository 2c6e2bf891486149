//! Viewer service: connect, join, record, and leave.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use screensheet_core::error::ShareError;
use screensheet_core::network::ConnectionInfo;
use screensheet_core::protocol::ErrorCode;
use screensheet_core::transport::PeerConnector;
use screensheet_core::viewer::{ViewerClient, ViewerEvent};

use crate::config::ViewerConfig;
use crate::snapshot::SnapshotWriter;

/// How a viewer run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Stopped locally or the relay went away.
    Stopped,
    /// The host refused or ended the session.
    Ended(ErrorCode),
}

pub struct ViewerService {
    config: ViewerConfig,
    stop: CancellationToken,
}

impl ViewerService {
    pub fn new(config: ViewerConfig) -> Self {
        Self {
            config,
            stop: CancellationToken::new(),
        }
    }

    pub fn stop_handle(&self) -> CancellationToken {
        self.stop.clone()
    }

    pub async fn run(&self) -> Result<Outcome, ShareError> {
        let join = self.config.join.to_request()?;
        let info = ConnectionInfo::parse(&self.config.network.relay_address)?;
        let timeout = self.config.network.timeout();

        let mut client = tokio::time::timeout(timeout, ViewerClient::connect(&info, connector(&self.config)?))
            .await
            .map_err(|_| ShareError::Timeout(timeout))??;
        client.join(&join).await?;
        info!("join request sent");

        let (commands_tx, commands_rx) = mpsc::channel(16);
        let (events_tx, mut events_rx) = mpsc::channel(64);
        let session_stop = self.stop.child_token();

        if let Some(interval) = self.config.output.snapshot_interval() {
            let writer = SnapshotWriter::new(&self.config.output.directory, interval);
            tokio::spawn(writer.run(commands_tx.clone(), session_stop.clone()));
        }

        let watcher_stop = session_stop.clone();
        let watcher = tokio::spawn(async move {
            let mut outcome = Outcome::Stopped;
            while let Some(event) = events_rx.recv().await {
                match event {
                    ViewerEvent::Connected { session_id, transport } => {
                        info!(session = %session_id, %transport, "watching");
                    }
                    ViewerEvent::ScreenSize(size) => {
                        info!(width = size.width, height = size.height, "screen size");
                    }
                    ViewerEvent::Error(code) => {
                        warn!(%code, "session refused or ended");
                        outcome = Outcome::Ended(code);
                        watcher_stop.cancel();
                    }
                    ViewerEvent::Disconnected => watcher_stop.cancel(),
                    ViewerEvent::Frame { .. } | ViewerEvent::Track(_) => {}
                }
            }
            outcome
        });

        let result = client.run(commands_rx, events_tx, session_stop.clone()).await;
        session_stop.cancel();
        drop(commands_tx);
        let outcome = watcher.await.unwrap_or(Outcome::Stopped);

        let stats = client.stats_receiver().borrow().clone();
        info!(frames = stats.frames, tiles = stats.tiles, "viewer finished");
        result.map(|()| outcome)
    }
}

#[cfg(feature = "webrtc")]
fn connector(config: &ViewerConfig) -> Result<Option<Arc<dyn PeerConnector>>, ShareError> {
    let connector = screensheet_core::transport::rtc::RtcPeerConnector::new(
        config.network.ice_servers.clone(),
    )?;
    Ok(Some(Arc::new(connector)))
}

#[cfg(not(feature = "webrtc"))]
fn connector(_config: &ViewerConfig) -> Result<Option<Arc<dyn PeerConnector>>, ShareError> {
    Ok(None)
}
