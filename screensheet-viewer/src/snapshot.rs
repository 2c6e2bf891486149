//! Periodic PNG snapshots of the relayed surface.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use screensheet_core::viewer::ViewerCommand;

/// Asks the viewer loop for a snapshot every `interval`, numbering the
/// files `snapshot-00000.png`, `snapshot-00001.png`, ...
pub struct SnapshotWriter {
    directory: PathBuf,
    interval: Duration,
    next: u64,
}

impl SnapshotWriter {
    pub fn new(directory: impl Into<PathBuf>, interval: Duration) -> Self {
        Self {
            directory: directory.into(),
            interval,
            next: 0,
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Path of the next snapshot; advances the counter.
    pub fn next_path(&mut self) -> PathBuf {
        let path = self.directory.join(format!("snapshot-{:05}.png", self.next));
        self.next += 1;
        path
    }

    pub async fn run(mut self, commands: mpsc::Sender<ViewerCommand>, stop: CancellationToken) {
        if let Err(e) = tokio::fs::create_dir_all(&self.directory).await {
            warn!(dir = %self.directory.display(), "cannot create snapshot directory: {e}");
            return;
        }
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = stop.cancelled() => break,
                _ = ticker.tick() => {
                    let path = self.next_path();
                    if commands.send(ViewerCommand::Snapshot(path)).await.is_err() {
                        break;
                    }
                }
            }
        }
        debug!("snapshot writer stopped");
    }
}

// ── Tests ────────────────────────────────────────────────────────
