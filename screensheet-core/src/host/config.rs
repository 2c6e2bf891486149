//! Host agent configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::tiles::encoder::TileConfig;
use crate::transport::TransportKind;

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub relay: RelaySettings,
    pub sharing: SharingSettings,
    /// Relayed stream tuning.
    pub tiles: TileConfig,
    pub negotiation: NegotiationSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelaySettings {
    /// `host:port` of the relay broker.
    pub address: String,
    pub heartbeat_secs: u64,
}

/// What the host shares and what viewers may do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SharingSettings {
    pub method: TransportKind,
    pub audio: bool,
    /// Apply viewer input.
    pub control: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NegotiationSettings {
    /// Upper bound on candidate gathering.
    pub ice_timeout_ms: u64,
    pub ice_servers: Vec<String>,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:3001".into(),
            heartbeat_secs: 5,
        }
    }
}

impl Default for SharingSettings {
    fn default() -> Self {
        Self {
            method: TransportKind::Peer,
            audio: true,
            control: true,
        }
    }
}

impl Default for NegotiationSettings {
    fn default() -> Self {
        Self {
            ice_timeout_ms: 10_000,
            ice_servers: vec!["stun:stun.l.google.com:19302".into()],
        }
    }
}

impl RelaySettings {
    pub fn heartbeat(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs.max(1))
    }
}

impl NegotiationSettings {
    pub fn ice_timeout(&self) -> Duration {
        Duration::from_millis(self.ice_timeout_ms)
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl HostConfig {
    /// Load configuration from a TOML file, falling back to defaults.
    ///
    /// Tile settings the encoder would refuse are replaced by the
    /// default tile settings.
    pub fn load(path: &Path) -> Self {
        let mut config: Self = match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        };
        if let Err(e) = config.tiles.validate() {
            tracing::warn!("invalid [tiles] in {}: {e}; using default tiles", path.display());
            config.tiles = TileConfig::default();
        }
        config
    }

    /// Write the default configuration to a file.
    pub fn write_default(path: &Path) -> std::io::Result<()> {
        let text = toml::to_string_pretty(&Self::default()).map_err(std::io::Error::other)?;
        std::fs::write(path, text)
    }
}

// ── Tests ────────────────────────────────────────────────────────
