//! Configuration for the relay broker.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;

use serde::{Deserialize, Serialize};

use screensheet_core::broker::DEFAULT_PORT;

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Network settings.
    pub network: NetworkConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Network configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address to bind.
    pub listen_addr: IpAddr,
    /// TCP port for hosts and viewers.
    pub port: u16,
    /// Keep-alive period in seconds.
    pub heartbeat_secs: u64,
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            listen_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            heartbeat_secs: 5,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

impl NetworkConfig {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.listen_addr, self.port)
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl RelayConfig {
    /// Load configuration from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Write the default configuration to a file (for bootstrapping).
    pub fn write_default(path: &Path) -> std::io::Result<()> {
        let text = toml::to_string_pretty(&Self::default()).map_err(std::io::Error::other)?;
        std::fs::write(path, text)
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_listen_everywhere_on_3001() {
        let cfg = RelayConfig::default();
        assert_eq!(cfg.network.socket_addr().to_string(), "0.0.0.0:3001");
        assert_eq!(cfg.network.heartbeat_secs, 5);
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn partial_override() {
        let cfg: RelayConfig = toml::from_str(
            r#"
            [network]
            listen_addr = "127.0.0.1"
            port = 4000
            "#,
        )
        .unwrap();
        assert_eq!(cfg.network.socket_addr().to_string(), "127.0.0.1:4000");
        assert_eq!(cfg.network.heartbeat_secs, 5);
    }

    #[test]
    fn invalid_file_falls_back() {
        let path = std::env::temp_dir().join(format!("screensheet-relay-{}.toml", std::process::id()));
        std::fs::write(&path, "[network\nport = ").unwrap();
        assert_eq!(RelayConfig::load(&path), RelayConfig::default());
        std::fs::remove_file(&path).unwrap();
    }
}
