//! Relay service lifecycle.
//!
//! Binds the broker from [`RelayConfig`] and runs it until the stop
//! token fires.

use std::net::SocketAddr;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::info;

use screensheet_core::broker::RelayBroker;
use screensheet_core::error::ShareError;

use crate::config::RelayConfig;

pub struct RelayService {
    config: RelayConfig,
    stop: CancellationToken,
}

impl RelayService {
    pub fn new(config: RelayConfig) -> Self {
        Self {
            config,
            stop: CancellationToken::new(),
        }
    }

    /// Cancelling this token stops the service.
    pub fn stop_handle(&self) -> CancellationToken {
        self.stop.clone()
    }

    /// Bind the listener. Split from [`Self::serve`] so callers can read
    /// the bound address first.
    pub async fn bind(&self) -> Result<RelayBroker, ShareError> {
        let heartbeat = Duration::from_secs(self.config.network.heartbeat_secs.max(1));
        let broker = RelayBroker::bind(self.config.network.socket_addr())
            .await?
            .with_heartbeat(heartbeat);
        Ok(broker)
    }

    pub async fn serve(&self, broker: RelayBroker) -> Result<(), ShareError> {
        broker.run(self.stop.clone()).await
    }

    /// Bind and serve until stopped.
    pub async fn run(&self) -> Result<SocketAddr, ShareError> {
        let broker = self.bind().await?;
        let addr = broker.local_addr()?;
        info!(%addr, "relay service starting");
        self.serve(broker).await?;
        Ok(addr)
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use screensheet_core::network::{ConnectionInfo, RelayConnection};
    use std::net::{IpAddr, Ipv4Addr};

    #[tokio::test]
    async fn serves_until_stopped() {
        let mut config = RelayConfig::default();
        config.network.listen_addr = IpAddr::V4(Ipv4Addr::LOCALHOST);
        config.network.port = 0;

        let service = RelayService::new(config);
        let stop = service.stop_handle();
        let broker = service.bind().await.unwrap();
        let addr = broker.local_addr().unwrap();
        let router = broker.router();

        let task = tokio::spawn(async move { service.serve(broker).await });

        let info = ConnectionInfo::new("127.0.0.1", addr.port());
        let _conn = RelayConnection::connect(&info).await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), async {
            while router.connection_count().await == 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        stop.cancel();
        let result = tokio::time::timeout(Duration::from_secs(5), task).await.unwrap();
        assert!(result.unwrap().is_ok());
    }
}
