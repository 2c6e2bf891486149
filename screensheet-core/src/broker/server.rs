//! TCP front end for the [`Router`].
//!
//! One task per accepted connection: the connection is attached to
//! the router, every inbound packet is dispatched, and the router is
//! told when the peer goes away.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::broker::router::Router;
use crate::code::connection_id;
use crate::error::ShareError;
use crate::network::{DEFAULT_HEARTBEAT, RelayConnection};

/// Default relay port.
pub const DEFAULT_PORT: u16 = 3001;

pub struct RelayBroker {
    listener: TcpListener,
    router: Arc<Router>,
    heartbeat: Duration,
}

impl RelayBroker {
    pub async fn bind(addr: SocketAddr) -> Result<Self, ShareError> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self::from_listener(listener))
    }

    pub fn from_listener(listener: TcpListener) -> Self {
        Self {
            listener,
            router: Arc::new(Router::new()),
            heartbeat: DEFAULT_HEARTBEAT,
        }
    }

    pub fn with_heartbeat(mut self, heartbeat: Duration) -> Self {
        self.heartbeat = heartbeat;
        self
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ShareError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn router(&self) -> Arc<Router> {
        Arc::clone(&self.router)
    }

    /// Accept connections until `shutdown` fires.
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), ShareError> {
        info!("relay listening on {}", self.listener.local_addr()?);

        loop {
            let accept = tokio::select! {
                result = self.listener.accept() => result,
                _ = shutdown.cancelled() => break,
            };

            let (stream, peer) = match accept {
                Ok(pair) => pair,
                Err(e) => {
                    warn!("accept error: {e}");
                    continue;
                }
            };

            let router = Arc::clone(&self.router);
            let heartbeat = self.heartbeat;
            let shutdown = shutdown.child_token();
            tokio::spawn(async move {
                serve_connection(router, stream, peer, heartbeat, shutdown).await;
            });
        }

        info!("relay stopped");
        Ok(())
    }
}

async fn serve_connection(
    router: Arc<Router>,
    stream: TcpStream,
    peer: SocketAddr,
    heartbeat: Duration,
    shutdown: CancellationToken,
) {
    let _ = stream.set_nodelay(true);
    let id = connection_id();
    let mut conn = RelayConnection::with_heartbeat(stream, heartbeat);
    router.attach(&id, conn.sender(), Some(peer)).await;
    info!(conn = %id, %peer, "connection accepted");

    loop {
        let packet = tokio::select! {
            p = conn.recv() => p,
            _ = shutdown.cancelled() => None,
        };
        let Some(packet) = packet else {
            break;
        };
        let kind = packet.kind();
        if let Err(e) = router.dispatch(&id, packet).await {
            warn!(conn = %id, %kind, "dropping malformed envelope: {e}");
        }
    }

    router.on_disconnect(&id).await;
    debug!(conn = %id, "connection task finished");
}
