use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::codec::Framed;
use tracing::{debug, warn};

use crate::codec::RelayCodec;
use crate::error::ShareError;
use crate::event::EventKind;
use crate::packet::Packet;

/// Depth of the per-direction packet queues.
const QUEUE_DEPTH: usize = 256;

/// Default keep-alive period.
pub const DEFAULT_HEARTBEAT: Duration = Duration::from_secs(5);

pub type ConnectionSender = mpsc::Sender<Packet>;

/// A framed relay connection to a single peer.
///
/// Reading and writing happen on background tasks; heartbeats are sent
/// periodically and swallowed on receipt, so callers only ever see
/// application packets.
#[derive(Debug)]
pub struct RelayConnection {
    tx: mpsc::Sender<Packet>,
    rx: mpsc::Receiver<Packet>,
    peer_addr: Option<SocketAddr>,
}

impl RelayConnection {
    pub fn new(stream: TcpStream) -> Self {
        Self::with_heartbeat(stream, DEFAULT_HEARTBEAT)
    }

    pub fn with_heartbeat(stream: TcpStream, heartbeat: Duration) -> Self {
        let peer_addr = stream.peer_addr().ok();
        let (mut net_writer, mut net_reader) = Framed::new(stream, RelayCodec).split();

        // User -> Network
        let (user_tx, mut network_rx) = mpsc::channel::<Packet>(QUEUE_DEPTH);

        // Network -> User
        let (network_tx, user_rx) = mpsc::channel(QUEUE_DEPTH);

        tokio::spawn(async move {
            while let Some(packet) = network_rx.recv().await {
                if let Err(e) = net_writer.send(packet).await {
                    warn!("relay write error: {e}");
                    break;
                }
            }
            let _ = net_writer.close().await;
        });

        tokio::spawn(async move {
            while let Some(result) = net_reader.next().await {
                match result {
                    Ok(packet) if packet.kind() == EventKind::Heartbeat => {}
                    Ok(packet) => {
                        if network_tx.send(packet).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("relay read error: {e}");
                        break;
                    }
                }
            }
            debug!("relay reader finished");
        });

        // Weak so that dropping every user-side sender closes the socket.
        let heartbeat_tx = user_tx.downgrade();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(heartbeat);
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(tx) = heartbeat_tx.upgrade() else {
                    break;
                };
                if tx.send(Packet::heartbeat()).await.is_err() {
                    break;
                }
            }
        });

        Self {
            tx: user_tx,
            rx: user_rx,
            peer_addr,
        }
    }

    pub async fn connect(info: &ConnectionInfo) -> Result<Self, ShareError> {
        Self::connect_with_heartbeat(info, DEFAULT_HEARTBEAT).await
    }

    pub async fn connect_with_heartbeat(
        info: &ConnectionInfo,
        heartbeat: Duration,
    ) -> Result<Self, ShareError> {
        let stream = TcpStream::connect(info.to_string()).await?;
        stream.set_nodelay(true)?;
        Ok(Self::with_heartbeat(stream, heartbeat))
    }

    pub async fn send(&self, packet: Packet) -> Result<(), ShareError> {
        self.tx.send(packet).await?;
        Ok(())
    }

    /// Next application packet, or `None` once the peer is gone.
    pub async fn recv(&mut self) -> Option<Packet> {
        self.rx.recv().await
    }

    pub fn sender(&self) -> ConnectionSender {
        self.tx.clone()
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    /// Split into the outbound sender and the inbound receiver.
    pub fn into_parts(self) -> (ConnectionSender, mpsc::Receiver<Packet>) {
        (self.tx, self.rx)
    }
}

// ── ConnectionInfo ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    host: String,
    port: u16,
}

impl ConnectionInfo {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Parse `host:port`.
    pub fn parse(addr: &str) -> Result<Self, ShareError> {
        let (host, port) = addr
            .rsplit_once(':')
            .ok_or_else(|| ShareError::Other(format!("missing port in {addr}")))?;
        let port = port
            .parse()
            .map_err(|_| ShareError::Other(format!("invalid port in {addr}")))?;
        Ok(Self::new(host, port))
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for ConnectionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_connection_info() {
        let info = ConnectionInfo::parse("relay.local:3001").unwrap();
        assert_eq!(info.host(), "relay.local");
        assert_eq!(info.port(), 3001);
        assert_eq!(info.to_string(), "relay.local:3001");

        assert!(ConnectionInfo::parse("relay.local").is_err());
        assert!(ConnectionInfo::parse("relay.local:http").is_err());
    }

    #[tokio::test]
    async fn heartbeats_are_not_surfaced() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let client = tokio::spawn(async move {
            let stream = TcpStream::connect(addr).await.unwrap();
            RelayConnection::with_heartbeat(stream, Duration::from_millis(10))
        });
        let (stream, _) = listener.accept().await.unwrap();
        let mut server = RelayConnection::new(stream);
        let client = client.await.unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        client.send(Packet::register_host()).await.unwrap();

        let pkt = tokio::time::timeout(Duration::from_secs(5), server.recv())
            .await
            .expect("timeout")
            .expect("closed");
        assert_eq!(pkt.kind(), EventKind::RegisterHost);
    }
}
