//! # screensheet-core
//!
//! Core library for screensheet screen sharing.
//!
//! This crate contains:
//! - **Wire protocol**: `PacketHeader`, `Packet`, `EventKind`, `PacketFlags`, `RelayCodec`
//! - **Payloads**: signaling envelopes, tiled frames and input events
//! - **Network**: `RelayConnection` for framed TCP with heartbeat
//! - **Broker**: `RelayBroker` and its `Router`, the host room and viewer fan-out
//! - **Sessions**: `SessionRegistry` over a `Transport` (peer or relayed)
//! - **Tiles**: the tile-delta encoder, cadence loop and compositor
//! - **Viewer**: `ViewerSession` state machine and `ViewerClient` driver
//! - **Host**: `HostAgent`, approval policy and input sink seams
//! - **Error**: `ShareError`, a typed `thiserror` hierarchy with failure classes

pub mod broker;
pub mod code;
pub mod codec;
pub mod error;
pub mod event;
pub mod flags;
pub mod header;
pub mod host;
pub mod media;
pub mod network;
pub mod packet;
pub mod protocol;
pub mod session;
pub mod tiles;
pub mod transport;
pub mod viewer;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use broker::{RelayBroker, Router};
pub use codec::RelayCodec;
pub use error::{ErrorClass, ShareError};
pub use event::EventKind;
pub use flags::PacketFlags;
pub use header::{HEADER_SIZE, PacketHeader};
pub use network::{ConnectionInfo, ConnectionSender, RelayConnection};
pub use packet::{MAX_PAYLOAD_SIZE, Packet};

pub use host::{HostAgent, HostCommand, HostConfig, HostEvent, HostStatus};
pub use media::{FrameSource, RawFrame, ScreenSize};
pub use session::{ConnectionStatus, Session, SessionRegistry, SessionState};
pub use tiles::{TileCompositor, TileConfig, TileEncoder, TileStreamer};
pub use transport::{PeerTransport, RelayedTransport, Transport, TransportKind};
pub use viewer::{JoinRequest, ViewerClient, ViewerEvent, ViewerPhase, ViewerSession};
