//! Relay broker: routes signaling envelopes and relayed frames between
//! one host room and any number of viewers without interpreting them.

pub mod router;
pub mod server;

pub use router::{ConnId, HOST_ROOM, Router, remote_label};
pub use server::{DEFAULT_PORT, RelayBroker};
