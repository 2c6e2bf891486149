pub mod connection;

pub use connection::{ConnectionInfo, ConnectionSender, DEFAULT_HEARTBEAT, RelayConnection};
