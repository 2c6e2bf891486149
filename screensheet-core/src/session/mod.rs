//! # Host-side sessions
//!
//! | Module     | Purpose                                         |
//! |------------|-------------------------------------------------|
//! | `state`    | `Session` record and lifecycle transitions      |
//! | `events`   | Per-session event channel, status de-duplication |
//! | `registry` | Pending/connected collections, audio toggles    |

pub mod events;
pub mod registry;
pub mod state;

pub use events::{SessionEvent, SessionEventReceiver, SessionEvents};
pub use registry::{AudioChange, ConfirmationToken, Drained, SessionInfo, SessionRegistry};
pub use state::{ConnectionStatus, Session, SessionId, SessionState, StatusFilter};
