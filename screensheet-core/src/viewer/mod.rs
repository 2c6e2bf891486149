//! # Viewer
//!
//! | Module    | Purpose                                              |
//! |-----------|------------------------------------------------------|
//! | `session` | Sans-IO state machine: request, offer, input, leave  |
//! | `client`  | Async driver over a relay connection                 |
//! | `scaling` | Client-to-source pointer mapping                     |

pub mod client;
pub mod scaling;
pub mod session;

pub use client::{ViewerClient, ViewerCommand, ViewerStats};
pub use scaling::SurfaceRect;
pub use session::{JoinRequest, ViewerEvent, ViewerPhase, ViewerSession};
