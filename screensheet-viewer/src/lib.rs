//! # screensheet-viewer
//!
//! Headless viewer. Joins a host through the relay with a connection
//! code or unattended-access credentials, rebuilds the relayed surface
//! and writes it out as PNG snapshots.
//!
//! Peer sessions need the `webrtc` feature; without it the viewer
//! declines peer offers and only relayed hosts can be watched.

pub mod config;
pub mod service;
pub mod snapshot;
