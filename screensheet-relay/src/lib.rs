//! # screensheet-relay
//!
//! Standalone relay broker. Hosts register into the host room, viewers
//! connect and are routed to it; the broker never inspects what it
//! forwards beyond the routing fields.

pub mod config;
pub mod service;
