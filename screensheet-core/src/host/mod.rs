//! # Host agent
//!
//! | Module   | Purpose                                               |
//! |----------|-------------------------------------------------------|
//! | `agent`  | Relay registration, request screening, session driver |
//! | `policy` | Approval and input-injection seams                    |
//! | `config` | `HostConfig` TOML settings                            |

pub mod agent;
pub mod config;
pub mod policy;

pub use agent::{HostAgent, HostCommand, HostEvent, HostParts, HostStatus};
pub use config::{HostConfig, NegotiationSettings, RelaySettings, SharingSettings};
pub use policy::{
    ApprovalPolicy, AutoApprove, InputSink, JoinAttempt, NullInput, PromptPolicy, Review,
    StaticCredentials,
};
