//! Host-side collaborators: who may join, and where input goes.

use crate::protocol::input::InputEvent;

/// What to do with a request that carried a valid connection code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Review {
    Approve,
    Decline,
    /// Ask the local user; the agent waits for a `HostCommand`.
    Prompt,
}

/// A viewer request as presented for review.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinAttempt {
    pub session_id: String,
    pub remote_label: Option<String>,
}

pub trait ApprovalPolicy: Send + Sync {
    /// Check unattended-access credentials. A match is approved without
    /// review.
    fn authenticate(&self, _username: &str, _password: &str) -> bool {
        false
    }

    fn review(&self, _attempt: &JoinAttempt) -> Review {
        Review::Prompt
    }
}

/// Every coded request is surfaced to the local user.
#[derive(Debug, Default, Clone, Copy)]
pub struct PromptPolicy;

impl ApprovalPolicy for PromptPolicy {}

/// Every coded request is accepted.
#[derive(Debug, Default, Clone, Copy)]
pub struct AutoApprove;

impl ApprovalPolicy for AutoApprove {
    fn review(&self, _attempt: &JoinAttempt) -> Review {
        Review::Approve
    }
}

/// Unattended access with a single fixed account.
#[derive(Debug, Clone)]
pub struct StaticCredentials {
    username: String,
    digest: blake3::Hash,
}

impl StaticCredentials {
    pub fn new(username: impl Into<String>, password: &str) -> Self {
        Self {
            username: username.into(),
            digest: blake3::hash(password.as_bytes()),
        }
    }
}

impl ApprovalPolicy for StaticCredentials {
    fn authenticate(&self, username: &str, password: &str) -> bool {
        // blake3::Hash equality is constant-time.
        username == self.username && blake3::hash(password.as_bytes()) == self.digest
    }
}

/// Receives remote-control input for the local machine.
pub trait InputSink: Send + Sync {
    fn inject(&self, session_id: &str, event: &InputEvent);
}

/// Drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullInput;

impl InputSink for NullInput {
    fn inject(&self, _session_id: &str, _event: &InputEvent) {}
}
