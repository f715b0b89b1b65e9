//! Capability surface of the remote agent service.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::sessions::SessionHandle;

/// Identifier of one submitted run on a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A remote conversational agent that keeps per-session context.
///
/// Implementations own the wire protocol. Every failure (transport, auth,
/// unknown session, failed run) is reported as an error; callers do not retry.
#[async_trait]
pub trait AgentService: Send + Sync {
    /// Open a new session and return its handle.
    async fn create_session(&self) -> Result<SessionHandle>;

    /// Confirm that `handle` refers to a session the service will continue.
    async fn resume_session(&self, handle: &SessionHandle) -> Result<()>;

    /// Post one user message to the session and start a run over it.
    async fn submit_and_run(&self, handle: &SessionHandle, message: &str) -> Result<RunId>;

    /// Suspend until the run reaches a terminal state; error unless it completed.
    async fn await_completion(&self, handle: &SessionHandle, run: &RunId) -> Result<()>;

    /// Text of the final assistant reply produced by a completed run.
    async fn fetch_final_reply(&self, handle: &SessionHandle, run: &RunId) -> Result<String>;

    fn name(&self) -> &str;
}
