//! Create-or-resume a session, run one prompt on it, and collect the reply.

use std::sync::Arc;

use super::error::RunError;
use crate::service::AgentService;
use crate::sessions::{SessionHandle, SessionStore};

/// Result of one completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub reply: String,
    /// Always set for live runs. Offline mode leaves it empty when the
    /// stored entry cannot be read back as a handle.
    pub handle: Option<SessionHandle>,
    /// True when the session was created by this run rather than resumed.
    pub created: bool,
}

pub struct SessionOrchestrator {
    service: Arc<dyn AgentService>,
    store: Arc<dyn SessionStore>,
}

impl SessionOrchestrator {
    pub fn new(service: Arc<dyn AgentService>, store: Arc<dyn SessionStore>) -> Self {
        Self { service, store }
    }

    /// Send `prompt` to the session named by `resume`, or to a new session.
    ///
    /// A created handle is saved to the store before the prompt is submitted.
    /// The store is never read here: resumption only follows `resume`.
    pub async fn run(
        &self,
        prompt: &str,
        resume: Option<&SessionHandle>,
    ) -> Result<RunOutcome, RunError> {
        let (handle, created) = self.acquire(resume).await?;

        tracing::info!(
            service = self.service.name(),
            thread = %handle,
            chars = prompt.chars().count(),
            "Running thread with prompt"
        );
        let run = self
            .service
            .submit_and_run(&handle, prompt)
            .await
            .map_err(|e| RunError::external(&e))?;

        self.service
            .await_completion(&handle, &run)
            .await
            .map_err(|e| RunError::external(&e))?;

        tracing::info!(thread = %handle, run = %run, "Thread completed, extracting final message");
        let reply = self
            .service
            .fetch_final_reply(&handle, &run)
            .await
            .map_err(|e| RunError::external(&e))?;

        Ok(RunOutcome {
            reply,
            handle: Some(handle),
            created,
        })
    }

    async fn acquire(
        &self,
        resume: Option<&SessionHandle>,
    ) -> Result<(SessionHandle, bool), RunError> {
        if let Some(handle) = resume {
            tracing::info!(thread = %handle, "Resuming thread");
            self.service
                .resume_session(handle)
                .await
                .map_err(|e| RunError::external(&e))?;
            return Ok((handle.clone(), false));
        }

        tracing::info!(service = self.service.name(), "Starting new thread");
        let handle = self
            .service
            .create_session()
            .await
            .map_err(|e| RunError::external(&e))?;
        self.store
            .save(&handle)
            .await
            .map_err(|e| RunError::store(&e))?;
        tracing::info!(thread = %handle, store = self.store.name(), "Thread id persisted");
        Ok((handle, true))
    }
}
