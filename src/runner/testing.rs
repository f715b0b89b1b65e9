//! Scripted agent service and store doubles shared by runner tests.

use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use parking_lot::Mutex;

use crate::service::{AgentService, RunId};
use crate::sessions::{SessionHandle, SessionStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Create,
    Resume,
    Submit,
    Await,
    Fetch,
}

/// Records every call and answers `reply to: <prompt>`.
pub struct FakeService {
    new_handle: String,
    fail_at: Option<Step>,
    observed_store: Option<Arc<dyn SessionStore>>,
    calls: Mutex<Vec<String>>,
    messages: Mutex<Vec<String>>,
    stored_at_submit: Mutex<Option<Option<SessionHandle>>>,
}

impl FakeService {
    pub fn new(new_handle: &str) -> Self {
        Self {
            new_handle: new_handle.to_string(),
            fail_at: None,
            observed_store: None,
            calls: Mutex::new(Vec::new()),
            messages: Mutex::new(Vec::new()),
            stored_at_submit: Mutex::new(None),
        }
    }

    pub fn failing_at(mut self, step: Step) -> Self {
        self.fail_at = Some(step);
        self
    }

    /// Snapshot `store` when a prompt is submitted.
    pub fn observing(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.observed_store = Some(store);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }

    pub fn stored_at_submit(&self) -> Option<Option<SessionHandle>> {
        self.stored_at_submit.lock().clone()
    }

    fn record(&self, call: String, step: Step) -> Result<()> {
        self.calls.lock().push(call);
        if self.fail_at == Some(step) {
            let label = match step {
                Step::Create => "create",
                Step::Resume => "resume",
                Step::Submit => "submit",
                Step::Await => "await",
                Step::Fetch => "fetch",
            };
            bail!("{label} failed");
        }
        Ok(())
    }
}

#[async_trait]
impl AgentService for FakeService {
    async fn create_session(&self) -> Result<SessionHandle> {
        self.record("create".to_string(), Step::Create)?;
        Ok(SessionHandle::new(self.new_handle.clone()))
    }

    async fn resume_session(&self, handle: &SessionHandle) -> Result<()> {
        self.record(format!("resume:{handle}"), Step::Resume)
    }

    async fn submit_and_run(&self, handle: &SessionHandle, message: &str) -> Result<RunId> {
        if let Some(store) = &self.observed_store {
            let snapshot = store.load().await?;
            *self.stored_at_submit.lock() = Some(snapshot);
        }
        self.messages.lock().push(message.to_string());
        self.record(format!("submit:{handle}"), Step::Submit)?;
        Ok(RunId::new("run_1"))
    }

    async fn await_completion(&self, handle: &SessionHandle, run: &RunId) -> Result<()> {
        self.record(format!("await:{handle}:{run}"), Step::Await)
    }

    async fn fetch_final_reply(&self, handle: &SessionHandle, run: &RunId) -> Result<String> {
        self.record(format!("fetch:{handle}:{run}"), Step::Fetch)?;
        let last = self.messages.lock().last().cloned().unwrap_or_default();
        Ok(format!("reply to: {last}"))
    }

    fn name(&self) -> &str {
        "fake"
    }
}

/// A store whose every operation fails.
pub struct FailingStore;

#[async_trait]
impl SessionStore for FailingStore {
    async fn load(&self) -> Result<Option<SessionHandle>> {
        bail!("disk unavailable")
    }

    async fn save(&self, _handle: &SessionHandle) -> Result<()> {
        bail!("disk unavailable")
    }

    async fn exists(&self) -> Result<bool> {
        bail!("disk unavailable")
    }

    fn name(&self) -> &str {
        "failing"
    }
}
