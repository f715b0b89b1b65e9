//! Deterministic network-free mode used to exercise surrounding automation.

use super::error::RunError;
use super::orchestrator::RunOutcome;
use crate::sessions::{SessionHandle, SessionStore};

/// Reply written in offline mode.
pub const OFFLINE_REPLY: &str = "Test output from Codex SDK runner";

/// Handle stored in offline mode when no handle file exists yet.
pub const OFFLINE_HANDLE: &str = "test-thread-123";

/// Produce the fixed reply without touching the agent service.
///
/// The fixed handle is stored only if the store holds nothing at all. An
/// existing entry is never rewritten, even when it is blank or unreadable.
pub async fn run_offline(store: &dyn SessionStore) -> Result<RunOutcome, RunError> {
    tracing::info!(mode = "offline", "Emitting test output");

    let (handle, created) = if store.exists().await.map_err(|e| RunError::store(&e))? {
        match store.load().await {
            Ok(Some(existing)) => (Some(existing), false),
            Ok(None) => {
                tracing::warn!(
                    store = store.name(),
                    "Stored session handle is blank; leaving it as is"
                );
                (None, false)
            }
            Err(e) => {
                tracing::warn!(
                    store = store.name(),
                    error = %format!("{e:#}"),
                    "Stored session handle is unreadable; leaving it as is"
                );
                (None, false)
            }
        }
    } else {
        let fixed = SessionHandle::new(OFFLINE_HANDLE);
        store.save(&fixed).await.map_err(|e| RunError::store(&e))?;
        (Some(fixed), true)
    };

    Ok(RunOutcome {
        reply: OFFLINE_REPLY.to_string(),
        handle,
        created,
    })
}
