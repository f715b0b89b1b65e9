//! Session handle persistence between invocations.

pub mod file;
pub mod in_memory;
pub mod traits;

pub use file::{FileSessionStore, DEFAULT_SESSION_FILE};
pub use in_memory::InMemorySessionStore;
pub use traits::{SessionHandle, SessionStore};

use crate::config::SessionsConfig;
use std::sync::Arc;

/// Factory: create the session store selected by `[sessions].backend`.
pub fn create_session_store(config: &SessionsConfig) -> anyhow::Result<Arc<dyn SessionStore>> {
    match config.backend.trim() {
        "file" => Ok(Arc::new(FileSessionStore::new(config.resolved_path()))),
        "memory" => Ok(Arc::new(InMemorySessionStore::new())),
        other if other.is_empty() => {
            anyhow::bail!("sessions.backend cannot be empty. Supported values: file, memory")
        }
        other => {
            anyhow::bail!("Unknown session backend '{other}'. Supported values: file, memory")
        }
    }
}
