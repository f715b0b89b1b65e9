//! In-memory session store implementation.

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;

use super::traits::{SessionHandle, SessionStore};

/// A session store that keeps the handle for the lifetime of the process only.
pub struct InMemorySessionStore {
    handle: Mutex<Option<SessionHandle>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self {
            handle: Mutex::new(None),
        }
    }

    /// Start with a handle already stored.
    pub fn with_handle(handle: SessionHandle) -> Self {
        Self {
            handle: Mutex::new(Some(handle)),
        }
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self) -> Result<Option<SessionHandle>> {
        Ok(self.handle.lock().clone())
    }

    async fn save(&self, handle: &SessionHandle) -> Result<()> {
        *self.handle.lock() = Some(handle.clone());
        Ok(())
    }

    async fn exists(&self) -> Result<bool> {
        Ok(self.handle.lock().is_some())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
