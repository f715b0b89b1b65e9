//! Session handle type and the storage seam used to persist it between runs.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier of a conversation thread on the remote agent service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionHandle(String);

impl SessionHandle {
    /// Wrap an identifier issued by the service as-is.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Wrap a raw handle, trimming surrounding whitespace.
    ///
    /// Returns `None` for blank input so callers never carry an empty handle.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Persistent storage for the most recently created session handle.
///
/// Exactly one handle is kept; `save` replaces whatever was stored before.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Read the stored handle, if any.
    async fn load(&self) -> Result<Option<SessionHandle>>;

    /// Replace the stored handle.
    async fn save(&self, handle: &SessionHandle) -> Result<()>;

    /// Whether anything is stored, regardless of whether it reads back as a handle.
    async fn exists(&self) -> Result<bool>;

    /// The name of this session store implementation.
    fn name(&self) -> &str;
}
