//! File-backed session store: the handle lives as raw text in a single file.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

use super::traits::{SessionHandle, SessionStore};

/// Default handle file, relative to the working directory.
pub const DEFAULT_SESSION_FILE: &str = ".codex_thread_id";

pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn parent_dir(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn load(&self) -> Result<Option<SessionHandle>> {
        match fs::read_to_string(&self.path).await {
            Ok(contents) => Ok(SessionHandle::parse(&contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| {
                format!("Failed to read session file: {}", self.path.display())
            }),
        }
    }

    async fn save(&self, handle: &SessionHandle) -> Result<()> {
        let parent_dir = self.parent_dir();
        fs::create_dir_all(parent_dir).await.with_context(|| {
            format!(
                "Failed to create session directory: {}",
                parent_dir.display()
            )
        })?;

        let file_name = self
            .path
            .file_name()
            .and_then(|v| v.to_str())
            .unwrap_or(DEFAULT_SESSION_FILE);
        let temp_path = parent_dir.join(format!(".{file_name}.tmp-{}", uuid::Uuid::new_v4()));

        let mut temp_file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&temp_path)
            .await
            .with_context(|| {
                format!(
                    "Failed to create temporary session file: {}",
                    temp_path.display()
                )
            })?;
        let written = async {
            temp_file.write_all(handle.as_str().as_bytes()).await?;
            temp_file.sync_all().await
        }
        .await;
        drop(temp_file);

        if let Err(e) = written {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e).context("Failed to write temporary session file");
        }

        if let Err(e) = fs::rename(&temp_path, &self.path).await {
            let _ = fs::remove_file(&temp_path).await;
            anyhow::bail!(
                "Failed to replace session file {}: {e}",
                self.path.display()
            );
        }

        tracing::debug!(path = %self.path.display(), "Session handle saved");
        Ok(())
    }

    async fn exists(&self) -> Result<bool> {
        fs::try_exists(&self.path).await.with_context(|| {
            format!("Failed to inspect session file: {}", self.path.display())
        })
    }

    fn name(&self) -> &str {
        "file"
    }
}
