use std::path::PathBuf;

use thiserror::Error;

/// Fatal outcomes of one runner invocation. None of them are retried.
#[derive(Debug, Error)]
pub enum RunError {
    /// Caller-side precondition failed; no remote call was made.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The agent service (or building its client) failed. Carries the
    /// underlying message unchanged.
    #[error("{0}")]
    ExternalService(String),

    #[error("session store error: {0}")]
    SessionStore(String),

    #[error("failed to write output file {path}: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl RunError {
    pub(crate) fn external(err: &anyhow::Error) -> Self {
        Self::ExternalService(format!("{err:#}"))
    }

    pub(crate) fn store(err: &anyhow::Error) -> Self {
        Self::SessionStore(format!("{err:#}"))
    }

    /// Short tag used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::ExternalService(_) => "external_service",
            Self::SessionStore(_) => "session_store",
            Self::Output { .. } => "output",
        }
    }
}
