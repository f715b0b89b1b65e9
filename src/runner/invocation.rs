//! One command-line invocation: read the prompt, get a reply, write it out.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::error::RunError;
use super::offline::run_offline;
use super::orchestrator::{RunOutcome, SessionOrchestrator};
use crate::config::Config;
use crate::service::{create_service, AgentService};
use crate::sessions::{create_session_store, SessionHandle, SessionStore};

/// Arguments of a single run.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub prompt_path: PathBuf,
    pub output_path: PathBuf,
    pub resume: Option<SessionHandle>,
}

impl Invocation {
    /// A blank resume argument counts as absent; any other value is used verbatim.
    pub fn new(prompt_path: PathBuf, output_path: PathBuf, resume: Option<&str>) -> Self {
        Self {
            prompt_path,
            output_path,
            resume: resume
                .filter(|raw| !raw.trim().is_empty())
                .map(SessionHandle::new),
        }
    }
}

/// How the reply is obtained.
pub enum Mode {
    Offline,
    Live(Arc<dyn AgentService>),
}

/// Summary of a successful invocation.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub handle: Option<SessionHandle>,
    pub created: bool,
    pub offline: bool,
    pub output_path: PathBuf,
}

/// Run the invocation with the store and service described by `config`.
pub async fn execute(config: &Config, invocation: &Invocation) -> Result<RunReport, RunError> {
    let prompt = read_prompt(&invocation.prompt_path).await?;
    let store = create_session_store(&config.sessions).map_err(|e| RunError::store(&e))?;
    let mode = if config.test_mode {
        Mode::Offline
    } else {
        Mode::Live(create_service(config).map_err(|e| RunError::external(&e))?)
    };
    complete(invocation, &prompt, store, mode).await
}

/// Run the invocation with explicitly supplied collaborators.
pub async fn execute_with(
    invocation: &Invocation,
    store: Arc<dyn SessionStore>,
    mode: Mode,
) -> Result<RunReport, RunError> {
    let prompt = read_prompt(&invocation.prompt_path).await?;
    complete(invocation, &prompt, store, mode).await
}

async fn complete(
    invocation: &Invocation,
    prompt: &str,
    store: Arc<dyn SessionStore>,
    mode: Mode,
) -> Result<RunReport, RunError> {
    let (outcome, offline): (RunOutcome, bool) = match mode {
        Mode::Offline => (run_offline(store.as_ref()).await?, true),
        Mode::Live(service) => (
            SessionOrchestrator::new(service, store)
                .run(prompt, invocation.resume.as_ref())
                .await?,
            false,
        ),
    };

    write_reply(&invocation.output_path, &outcome.reply).await?;
    tracing::info!(path = %invocation.output_path.display(), "Output written");
    if let Some(handle) = &outcome.handle {
        tracing::info!(thread = %handle, created = outcome.created, "Thread ID");
    }

    Ok(RunReport {
        handle: outcome.handle,
        created: outcome.created,
        offline,
        output_path: invocation.output_path.clone(),
    })
}

/// Invalid UTF-8 is replaced rather than rejected; only I/O failures are errors.
async fn read_prompt(path: &Path) -> Result<String, RunError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        RunError::InvalidInput(format!("cannot read prompt file {}: {e}", path.display()))
    })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Overwrite `path` with the reply, newline-terminated.
async fn write_reply(path: &Path, reply: &str) -> Result<(), RunError> {
    let mut contents = String::with_capacity(reply.len() + 1);
    contents.push_str(reply);
    if !contents.ends_with('\n') {
        contents.push('\n');
    }
    tokio::fs::write(path, contents)
        .await
        .map_err(|source| RunError::Output {
            path: path.to_path_buf(),
            source,
        })
}
