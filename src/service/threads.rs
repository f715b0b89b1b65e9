//! Thread/run agent service over the OpenAI-style Assistants v2 REST API.
//!
//! A session handle is a thread id. One prompt becomes a user message on the
//! thread followed by a run; the run is polled until it reaches a terminal
//! status, and the reply is the newest assistant message written by that run.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Method, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::api_error;
use super::traits::{AgentService, RunId};
use crate::config::Config;
use crate::sessions::SessionHandle;

const SERVICE_NAME: &str = "openai-threads";
const BETA_HEADER: &str = "OpenAI-Beta";
const BETA_VALUE: &str = "assistants=v2";
const MESSAGE_PAGE_LIMIT: &str = "20";

pub struct ThreadsService {
    base_url: Url,
    api_key: String,
    assistant_id: String,
    model: Option<String>,
    poll_interval: Duration,
    wait_timeout: Option<Duration>,
    client: Client,
}

impl ThreadsService {
    pub fn new(base_url: &str, api_key: &str, assistant_id: &str) -> Result<Self> {
        let trimmed = base_url.trim().trim_end_matches('/');
        let base_url = Url::parse(trimmed)
            .with_context(|| format!("Invalid service base URL: {trimmed}"))?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("Service base URL cannot carry a path: {trimmed}");
        }

        Ok(Self {
            base_url,
            api_key: api_key.to_string(),
            assistant_id: assistant_id.to_string(),
            model: None,
            poll_interval: Duration::from_secs(1),
            wait_timeout: None,
            client: Client::builder()
                .timeout(Duration::from_secs(120))
                .connect_timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| Client::new()),
        })
    }

    /// Build from config; fails when the credential or assistant is missing.
    pub fn from_config(config: &Config) -> Result<Self> {
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .context("OPENAI_API_KEY is not set (export it or set api_key in config.toml)")?;
        let assistant_id = config
            .service
            .assistant_id
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .context(
                "No assistant configured (set CODEX_ASSISTANT_ID or service.assistant_id)",
            )?;

        let mut service = Self::new(&config.service.api_url, api_key, assistant_id)?
            .with_poll_interval(Duration::from_millis(config.service.poll_interval_ms))
            .with_wait_timeout(config.service.wait_timeout_secs.map(Duration::from_secs));
        service.model = config.service.model.clone();
        service.client = Client::builder()
            .timeout(Duration::from_secs(config.service.request_timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(service)
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_wait_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.wait_timeout = timeout;
        self
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| anyhow::anyhow!("Service base URL cannot carry a path: {}", self.base_url))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .bearer_auth(&self.api_key)
            .header(BETA_HEADER, BETA_VALUE)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        action: &str,
    ) -> Result<T> {
        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to {action}"))?;

        if !response.status().is_success() {
            return Err(api_error(SERVICE_NAME, response)
                .await
                .context(format!("Failed to {action}")));
        }

        response
            .json::<T>()
            .await
            .with_context(|| format!("Failed to decode response to {action}"))
    }

    async fn get_run(&self, handle: &SessionHandle, run: &RunId) -> Result<RunObject> {
        let url = self.endpoint(&["threads", handle.as_str(), "runs", run.as_str()])?;
        self.send_json(self.request(Method::GET, url), "fetch run status")
            .await
    }

    async fn poll_until_terminal(&self, handle: &SessionHandle, run: &RunId) -> Result<()> {
        loop {
            let current = self.get_run(handle, run).await?;
            match current.status {
                RunStatus::Completed => return Ok(()),
                RunStatus::Queued | RunStatus::InProgress | RunStatus::Cancelling => {
                    tracing::debug!(
                        thread = %handle,
                        run = %run,
                        status = current.status.as_str(),
                        "Run still active"
                    );
                    tokio::time::sleep(self.poll_interval).await;
                }
                status => anyhow::bail!("{}", describe_run_failure(run, status, current.last_error)),
            }
        }
    }
}

fn describe_run_failure(run: &RunId, status: RunStatus, last_error: Option<ApiRunError>) -> String {
    let detail = last_error.and_then(|e| match (e.code, e.message) {
        (Some(code), Some(message)) => Some(format!("{code}: {message}")),
        (None, Some(message)) => Some(message),
        (Some(code), None) => Some(code),
        (None, None) => None,
    });
    match detail {
        Some(detail) => format!("Run {run} ended with status {}: {detail}", status.as_str()),
        None => format!("Run {run} ended with status {}", status.as_str()),
    }
}

#[derive(Debug, Serialize)]
struct CreateThreadRequest {}

#[derive(Debug, Deserialize)]
struct ThreadObject {
    id: String,
}

#[derive(Debug, Serialize)]
struct CreateMessageRequest<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct CreateRunRequest<'a> {
    assistant_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct RunObject {
    id: String,
    status: RunStatus,
    #[serde(default)]
    last_error: Option<ApiRunError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum RunStatus {
    Queued,
    InProgress,
    RequiresAction,
    Cancelling,
    Cancelled,
    Failed,
    Completed,
    Incomplete,
    Expired,
    #[serde(other)]
    Unknown,
}

impl RunStatus {
    fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::InProgress => "in_progress",
            Self::RequiresAction => "requires_action",
            Self::Cancelling => "cancelling",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
            Self::Completed => "completed",
            Self::Incomplete => "incomplete",
            Self::Expired => "expired",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiRunError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageList {
    data: Vec<ThreadMessage>,
}

#[derive(Debug, Deserialize)]
struct ThreadMessage {
    role: String,
    #[serde(default)]
    run_id: Option<String>,
    #[serde(default)]
    content: Vec<MessageContent>,
}

#[derive(Debug, Deserialize)]
struct MessageContent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<TextContent>,
}

#[derive(Debug, Deserialize)]
struct TextContent {
    value: String,
}

/// Newest assistant message of `run`, text parts joined by newlines.
///
/// `messages` must be ordered newest first.
fn extract_reply(messages: &[ThreadMessage], run: &RunId) -> Option<String> {
    let message = messages.iter().find(|m| {
        m.role == "assistant" && m.run_id.as_deref().map_or(true, |id| id == run.as_str())
    })?;

    let text = message
        .content
        .iter()
        .filter(|part| part.kind == "text")
        .filter_map(|part| part.text.as_ref())
        .map(|t| t.value.as_str())
        .filter(|v| !v.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

#[async_trait]
impl AgentService for ThreadsService {
    async fn create_session(&self) -> Result<SessionHandle> {
        let url = self.endpoint(&["threads"])?;
        let thread: ThreadObject = self
            .send_json(
                self.request(Method::POST, url).json(&CreateThreadRequest {}),
                "create thread",
            )
            .await?;
        SessionHandle::parse(&thread.id).context("Service returned an empty thread id")
    }

    async fn resume_session(&self, handle: &SessionHandle) -> Result<()> {
        let url = self.endpoint(&["threads", handle.as_str()])?;
        let thread: ThreadObject = self
            .send_json(self.request(Method::GET, url), "resume thread")
            .await
            .with_context(|| format!("Cannot resume thread {handle}"))?;
        if thread.id != handle.as_str() {
            anyhow::bail!(
                "Service resumed thread {} when {handle} was requested",
                thread.id
            );
        }
        Ok(())
    }

    async fn submit_and_run(&self, handle: &SessionHandle, message: &str) -> Result<RunId> {
        let url = self.endpoint(&["threads", handle.as_str(), "messages"])?;
        let _: serde_json::Value = self
            .send_json(
                self.request(Method::POST, url).json(&CreateMessageRequest {
                    role: "user",
                    content: message,
                }),
                "post message",
            )
            .await?;

        let url = self.endpoint(&["threads", handle.as_str(), "runs"])?;
        let run: RunObject = self
            .send_json(
                self.request(Method::POST, url).json(&CreateRunRequest {
                    assistant_id: &self.assistant_id,
                    model: self.model.as_deref(),
                }),
                "start run",
            )
            .await?;

        tracing::debug!(thread = %handle, run = %run.id, status = run.status.as_str(), "Run started");
        Ok(RunId::new(run.id))
    }

    async fn await_completion(&self, handle: &SessionHandle, run: &RunId) -> Result<()> {
        match self.wait_timeout {
            Some(limit) => tokio::time::timeout(limit, self.poll_until_terminal(handle, run))
                .await
                .map_err(|_| {
                    anyhow::anyhow!(
                        "Run {run} did not finish within {}s",
                        limit.as_secs_f64()
                    )
                })?,
            None => self.poll_until_terminal(handle, run).await,
        }
    }

    async fn fetch_final_reply(&self, handle: &SessionHandle, run: &RunId) -> Result<String> {
        let mut url = self.endpoint(&["threads", handle.as_str(), "messages"])?;
        url.query_pairs_mut()
            .append_pair("run_id", run.as_str())
            .append_pair("order", "desc")
            .append_pair("limit", MESSAGE_PAGE_LIMIT);

        let list: MessageList = self
            .send_json(self.request(Method::GET, url), "list messages")
            .await?;

        extract_reply(&list.data, run)
            .with_context(|| format!("Run {run} produced no assistant reply"))
    }

    fn name(&self) -> &str {
        SERVICE_NAME
    }
}
