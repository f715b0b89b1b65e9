//! Remote agent service backends.
//!
//! Each backend implements [`AgentService`] and is registered in
//! [`create_service`] under its `service.kind` key.

pub mod threads;
pub mod traits;

pub use threads::ThreadsService;
pub use traits::{AgentService, RunId};

use crate::config::Config;
use std::sync::Arc;

const MAX_API_ERROR_CHARS: usize = 200;

const SECRET_PREFIXES: [&str; 5] = ["sk-", "sess-", "ghp_", "gho_", "github_pat_"];

fn is_secret_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':')
}

/// Replace tokens that start with a known credential prefix by `[REDACTED]`.
pub fn scrub_secret_patterns(input: &str) -> String {
    let mut scrubbed = input.to_string();

    for prefix in SECRET_PREFIXES {
        let mut search_from = 0;
        while let Some(rel) = scrubbed[search_from..].find(prefix) {
            let start = search_from + rel;
            let content_start = start + prefix.len();
            let content_len: usize = scrubbed[content_start..]
                .chars()
                .take_while(|c| is_secret_char(*c))
                .map(char::len_utf8)
                .sum();

            if content_len == 0 {
                search_from = content_start;
                continue;
            }

            scrubbed.replace_range(start..content_start + content_len, "[REDACTED]");
            search_from = start + "[REDACTED]".len();
        }
    }

    scrubbed
}

/// Scrub secrets from an error body and cap its length.
pub fn sanitize_api_error(input: &str) -> String {
    let scrubbed = scrub_secret_patterns(input.trim());

    if scrubbed.chars().count() <= MAX_API_ERROR_CHARS {
        return scrubbed;
    }

    let end = scrubbed
        .char_indices()
        .nth(MAX_API_ERROR_CHARS)
        .map_or(scrubbed.len(), |(i, _)| i);
    format!("{}...", &scrubbed[..end])
}

/// Build a sanitized service error from a failed HTTP response.
pub async fn api_error(service: &str, response: reqwest::Response) -> anyhow::Error {
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<failed to read service error body>".to_string());
    anyhow::anyhow!("{service} API error ({status}): {}", sanitize_api_error(&body))
}

/// Factory: build the agent service selected by `service.kind`.
///
/// Client construction errors (missing credential, bad base URL) surface here,
/// before any request is made.
pub fn create_service(config: &Config) -> anyhow::Result<Arc<dyn AgentService>> {
    match config.service.kind.trim() {
        "openai-threads" | "threads" => {
            Ok(Arc::new(ThreadsService::from_config(config)?))
        }
        other => anyhow::bail!("Unknown service kind '{other}'. Supported values: openai-threads"),
    }
}
