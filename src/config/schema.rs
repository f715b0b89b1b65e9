use crate::sessions::DEFAULT_SESSION_FILE;
use anyhow::{Context, Result};
use directories::UserDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

const CONFIG_FILE_NAME: &str = "config.toml";

// ── Top-level config ──────────────────────────────────────────────

/// Top-level runner configuration, loaded from `config.toml`.
///
/// Resolution order for the directory: `--config-dir` → `CODEX_RUNNER_CONFIG_DIR` → `~/.codex-runner`.
/// A missing file yields defaults; it is never created on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to config.toml - computed at load time, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,
    /// Credential for the agent service. Overridden by `OPENAI_API_KEY`.
    pub api_key: Option<String>,
    /// Offline mode: skip the service and emit fixed output. Overridden by `CODEX_TEST_MODE`.
    #[serde(default)]
    pub test_mode: bool,

    /// Remote agent service settings (`[service]`).
    #[serde(default)]
    pub service: ServiceConfig,

    /// Session handle persistence (`[sessions]`).
    #[serde(default)]
    pub sessions: SessionsConfig,
}

/// Remote agent service configuration (`[service]` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Service protocol. Default: `"openai-threads"`.
    #[serde(default = "default_service_kind")]
    pub kind: String,
    /// Base URL of the service API. Default: `"https://api.openai.com/v1"`.
    #[serde(default = "default_service_api_url")]
    pub api_url: String,
    /// Assistant that executes runs on the thread.
    pub assistant_id: Option<String>,
    /// Optional model override sent with each run.
    pub model: Option<String>,
    /// Delay between run status polls. Default: `1000`.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Upper bound on the completion wait. Default: unset (wait indefinitely).
    #[serde(default)]
    pub wait_timeout_secs: Option<u64>,
    /// Per-request HTTP timeout. Default: `120`.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_service_kind() -> String {
    "openai-threads".into()
}

fn default_service_api_url() -> String {
    "https://api.openai.com/v1".into()
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_request_timeout_secs() -> u64 {
    120
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            kind: default_service_kind(),
            api_url: default_service_api_url(),
            assistant_id: None,
            model: None,
            poll_interval_ms: default_poll_interval_ms(),
            wait_timeout_secs: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Session handle persistence (`[sessions]` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    /// Storage backend: `"file"` or `"memory"`. Default: `"file"`.
    #[serde(default = "default_sessions_backend")]
    pub backend: String,
    /// Handle file for the file backend; `~` is expanded. Default: `".codex_thread_id"`.
    #[serde(default = "default_sessions_path")]
    pub path: String,
}

fn default_sessions_backend() -> String {
    "file".into()
}

fn default_sessions_path() -> String {
    DEFAULT_SESSION_FILE.into()
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            backend: default_sessions_backend(),
            path: default_sessions_path(),
        }
    }
}

impl SessionsConfig {
    pub fn resolved_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(self.path.trim()).into_owned())
    }
}

// ── Config impl ──────────────────────────────────────────────────

impl Default for Config {
    fn default() -> Self {
        let home =
            UserDirs::new().map_or_else(|| PathBuf::from("."), |u| u.home_dir().to_path_buf());

        Self {
            config_path: home.join(".codex-runner").join(CONFIG_FILE_NAME),
            api_key: None,
            test_mode: false,
            service: ServiceConfig::default(),
            sessions: SessionsConfig::default(),
        }
    }
}

fn default_config_dir() -> Result<PathBuf> {
    let home = UserDirs::new()
        .map(|u| u.home_dir().to_path_buf())
        .context("Could not find home directory")?;
    Ok(home.join(".codex-runner"))
}

fn resolve_config_dir(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(dir) = explicit {
        return Ok(dir.to_path_buf());
    }
    if let Ok(dir) = std::env::var("CODEX_RUNNER_CONFIG_DIR") {
        if !dir.trim().is_empty() {
            return Ok(PathBuf::from(shellexpand::tilde(dir.trim()).into_owned()));
        }
    }
    default_config_dir()
}

/// Accepts `true` or `1`, case-insensitively.
pub fn is_truthy(value: &str) -> bool {
    let value = value.trim();
    value.eq_ignore_ascii_case("true") || value == "1"
}

impl Config {
    /// Load `config.toml` from the resolved config directory, then apply
    /// environment overrides and validate.
    pub async fn load(config_dir: Option<&Path>) -> Result<Self> {
        let config_dir = resolve_config_dir(config_dir)?;
        let config_path = config_dir.join(CONFIG_FILE_NAME);

        let mut config = if config_path.exists() {
            // Warn if config file is world-readable (may contain API keys)
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                if let Ok(meta) = fs::metadata(&config_path).await {
                    if meta.permissions().mode() & 0o004 != 0 {
                        tracing::warn!(
                            "Config file {:?} is world-readable (mode {:o}). \
                             Consider restricting with: chmod 600 {:?}",
                            config_path,
                            meta.permissions().mode() & 0o777,
                            config_path,
                        );
                    }
                }
            }

            let contents = fs::read_to_string(&config_path)
                .await
                .with_context(|| format!("Failed to read config file {}", config_path.display()))?;
            Self::from_toml(&contents)
                .with_context(|| format!("Failed to parse config file {}", config_path.display()))?
        } else {
            Config::default()
        };
        config.config_path = config_path;

        config.apply_env_overrides();
        config.validate()?;
        tracing::debug!(
            path = %config.config_path.display(),
            service = %config.service.kind,
            sessions = %config.sessions.backend,
            test_mode = config.test_mode,
            "Config loaded"
        );
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        Ok(config)
    }

    /// Validate configuration values that would cause runtime failures.
    pub fn validate(&self) -> Result<()> {
        if self.service.kind.trim().is_empty() {
            anyhow::bail!("service.kind must not be empty");
        }
        if self.service.api_url.trim().is_empty() {
            anyhow::bail!("service.api_url must not be empty");
        }
        if self.service.poll_interval_ms == 0 {
            anyhow::bail!("service.poll_interval_ms must be greater than 0");
        }
        if self.service.request_timeout_secs == 0 {
            anyhow::bail!("service.request_timeout_secs must be greater than 0");
        }
        if self.service.wait_timeout_secs == Some(0) {
            anyhow::bail!("service.wait_timeout_secs must be greater than 0 when set");
        }
        match self.sessions.backend.trim() {
            "file" if self.sessions.path.trim().is_empty() => {
                anyhow::bail!("sessions.path must not be empty for the file backend");
            }
            "file" | "memory" => {}
            other => anyhow::bail!(
                "sessions.backend '{other}' is not supported. Supported values: file, memory"
            ),
        }
        Ok(())
    }

    /// Apply environment variable overrides to config
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|name| std::env::var(name).ok());
    }

    /// Apply overrides from an arbitrary variable source. Empty values are ignored.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(key) = get("OPENAI_API_KEY") {
            self.api_key = Some(key.trim().to_string());
        }

        if let Some(flag) = lookup("CODEX_TEST_MODE") {
            self.test_mode = is_truthy(&flag);
        }

        if let Some(url) = get("CODEX_API_URL") {
            self.service.api_url = url.trim().to_string();
        }

        if let Some(assistant) = get("CODEX_ASSISTANT_ID") {
            self.service.assistant_id = Some(assistant.trim().to_string());
        }

        if let Some(model) = get("CODEX_MODEL") {
            self.service.model = Some(model.trim().to_string());
        }

        if let Some(path) = get("CODEX_THREAD_ID_FILE") {
            self.sessions.path = path.trim().to_string();
        }

        if let Some(raw) = get("CODEX_POLL_INTERVAL_MS") {
            match raw.trim().parse::<u64>() {
                Ok(ms) => self.service.poll_interval_ms = ms,
                Err(_) => tracing::warn!(value = %raw, "Ignoring invalid CODEX_POLL_INTERVAL_MS"),
            }
        }

        if let Some(raw) = get("CODEX_WAIT_TIMEOUT_SECS") {
            match raw.trim().parse::<u64>() {
                Ok(secs) => self.service.wait_timeout_secs = Some(secs),
                Err(_) => tracing::warn!(value = %raw, "Ignoring invalid CODEX_WAIT_TIMEOUT_SECS"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn overrides(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    // ── Defaults ─────────────────────────────────────────────

    #[test]
    fn config_default_has_sane_values() {
        let c = Config::default();
        assert!(c.api_key.is_none());
        assert!(!c.test_mode);
        assert_eq!(c.service.kind, "openai-threads");
        assert_eq!(c.service.api_url, "https://api.openai.com/v1");
        assert_eq!(c.service.poll_interval_ms, 1000);
        assert!(c.service.wait_timeout_secs.is_none());
        assert_eq!(c.sessions.backend, "file");
        assert_eq!(c.sessions.path, ".codex_thread_id");
        assert!(c.config_path.to_string_lossy().contains("config.toml"));
        c.validate().unwrap();
    }

    #[test]
    fn empty_toml_uses_defaults() {
        let c = Config::from_toml("").unwrap();
        assert_eq!(c.service.request_timeout_secs, 120);
        assert_eq!(c.sessions.backend, "file");
    }

    #[test]
    fn toml_sections_parse() {
        let c = Config::from_toml(
            r#"
api_key = "sk-test"
test_mode = true

[service]
api_url = "http://localhost:9000/v1"
assistant_id = "asst_123"
model = "gpt-4.1"
poll_interval_ms = 250
wait_timeout_secs = 600

[sessions]
backend = "memory"
"#,
        )
        .unwrap();
        assert_eq!(c.api_key.as_deref(), Some("sk-test"));
        assert!(c.test_mode);
        assert_eq!(c.service.api_url, "http://localhost:9000/v1");
        assert_eq!(c.service.assistant_id.as_deref(), Some("asst_123"));
        assert_eq!(c.service.model.as_deref(), Some("gpt-4.1"));
        assert_eq!(c.service.poll_interval_ms, 250);
        assert_eq!(c.service.wait_timeout_secs, Some(600));
        assert_eq!(c.sessions.backend, "memory");
        assert_eq!(c.sessions.path, ".codex_thread_id");
    }

    #[test]
    fn invalid_toml_is_error() {
        assert!(Config::from_toml("service = 3").is_err());
    }

    // ── Validation ───────────────────────────────────────────

    #[test]
    fn validate_rejects_zero_poll_interval() {
        let mut c = Config::default();
        c.service.poll_interval_ms = 0;
        let err = c.validate().unwrap_err();
        assert!(err.to_string().contains("poll_interval_ms"));
    }

    #[test]
    fn validate_rejects_zero_wait_timeout() {
        let mut c = Config::default();
        c.service.wait_timeout_secs = Some(0);
        assert!(c.validate().is_err());
    }

    #[test]
    fn validate_rejects_unknown_session_backend() {
        let mut c = Config::default();
        c.sessions.backend = "sqlite".into();
        let err = c.validate().unwrap_err();
        assert!(err.to_string().contains("sessions.backend"));
    }

    #[test]
    fn validate_rejects_empty_api_url() {
        let mut c = Config::default();
        c.service.api_url = "  ".into();
        assert!(c.validate().is_err());
    }

    // ── Env overrides ────────────────────────────────────────

    #[test]
    fn overrides_apply_credential_and_service_settings() {
        let mut c = Config::default();
        c.apply_overrides_from(overrides(&[
            ("OPENAI_API_KEY", " sk-env "),
            ("CODEX_API_URL", "http://127.0.0.1:8080/v1"),
            ("CODEX_ASSISTANT_ID", "asst_env"),
            ("CODEX_MODEL", "o4-mini"),
            ("CODEX_THREAD_ID_FILE", "/tmp/thread"),
            ("CODEX_POLL_INTERVAL_MS", "50"),
            ("CODEX_WAIT_TIMEOUT_SECS", "30"),
        ]));
        assert_eq!(c.api_key.as_deref(), Some("sk-env"));
        assert_eq!(c.service.api_url, "http://127.0.0.1:8080/v1");
        assert_eq!(c.service.assistant_id.as_deref(), Some("asst_env"));
        assert_eq!(c.service.model.as_deref(), Some("o4-mini"));
        assert_eq!(c.sessions.path, "/tmp/thread");
        assert_eq!(c.service.poll_interval_ms, 50);
        assert_eq!(c.service.wait_timeout_secs, Some(30));
    }

    #[test]
    fn empty_override_values_are_ignored() {
        let mut c = Config::default();
        c.api_key = Some("from-file".into());
        c.apply_overrides_from(overrides(&[("OPENAI_API_KEY", ""), ("CODEX_MODEL", "  ")]));
        assert_eq!(c.api_key.as_deref(), Some("from-file"));
        assert!(c.service.model.is_none());
    }

    #[test]
    fn invalid_numeric_override_keeps_previous_value() {
        let mut c = Config::default();
        c.apply_overrides_from(overrides(&[("CODEX_POLL_INTERVAL_MS", "fast")]));
        assert_eq!(c.service.poll_interval_ms, 1000);
    }

    #[test]
    fn test_mode_toggle_values() {
        for (raw, expected) in [
            ("true", true),
            ("TRUE", true),
            (" 1 ", true),
            ("false", false),
            ("0", false),
            ("yes", false),
            ("", false),
        ] {
            let mut c = Config::default();
            c.apply_overrides_from(overrides(&[("CODEX_TEST_MODE", raw)]));
            assert_eq!(c.test_mode, expected, "CODEX_TEST_MODE={raw:?}");
        }
    }

    #[test]
    fn sessions_path_expands_tilde() {
        let cfg = SessionsConfig {
            path: "~/thread_id".into(),
            ..SessionsConfig::default()
        };
        let resolved = cfg.resolved_path();
        assert!(!resolved.to_string_lossy().starts_with('~'));
        assert!(resolved.ends_with("thread_id"));
    }

    // ── Loading ──────────────────────────────────────────────

    #[tokio::test]
    async fn load_reads_file_from_explicit_dir() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join("config.toml"),
            "[service]\nassistant_id = \"asst_file\"\n",
        )
        .unwrap();

        let c = Config::load(Some(tmp.path())).await.unwrap();
        assert_eq!(c.config_path, tmp.path().join("config.toml"));
        // CODEX_ASSISTANT_ID may be set in the environment of the test runner
        if std::env::var("CODEX_ASSISTANT_ID").is_err() {
            assert_eq!(c.service.assistant_id.as_deref(), Some("asst_file"));
        }
    }

    #[tokio::test]
    async fn load_missing_file_uses_defaults_without_creating_it() {
        let tmp = TempDir::new().unwrap();
        let c = Config::load(Some(tmp.path())).await.unwrap();
        assert_eq!(c.service.kind, "openai-threads");
        assert!(!tmp.path().join("config.toml").exists());
    }

    #[tokio::test]
    async fn load_reports_parse_errors_with_path() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("config.toml"), "[service\n").unwrap();

        let err = Config::load(Some(tmp.path())).await.unwrap_err();
        assert!(format!("{err:#}").contains("Failed to parse config file"));
    }
}
