#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::doc_markdown, clippy::uninlined_format_args)]

use clap::Parser;
use codex_runner::{execute, Config, Invocation};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{fmt, EnvFilter};

/// `codex-runner` - send a prompt to an agent thread and write its reply.
#[derive(Parser, Debug)]
#[command(name = "codex-runner")]
#[command(version)]
#[command(about = "Send a prompt to a remote agent thread and write the reply to a file.")]
#[command(long_about = "\
Send a prompt to a remote agent thread and write the reply to a file.

Without a session handle a new thread is created and its id is saved to \
the session file (default: .codex_thread_id). Pass a handle to continue \
an existing thread; the saved file is never read automatically.

Environment:
  OPENAI_API_KEY      credential for the agent service (required unless in test mode)
  CODEX_ASSISTANT_ID  assistant that executes runs (required unless in test mode,
                      or set service.assistant_id in config.toml)
  CODEX_TEST_MODE     'true' or '1' writes fixed output without any network call
  RUST_LOG            diagnostic log filter (default: info), written to stderr

Examples:
  codex-runner PROMPT.md codex_agent_output.txt
  codex-runner PROMPT.md codex_agent_output.txt \"$(cat .codex_thread_id)\"")]
struct Cli {
    /// Directory holding config.toml (default: ~/.codex-runner)
    #[arg(long)]
    config_dir: Option<PathBuf>,

    /// Path to the prompt file
    prompt_file: PathBuf,

    /// Path the agent reply is written to
    output_file: PathBuf,

    /// Session handle (thread id) to resume
    session_handle: Option<String>,
}

fn init_logging() {
    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Warning: failed to install log subscriber: {e}");
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Usage errors exit with 1 like every other failure; help and version exit 0.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return if err.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    init_logging();

    let config = match Config::load(cli.config_dir.as_deref()).await {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "Invalid configuration");
            eprintln!("Error: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    let invocation = Invocation::new(
        cli.prompt_file,
        cli.output_file,
        cli.session_handle.as_deref(),
    );

    match execute(&config, &invocation).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(kind = e.kind(), error = %e, "Run failed");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
