//! Session orchestration: acquire a session, run one prompt, persist results.

pub mod error;
pub mod invocation;
pub mod offline;
pub mod orchestrator;

#[cfg(test)]
pub(crate) mod testing;

pub use error::RunError;
pub use invocation::{execute, execute_with, Invocation, Mode, RunReport};
pub use offline::{run_offline, OFFLINE_HANDLE, OFFLINE_REPLY};
pub use orchestrator::{RunOutcome, SessionOrchestrator};
