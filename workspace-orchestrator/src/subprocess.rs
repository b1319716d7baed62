//! A timeout-wrapped `tokio::process::Command` runner.
//!
//! No crate in this lineage's stack owns "run a command with a deadline" as
//! a standalone concern, so it is built directly on `tokio::time::timeout`.
//! Used by both the workspace manager (git plumbing) and the agent runner
//! (worker subprocesses).

use std::process::Output;
use std::time::Duration;

use orchestrator_core::error::{OrchestratorError, Result};
use tokio::process::Command;

/// Default ceiling for git worktree operations.
pub const GIT_WORKTREE_TIMEOUT: Duration = Duration::from_secs(30);

/// Runs `cmd`, killing it and returning `OrchestratorError::Subprocess` if it
/// has not exited within `timeout`. `label` is folded into the error message
/// for diagnostics; it is not the binary name (which may differ from argv[0]
/// once git subcommands or wrapper scripts are involved).
pub async fn run_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    label: &str,
) -> Result<Output> {
    match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(e)) => Err(OrchestratorError::Subprocess(format!(
            "{label} failed to start: {e}"
        ))),
        Err(_) => Err(OrchestratorError::Subprocess(format!(
            "{label} timed out after {:?}",
            timeout
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn completes_within_timeout() {
        let mut cmd = Command::new("true");
        cmd.kill_on_drop(true);
        let output = run_with_timeout(cmd, Duration::from_secs(5), "true").await;
        assert!(output.unwrap().status.success());
    }

    #[tokio::test]
    async fn times_out_on_slow_command() {
        let mut cmd = Command::new("sleep");
        cmd.arg("5");
        cmd.kill_on_drop(true);
        let result = run_with_timeout(cmd, Duration::from_millis(50), "sleep").await;
        assert!(matches!(result, Err(OrchestratorError::Subprocess(_))));
    }

    #[tokio::test]
    async fn missing_binary_surfaces_subprocess_error() {
        let cmd = Command::new("definitely-not-a-real-binary-xyz");
        let result = run_with_timeout(cmd, Duration::from_secs(5), "missing").await;
        assert!(matches!(result, Err(OrchestratorError::Subprocess(_))));
    }
}
