//! Shell command execution for setup hooks and environment queries.

use crate::backend::BackendError;
use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

/// Maximum length of captured stderr kept in error messages.
const MAX_STDERR_LEN: usize = 256;

/// Runs shell commands (enables mocking).
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Run `command` through the shell and return its stdout.
    async fn run(&self, command: &str) -> Result<String, BackendError>;
}

/// Executes commands with `sh -c` on the local host.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellExecutor;

#[async_trait]
impl CommandExecutor for ShellExecutor {
    async fn run(&self, command: &str) -> Result<String, BackendError> {
        debug!(target: "agent_validation.command", command = %command, "Running command");

        let output = Command::new("sh")
            .arg("-c")
            .arg(command)
            .output()
            .await
            .map_err(|e| BackendError::CommandFailed {
                command: command.to_string(),
                message: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr: String = stderr.chars().take(MAX_STDERR_LEN).collect();
            return Err(BackendError::CommandFailed {
                command: command.to_string(),
                message: format!("{}: {}", output.status, stderr.trim()),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Run commands in order, stopping at the first failure.
pub async fn run_commands(
    executor: &dyn CommandExecutor,
    commands: &[String],
) -> Result<(), BackendError> {
    for command in commands {
        info!(target: "agent_validation.command", command = %command, "Running setup command");
        executor.run(command).await?;
    }
    Ok(())
}
