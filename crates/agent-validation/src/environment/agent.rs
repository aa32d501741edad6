//! Starting and stopping the agent on a standalone host.

use super::CommandExecutor;
use crate::backend::BackendError;
use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Default location the agent reads its configuration from.
pub const DEFAULT_CONFIG_OUTPUT_PATH: &str = "/opt/aws/amazon-cloudwatch-agent/bin/config.json";

/// Default agent control script.
pub const DEFAULT_CTL_PATH: &str =
    "/opt/aws/amazon-cloudwatch-agent/bin/amazon-cloudwatch-agent-ctl";

/// Agent lifecycle errors.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Agent config file error ({path}): {source}")]
    ConfigFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Agent control command failed: {0}")]
    Control(#[from] BackendError),
}

/// Controls the agent process (enables mocking).
#[async_trait]
pub trait AgentController: Send + Sync {
    /// Install the config at `config_path` and start the agent.
    async fn start(&self, config_path: &Path) -> Result<(), AgentError>;

    /// Stop the agent and remove the installed config.
    async fn stop(&self) -> Result<(), AgentError>;
}

/// Drives the agent through its ctl script.
pub struct CtlAgentController {
    ctl_path: PathBuf,
    config_output_path: PathBuf,
    executor: Arc<dyn CommandExecutor>,
}

impl CtlAgentController {
    pub fn new(
        ctl_path: impl Into<PathBuf>,
        config_output_path: impl Into<PathBuf>,
        executor: Arc<dyn CommandExecutor>,
    ) -> Self {
        Self {
            ctl_path: ctl_path.into(),
            config_output_path: config_output_path.into(),
            executor,
        }
    }
}

#[async_trait]
impl AgentController for CtlAgentController {
    async fn start(&self, config_path: &Path) -> Result<(), AgentError> {
        info!(
            target: "agent_validation.agent",
            config = %config_path.display(),
            "Starting agent"
        );

        tokio::fs::copy(config_path, &self.config_output_path)
            .await
            .map_err(|source| AgentError::ConfigFile {
                path: config_path.to_path_buf(),
                source,
            })?;

        let command = format!(
            "sudo {} -a fetch-config -m ec2 -s -c file:{}",
            self.ctl_path.display(),
            self.config_output_path.display()
        );
        self.executor.run(&command).await?;
        Ok(())
    }

    async fn stop(&self) -> Result<(), AgentError> {
        info!(target: "agent_validation.agent", "Stopping agent");

        let command = format!("sudo {} -a stop", self.ctl_path.display());
        self.executor.run(&command).await?;

        match tokio::fs::remove_file(&self.config_output_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(AgentError::ConfigFile {
                path: self.config_output_path.clone(),
                source,
            }),
        }
    }
}
