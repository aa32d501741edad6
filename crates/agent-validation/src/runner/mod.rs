//! Test runners and the agent lifecycles that wrap them.
//!
//! A [`TestRunner`] knows what to validate. [`Ec2Runner`] and [`EksRunner`]
//! know how to get the agent running first: on a standalone host the
//! harness installs a config and starts the agent itself, while on a
//! cluster the agent is already deployed and the harness only waits.

pub mod ec2;
pub mod eks;
pub mod measured_metrics;
pub mod schema_metrics;

pub use ec2::Ec2Runner;
pub use eks::EksRunner;
pub use measured_metrics::MeasuredMetricsRunner;
pub use schema_metrics::{PerformanceLogCheck, SchemaMetricsRunner, EMF_LOGS_RESULT};

use crate::backend::BackendError;
use crate::context::ValidationContext;
use crate::environment::{AgentController, AgentError};
use crate::status::{TestGroupResult, TestResult};
use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Result reported in place of validation when the agent lifecycle fails.
pub const LIFECYCLE_FAILURE_RESULT: &str = "Starting Agent";

/// Default time the agent runs before validation.
pub const DEFAULT_AGENT_RUN_DURATION: Duration = Duration::from_secs(60);

/// Errors raised while preparing or running the agent.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("Setup failed: {0}")]
    Setup(#[from] BackendError),

    #[error("Agent lifecycle failed: {0}")]
    Agent(#[from] AgentError),

    #[error("Failed to load agent config {path}: {message}")]
    AgentConfig { path: PathBuf, message: String },

    #[error("Runner {0} has no agent config file")]
    MissingAgentConfig(String),
}

/// An agent config file loaded from the config directory.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentConfig {
    pub config_file_name: String,
    pub contents: Value,
}

impl AgentConfig {
    /// Read and parse `config_dir/file_name`.
    pub async fn load(config_dir: &Path, file_name: &str) -> Result<Self, RunnerError> {
        let path = config_dir.join(file_name);
        let raw = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| RunnerError::AgentConfig {
                path: path.clone(),
                message: e.to_string(),
            })?;
        let contents = serde_json::from_str(&raw).map_err(|e| RunnerError::AgentConfig {
            path,
            message: e.to_string(),
        })?;

        Ok(Self {
            config_file_name: file_name.to_string(),
            contents,
        })
    }
}

/// One named group of checks against telemetry the agent produced.
#[async_trait]
pub trait TestRunner: Send + Sync {
    /// Name of the result group.
    fn test_name(&self) -> &str;

    /// Agent config file, relative to the config directory.
    fn agent_config_file_name(&self) -> Option<&str>;

    /// How long the agent runs before validation.
    fn agent_run_duration(&self) -> Duration {
        DEFAULT_AGENT_RUN_DURATION
    }

    /// Metric names this runner checks.
    fn measured_metrics(&self) -> Vec<String>;

    async fn validate(&self, ctx: &mut ValidationContext) -> TestGroupResult;

    async fn setup_before_agent_run(&self, _ctx: &ValidationContext) -> Result<(), RunnerError> {
        Ok(())
    }

    async fn setup_after_agent_run(&self, _ctx: &ValidationContext) -> Result<(), RunnerError> {
        Ok(())
    }

    /// Receive the agent config the cluster was deployed with.
    fn set_agent_config(&mut self, _config: AgentConfig) {}
}

/// Group reported when the agent could not be brought up.
pub(crate) fn lifecycle_failure(test_name: &str) -> TestGroupResult {
    TestGroupResult::new(test_name, vec![TestResult::failed(LIFECYCLE_FAILURE_RESULT)])
}

/// A runner bound to the lifecycle of its compute type.
pub enum EnvironmentRunner {
    Ec2(Ec2Runner),
    Eks(EksRunner),
}

impl EnvironmentRunner {
    pub fn test_name(&self) -> &str {
        match self {
            EnvironmentRunner::Ec2(runner) => runner.test_name(),
            EnvironmentRunner::Eks(runner) => runner.test_name(),
        }
    }

    /// Bring the agent up, wait, and validate.
    ///
    /// `agent` is only used by standalone-host runners.
    pub async fn run(
        &mut self,
        ctx: &mut ValidationContext,
        agent: &dyn AgentController,
        config_dir: &Path,
    ) -> TestGroupResult {
        match self {
            EnvironmentRunner::Ec2(runner) => runner.run(ctx, agent, config_dir).await,
            EnvironmentRunner::Eks(runner) => runner.run(ctx, config_dir).await,
        }
    }
}

impl From<Ec2Runner> for EnvironmentRunner {
    fn from(runner: Ec2Runner) -> Self {
        EnvironmentRunner::Ec2(runner)
    }
}

impl From<EksRunner> for EnvironmentRunner {
    fn from(runner: EksRunner) -> Self {
        EnvironmentRunner::Eks(runner)
    }
}
