//! Standalone-host lifecycle: the harness installs the config and runs the
//! agent itself.

use super::{lifecycle_failure, RunnerError, TestRunner};
use crate::context::ValidationContext;
use crate::environment::AgentController;
use crate::status::TestGroupResult;
use std::path::Path;
use tracing::{error, info, warn};

pub struct Ec2Runner {
    runner: Box<dyn TestRunner>,
}

impl Ec2Runner {
    pub fn new(runner: Box<dyn TestRunner>) -> Self {
        Self { runner }
    }

    pub fn test_name(&self) -> &str {
        self.runner.test_name()
    }

    pub fn inner(&self) -> &dyn TestRunner {
        self.runner.as_ref()
    }

    /// Run the agent for the runner's duration, then validate.
    ///
    /// Any lifecycle failure replaces the validation results with a single
    /// FAILED result.
    pub async fn run(
        &mut self,
        ctx: &mut ValidationContext,
        agent: &dyn AgentController,
        config_dir: &Path,
    ) -> TestGroupResult {
        let name = self.runner.test_name().to_string();
        info!(target: "agent_validation.runner", runner = %name, "Running test runner");

        if let Err(e) = self.run_agent(ctx, agent, config_dir).await {
            error!(
                target: "agent_validation.runner",
                runner = %name,
                error = %e,
                "Agent lifecycle failed"
            );
            return lifecycle_failure(&name);
        }

        self.runner.validate(ctx).await
    }

    async fn run_agent(
        &self,
        ctx: &ValidationContext,
        agent: &dyn AgentController,
        config_dir: &Path,
    ) -> Result<(), RunnerError> {
        self.runner.setup_before_agent_run(ctx).await?;

        let config_file = self
            .runner
            .agent_config_file_name()
            .ok_or_else(|| RunnerError::MissingAgentConfig(self.runner.test_name().to_string()))?;
        agent.start(&config_dir.join(config_file)).await?;

        if let Err(e) = self.runner.setup_after_agent_run(ctx).await {
            if let Err(stop_err) = agent.stop().await {
                warn!(
                    target: "agent_validation.runner",
                    error = %stop_err,
                    "Failed to stop agent after setup failure"
                );
            }
            return Err(e);
        }

        let duration = self.runner.agent_run_duration();
        info!(
            target: "agent_validation.runner",
            runner = %self.runner.test_name(),
            seconds = duration.as_secs(),
            "Waiting for agent to emit telemetry"
        );
        tokio::time::sleep(duration).await;

        agent.stop().await?;
        Ok(())
    }
}
