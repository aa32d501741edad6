//! Cluster lifecycle: the agent is already deployed, so the harness only
//! waits for it before validating.

use super::{lifecycle_failure, AgentConfig, RunnerError, TestRunner};
use crate::context::ValidationContext;
use crate::status::TestGroupResult;
use std::path::Path;
use tracing::{error, info};

pub struct EksRunner {
    runner: Box<dyn TestRunner>,
}

impl EksRunner {
    pub fn new(runner: Box<dyn TestRunner>) -> Self {
        Self { runner }
    }

    pub fn test_name(&self) -> &str {
        self.runner.test_name()
    }

    pub fn inner(&self) -> &dyn TestRunner {
        self.runner.as_ref()
    }

    /// Hand the runner its config, wait for the agent, then validate.
    pub async fn run(&mut self, ctx: &mut ValidationContext, config_dir: &Path) -> TestGroupResult {
        let name = self.runner.test_name().to_string();
        info!(target: "agent_validation.runner", runner = %name, "Running test runner");

        if let Err(e) = self.prepare(ctx, config_dir).await {
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

    async fn prepare(
        &mut self,
        ctx: &ValidationContext,
        config_dir: &Path,
    ) -> Result<(), RunnerError> {
        if let Some(file_name) = self.runner.agent_config_file_name() {
            let config = AgentConfig::load(config_dir, file_name).await?;
            self.runner.set_agent_config(config);
        }

        self.runner.setup_before_agent_run(ctx).await?;

        let duration = self.runner.agent_run_duration();
        info!(
            target: "agent_validation.runner",
            runner = %self.runner.test_name(),
            seconds = duration.as_secs(),
            "Waiting for agent to emit telemetry"
        );
        tokio::time::sleep(duration).await;

        self.runner.setup_after_agent_run(ctx).await
    }
}
