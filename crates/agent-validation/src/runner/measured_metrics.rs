//! Runner checking a fixed list of metrics on the local instance.
//!
//! Each measured metric is queried with dimensions resolved at validation
//! time (typically just `InstanceId`) and must have only non-negative
//! datapoints. Workloads the agent scrapes can be started by setup commands
//! before the agent runs.

use super::{RunnerError, TestRunner, DEFAULT_AGENT_RUN_DURATION};
use crate::backend::{Statistic, HIGH_RESOLUTION_STAT_PERIOD};
use crate::context::ValidationContext;
use crate::dimension::{DimensionInstruction, INSTANCE_ID};
use crate::environment::run_commands;
use crate::metrics::{check_metric_values, ValueCheck};
use crate::status::{TestGroupResult, TestResult};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{info, warn};

pub struct MeasuredMetricsRunner {
    name: String,
    namespace: String,
    metrics: Vec<String>,
    dimensions: Vec<DimensionInstruction>,
    statistic: Statistic,
    period: Duration,
    threshold: f64,
    agent_config_file_name: Option<String>,
    run_duration: Duration,
    setup_commands: Vec<String>,
}

impl MeasuredMetricsRunner {
    /// Runner querying `metrics` by `InstanceId` with the high-resolution
    /// average.
    pub fn new(
        name: impl Into<String>,
        namespace: impl Into<String>,
        metrics: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            metrics,
            dimensions: vec![DimensionInstruction::unknown(INSTANCE_ID)],
            statistic: Statistic::Average,
            period: HIGH_RESOLUTION_STAT_PERIOD,
            threshold: 0.0,
            agent_config_file_name: None,
            run_duration: DEFAULT_AGENT_RUN_DURATION,
            setup_commands: Vec::new(),
        }
    }

    pub fn with_dimensions(mut self, dimensions: Vec<DimensionInstruction>) -> Self {
        self.dimensions = dimensions;
        self
    }

    pub fn with_statistic(mut self, statistic: Statistic, period: Duration) -> Self {
        self.statistic = statistic;
        self.period = period;
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_agent_config_file(mut self, file_name: impl Into<String>) -> Self {
        self.agent_config_file_name = Some(file_name.into());
        self
    }

    pub fn with_run_duration(mut self, duration: Duration) -> Self {
        self.run_duration = duration;
        self
    }

    pub fn with_setup_commands(mut self, commands: Vec<String>) -> Self {
        self.setup_commands = commands;
        self
    }

    async fn validate_metric(&self, ctx: &ValidationContext, metric: &str) -> TestResult {
        let (dimensions, failed) = ctx.dimensions.get_dimensions(&self.dimensions).await;
        if !failed.is_empty() {
            warn!(
                target: "agent_validation.runner",
                metric = %metric,
                unresolved = failed.len(),
                "Could not resolve dimensions"
            );
            return TestResult::failed(metric);
        }

        check_metric_values(
            ctx.metrics.as_ref(),
            ValueCheck {
                namespace: &self.namespace,
                metric,
                dimensions: &dimensions,
                statistic: self.statistic,
                period: self.period,
                threshold: self.threshold,
            },
        )
        .await
    }
}

#[async_trait]
impl TestRunner for MeasuredMetricsRunner {
    fn test_name(&self) -> &str {
        &self.name
    }

    fn agent_config_file_name(&self) -> Option<&str> {
        self.agent_config_file_name.as_deref()
    }

    fn agent_run_duration(&self) -> Duration {
        self.run_duration
    }

    fn measured_metrics(&self) -> Vec<String> {
        self.metrics.clone()
    }

    async fn validate(&self, ctx: &mut ValidationContext) -> TestGroupResult {
        let mut results = Vec::with_capacity(self.metrics.len());
        for metric in &self.metrics {
            results.push(self.validate_metric(ctx, metric).await);
        }
        TestGroupResult::new(&self.name, results)
    }

    async fn setup_before_agent_run(&self, ctx: &ValidationContext) -> Result<(), RunnerError> {
        if self.setup_commands.is_empty() {
            return Ok(());
        }

        info!(
            target: "agent_validation.runner",
            runner = %self.name,
            commands = self.setup_commands.len(),
            "Running setup commands"
        );
        run_commands(ctx.commands.as_ref(), &self.setup_commands).await?;
        Ok(())
    }
}
