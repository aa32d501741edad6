//! Suite orchestration.
//!
//! A [`TestSuite`] picks the runners its [`SuiteDefinition`] provides for
//! the detected compute type, runs them one after another, and collects
//! their groups into a [`SuiteResult`] that is asserted at teardown.

use crate::context::ValidationContext;
use crate::environment::{AgentController, ComputeType, MetaData};
use crate::runner::{Ec2Runner, EksRunner, EnvironmentRunner};
use crate::status::{Status, SuiteResult, TestGroupResult};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

/// Raised at teardown when any result in the suite failed.
#[derive(Debug, Error)]
pub enum SuiteError {
    #[error("Suite {suite} failed: {} failed result(s)", .result.failed_count())]
    Failed { suite: String, result: SuiteResult },
}

/// The runners a suite offers per compute type.
pub trait SuiteDefinition: Send + Sync {
    fn name(&self) -> &str;

    fn ec2_runners(&self, env: &MetaData) -> Vec<Ec2Runner>;

    fn eks_runners(&self, env: &MetaData) -> Vec<EksRunner>;
}

pub struct TestSuite {
    definition: Box<dyn SuiteDefinition>,
    agent: Arc<dyn AgentController>,
    config_dir: PathBuf,
    /// Resolved on first run, then reused.
    runners: Option<Vec<EnvironmentRunner>>,
    result: SuiteResult,
}

impl TestSuite {
    pub fn new(
        definition: Box<dyn SuiteDefinition>,
        agent: Arc<dyn AgentController>,
        config_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            definition,
            agent,
            config_dir: config_dir.into(),
            runners: None,
            result: SuiteResult::new(),
        }
    }

    pub fn name(&self) -> &str {
        self.definition.name()
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn setup(&self) {
        info!(target: "agent_validation.suite", suite = %self.name(), "Starting test suite");
    }

    fn resolve_runners(&self, env: &MetaData) -> Vec<EnvironmentRunner> {
        match &env.compute_type {
            ComputeType::Ec2 => self
                .definition
                .ec2_runners(env)
                .into_iter()
                .map(EnvironmentRunner::from)
                .collect(),
            ComputeType::Eks => self
                .definition
                .eks_runners(env)
                .into_iter()
                .map(EnvironmentRunner::from)
                .collect(),
            ComputeType::Unrecognized(raw) => {
                info!(
                    target: "agent_validation.suite",
                    suite = %self.name(),
                    compute_type = %raw,
                    "No runners for compute type"
                );
                Vec::new()
            }
        }
    }

    /// Run every runner for the context's compute type, in order.
    pub async fn run(&mut self, ctx: &mut ValidationContext) {
        let mut runners = match self.runners.take() {
            Some(runners) => runners,
            None => self.resolve_runners(&ctx.env),
        };

        info!(
            target: "agent_validation.suite",
            suite = %self.name(),
            compute_type = %ctx.env.compute_type,
            runners = runners.len(),
            "Running suite"
        );

        for runner in &mut runners {
            let group = runner
                .run(ctx, self.agent.as_ref(), &self.config_dir)
                .await;
            self.add_to_suite_result(group);
        }

        self.runners = Some(runners);
    }

    pub fn add_to_suite_result(&mut self, group: TestGroupResult) {
        info!(
            target: "agent_validation.suite",
            group = %group.name,
            status = %group.status(),
            "Runner finished"
        );
        self.result.push(group);
    }

    pub fn result(&self) -> &SuiteResult {
        &self.result
    }

    /// Print the summary table and assert the suite passed.
    pub fn teardown(self) -> Result<SuiteResult, SuiteError> {
        let suite = self.definition.name().to_string();
        println!("{}", self.result);

        if self.result.status() == Status::Passed {
            info!(target: "agent_validation.suite", suite = %suite, "Suite passed");
            return Ok(self.result);
        }

        error!(
            target: "agent_validation.suite",
            suite = %suite,
            failed = self.result.failed_count(),
            "Suite failed"
        );
        Err(SuiteError::Failed {
            suite,
            result: self.result,
        })
    }
}

/// Set up, run, and tear down a suite in one call.
pub async fn run_suite(
    definition: Box<dyn SuiteDefinition>,
    agent: Arc<dyn AgentController>,
    config_dir: impl Into<PathBuf>,
    ctx: &mut ValidationContext,
) -> Result<SuiteResult, SuiteError> {
    let mut suite = TestSuite::new(definition, agent, config_dir);
    suite.setup();
    suite.run(ctx).await;
    suite.teardown()
}
