//! Scripted test runner for lifecycle and suite tests.

use agent_validation::backend::BackendError;
use agent_validation::runner::{AgentConfig, RunnerError, TestRunner};
use agent_validation::status::{TestGroupResult, TestResult};
use agent_validation::ValidationContext;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Runner returning fixed results and recording which hooks ran.
///
/// Hooks are recorded as `setup_before`, `setup_after`, `validate`, and
/// `set_agent_config:<file>`.
#[derive(Debug, Clone)]
pub struct MockRunner {
    name: String,
    config_file: Option<String>,
    results: Vec<TestResult>,
    fail_setup_before: bool,
    fail_setup_after: bool,
    calls: Arc<Mutex<Vec<String>>>,
    received_config: Arc<Mutex<Option<AgentConfig>>>,
}

impl MockRunner {
    /// Runner named `name` whose validation yields one PASSED result per
    /// name in `passing`.
    #[must_use]
    pub fn new(name: &str, passing: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            config_file: None,
            results: passing.iter().map(|r| TestResult::passed(*r)).collect(),
            fail_setup_before: false,
            fail_setup_after: false,
            calls: Arc::new(Mutex::new(Vec::new())),
            received_config: Arc::new(Mutex::new(None)),
        }
    }

    #[must_use]
    pub fn with_result(mut self, result: TestResult) -> Self {
        self.results.push(result);
        self
    }

    #[must_use]
    pub fn with_config_file(mut self, file_name: &str) -> Self {
        self.config_file = Some(file_name.to_string());
        self
    }

    #[must_use]
    pub fn failing_setup_before(mut self) -> Self {
        self.fail_setup_before = true;
        self
    }

    #[must_use]
    pub fn failing_setup_after(mut self) -> Self {
        self.fail_setup_after = true;
        self
    }

    /// Hooks called so far, in order. Shared by clones.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Config received through `set_agent_config`.
    pub fn received_config(&self) -> Option<AgentConfig> {
        self.received_config.lock().unwrap().clone()
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }

    fn hook_result(&self, fail: bool, hook: &str) -> Result<(), RunnerError> {
        if fail {
            return Err(RunnerError::Setup(BackendError::CommandFailed {
                command: hook.to_string(),
                message: "mock setup failure".to_string(),
            }));
        }
        Ok(())
    }
}

#[async_trait]
impl TestRunner for MockRunner {
    fn test_name(&self) -> &str {
        &self.name
    }

    fn agent_config_file_name(&self) -> Option<&str> {
        self.config_file.as_deref()
    }

    fn agent_run_duration(&self) -> Duration {
        Duration::ZERO
    }

    fn measured_metrics(&self) -> Vec<String> {
        self.results.iter().map(|r| r.name.clone()).collect()
    }

    async fn validate(&self, _ctx: &mut ValidationContext) -> TestGroupResult {
        self.record("validate");
        TestGroupResult::new(&self.name, self.results.clone())
    }

    async fn setup_before_agent_run(&self, _ctx: &ValidationContext) -> Result<(), RunnerError> {
        self.record("setup_before");
        self.hook_result(self.fail_setup_before, "setup_before")
    }

    async fn setup_after_agent_run(&self, _ctx: &ValidationContext) -> Result<(), RunnerError> {
        self.record("setup_after");
        self.hook_result(self.fail_setup_after, "setup_after")
    }

    fn set_agent_config(&mut self, config: AgentConfig) {
        self.record(format!("set_agent_config:{}", config.config_file_name));
        *self.received_config.lock().unwrap() = Some(config);
    }
}
