//! Container-insights style runner: reconcile every metric in the cluster
//! against a schema, then validate the per-node performance logs.

use super::{AgentConfig, TestRunner, DEFAULT_AGENT_RUN_DURATION};
use crate::context::ValidationContext;
use crate::logs::{
    ContainsSubstring, LogAssertion, LogValidator, LogWindow, MatchesSchema, NoDuplicates,
    NonEmpty, PerRecord, SchemaResolver,
};
use crate::metrics::{ExpectedSchema, MetricReconciler, ReconcileOptions};
use crate::status::{TestGroupResult, TestResult};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Name of the performance-log result.
pub const EMF_LOGS_RESULT: &str = "emf-logs";

/// Log group holding a cluster's performance records.
pub fn performance_log_group(cluster_name: &str) -> String {
    format!("/aws/containerinsights/{}/performance", cluster_name)
}

/// Validates the performance log stream of every node in the cluster.
///
/// Each stream must be non-empty and free of duplicates, and every record
/// must match the schema for its type and carry the cluster name.
#[derive(Clone)]
pub struct PerformanceLogCheck {
    schemas: Arc<dyn SchemaResolver>,
}

impl PerformanceLogCheck {
    pub fn new(schemas: Arc<dyn SchemaResolver>) -> Self {
        Self { schemas }
    }

    fn assertions(&self, cluster_name: &str) -> Vec<Box<dyn LogAssertion>> {
        vec![
            Box::new(NonEmpty),
            Box::new(NoDuplicates),
            Box::new(
                PerRecord::default()
                    .with(MatchesSchema::new(Arc::clone(&self.schemas)))
                    .with(ContainsSubstring::json_field("ClusterName", cluster_name)),
            ),
        ]
    }

    pub async fn validate(&self, ctx: &ValidationContext) -> TestResult {
        let Some(cluster_name) = ctx.env.cluster_name() else {
            warn!(
                target: "agent_validation.runner",
                compute_type = %ctx.env.compute_type,
                "Performance logs require a cluster"
            );
            return TestResult::failed(EMF_LOGS_RESULT);
        };

        let instances = match ctx.metadata.cluster_instances(cluster_name).await {
            Ok(instances) => instances,
            Err(e) => {
                warn!(
                    target: "agent_validation.runner",
                    cluster = %cluster_name,
                    error = %e,
                    "Failed to list cluster instances"
                );
                return TestResult::failed(EMF_LOGS_RESULT);
            }
        };
        let streams: Vec<&str> = instances
            .iter()
            .map(|instance| instance.instance_name.as_str())
            .collect();

        let window = LogWindow {
            start: None,
            end: Some(Utc::now()),
        };
        LogValidator::new(ctx.logs.as_ref())
            .validate_sources(
                EMF_LOGS_RESULT,
                &performance_log_group(cluster_name),
                &streams,
                window,
                &self.assertions(cluster_name),
            )
            .await
    }
}

/// Runner reconciling a namespace against an [`ExpectedSchema`].
pub struct SchemaMetricsRunner {
    name: String,
    expected: ExpectedSchema,
    metric_filter: String,
    options: ReconcileOptions,
    agent_config_file_name: Option<String>,
    run_duration: Duration,
    performance_logs: Option<PerformanceLogCheck>,
    agent_config: Option<AgentConfig>,
}

impl SchemaMetricsRunner {
    pub fn new(name: impl Into<String>, expected: ExpectedSchema) -> Self {
        Self {
            name: name.into(),
            expected,
            metric_filter: String::new(),
            options: ReconcileOptions::default(),
            agent_config_file_name: None,
            run_duration: DEFAULT_AGENT_RUN_DURATION,
            performance_logs: None,
            agent_config: None,
        }
    }

    /// Ignore metrics whose name contains `filter`.
    pub fn with_metric_filter(mut self, filter: impl Into<String>) -> Self {
        self.metric_filter = filter.into();
        self
    }

    pub fn with_options(mut self, options: ReconcileOptions) -> Self {
        self.options = options;
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

    pub fn with_performance_logs(mut self, check: PerformanceLogCheck) -> Self {
        self.performance_logs = Some(check);
        self
    }

    pub fn expected(&self) -> &ExpectedSchema {
        &self.expected
    }

    /// Config handed over by the cluster lifecycle, if any.
    pub fn agent_config(&self) -> Option<&AgentConfig> {
        self.agent_config.as_ref()
    }
}

#[async_trait]
impl TestRunner for SchemaMetricsRunner {
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
        let names: BTreeSet<&String> = self.expected.iter().flat_map(|(_, names)| names).collect();
        names.into_iter().cloned().collect()
    }

    async fn validate(&self, ctx: &mut ValidationContext) -> TestGroupResult {
        let reconciler = MetricReconciler::new(ctx.metrics.as_ref(), self.options.clone());
        let mut results = reconciler
            .validate(&ctx.env, &self.metric_filter, &self.expected, &mut ctx.rng)
            .await;

        if let Some(check) = &self.performance_logs {
            results.push(check.validate(ctx).await);
        }

        TestGroupResult::new(&self.name, results)
    }

    fn set_agent_config(&mut self, config: AgentConfig) {
        self.agent_config = Some(config);
    }
}
