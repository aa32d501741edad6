//! Pre-built contexts and records.

use crate::mock_environment::{MockEnvironment, RecordingExecutor};
use crate::mock_logs::MockLogsBackend;
use crate::mock_metrics::MockMetricsBackend;
use agent_validation::environment::MetaData;
use agent_validation::ValidationContext;
use serde_json::{json, Value};
use std::sync::Arc;

/// Seed used by [`TestContextBuilder`] unless overridden.
pub const DEFAULT_TEST_SEED: u64 = 42;

/// Builds a [`ValidationContext`] over mocks with a fixed sampling seed.
///
/// Mocks share state with their clones, so keep a clone to inspect calls
/// after the run.
#[derive(Debug, Clone)]
pub struct TestContextBuilder {
    env: MetaData,
    metrics: MockMetricsBackend,
    logs: MockLogsBackend,
    metadata: MockEnvironment,
    commands: RecordingExecutor,
    seed: u64,
}

impl TestContextBuilder {
    #[must_use]
    pub fn new(env: MetaData) -> Self {
        Self {
            env,
            metrics: MockMetricsBackend::new(),
            logs: MockLogsBackend::new(),
            metadata: MockEnvironment::new(),
            commands: RecordingExecutor::new(),
            seed: DEFAULT_TEST_SEED,
        }
    }

    #[must_use]
    pub fn metrics(mut self, metrics: &MockMetricsBackend) -> Self {
        self.metrics = metrics.clone();
        self
    }

    #[must_use]
    pub fn logs(mut self, logs: &MockLogsBackend) -> Self {
        self.logs = logs.clone();
        self
    }

    #[must_use]
    pub fn metadata(mut self, metadata: MockEnvironment) -> Self {
        self.metadata = metadata;
        self
    }

    #[must_use]
    pub fn commands(mut self, commands: &RecordingExecutor) -> Self {
        self.commands = commands.clone();
        self
    }

    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn build(self) -> ValidationContext {
        ValidationContext::new(
            self.env,
            Arc::new(self.metrics),
            Arc::new(self.logs),
            Arc::new(self.metadata),
            Arc::new(self.commands),
        )
        .with_seed(self.seed)
    }
}

/// Compact JSON performance record of `record_type` for `cluster`, merged
/// with the fields of `extra` (an object).
pub fn performance_record(record_type: &str, cluster: &str, extra: Value) -> String {
    let mut record = json!({
        "Type": record_type,
        "ClusterName": cluster,
        "Timestamp": "1700000000000",
    });
    if let (Some(fields), Some(extra)) = (record.as_object_mut(), extra.as_object()) {
        for (key, value) in extra {
            fields.insert(key.clone(), value.clone());
        }
    }
    record.to_string()
}

/// Schema for `Node` performance records.
pub fn node_record_schema() -> Value {
    json!({
        "type": "object",
        "required": ["Type", "ClusterName", "NodeName", "node_cpu_utilization"],
        "properties": {
            "ClusterName": {"type": "string"},
            "NodeName": {"type": "string"},
            "node_cpu_utilization": {"type": "number", "minimum": 0}
        }
    })
}

/// Schema for `Pod` performance records.
pub fn pod_record_schema() -> Value {
    json!({
        "type": "object",
        "required": ["Type", "ClusterName", "PodName"],
        "properties": {
            "ClusterName": {"type": "string"},
            "PodName": {"type": "string"}
        }
    })
}
