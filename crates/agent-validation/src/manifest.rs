//! Suites described as JSON manifests.
//!
//! A manifest lists runner specs per compute type. Schemas are compiled when
//! the manifest is loaded, so a bad schema fails before any agent runs.
//!
//! ```json
//! {
//!   "name": "HyperPod",
//!   "eks": [{
//!     "kind": "schema_metrics",
//!     "name": "EKS_AWS_HYPERPOD",
//!     "metric_filter": "_hyperpod",
//!     "run_duration_secs": 180,
//!     "expected": {"ClusterName": ["hyper_pod_node_health_status_unknown"]}
//!   }]
//! }
//! ```

use crate::backend::{Statistic, HIGH_RESOLUTION_STAT_PERIOD, MINUTE_STAT_PERIOD};
use crate::dimension::DimensionInstruction;
use crate::environment::MetaData;
use crate::logs::{LogValidationError, SchemaResolver, SchemaTable, DEFAULT_DISCRIMINANT};
use crate::metrics::{ExpectedSchema, ReconcileOptions, CONTAINER_INSIGHTS_NAMESPACE};
use crate::runner::{
    Ec2Runner, EksRunner, MeasuredMetricsRunner, PerformanceLogCheck, SchemaMetricsRunner,
    TestRunner,
};
use crate::suite::SuiteDefinition;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("Failed to read manifest {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid manifest: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid log schema in runner {runner}: {source}")]
    Schema {
        runner: String,
        #[source]
        source: LogValidationError,
    },
}

#[derive(Debug, Deserialize)]
struct RawManifest {
    name: String,
    #[serde(default)]
    ec2: Vec<RunnerSpec>,
    #[serde(default)]
    eks: Vec<RunnerSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum RunnerSpec {
    SchemaMetrics(SchemaMetricsSpec),
    MeasuredMetrics(MeasuredMetricsSpec),
}

#[derive(Debug, Deserialize)]
struct SchemaMetricsSpec {
    name: String,
    #[serde(default = "default_container_insights_namespace")]
    namespace: String,
    #[serde(default)]
    metric_filter: String,
    #[serde(default = "default_sample_count")]
    statistic: Statistic,
    #[serde(default = "default_minute_period")]
    period_secs: u64,
    #[serde(default)]
    agent_config_file: Option<String>,
    #[serde(default = "default_run_duration")]
    run_duration_secs: u64,
    expected: ExpectedSchema,
    #[serde(default)]
    performance_logs: Option<PerformanceLogsSpec>,
}

#[derive(Debug, Deserialize)]
struct PerformanceLogsSpec {
    #[serde(default = "default_discriminant")]
    discriminant: String,
    schemas: BTreeMap<String, Value>,
}

#[derive(Debug, Deserialize)]
struct MeasuredMetricsSpec {
    name: String,
    namespace: String,
    metrics: Vec<String>,
    #[serde(default)]
    dimensions: Option<Vec<DimensionSpec>>,
    #[serde(default = "default_average")]
    statistic: Statistic,
    #[serde(default = "default_high_resolution_period")]
    period_secs: u64,
    #[serde(default)]
    threshold: f64,
    #[serde(default)]
    agent_config_file: Option<String>,
    #[serde(default = "default_run_duration")]
    run_duration_secs: u64,
    #[serde(default)]
    setup_commands: Vec<String>,
}

/// A dimension with a fixed value, or one resolved from the environment when
/// `value` is absent.
#[derive(Debug, Deserialize)]
struct DimensionSpec {
    key: String,
    #[serde(default)]
    value: Option<String>,
}

fn default_container_insights_namespace() -> String {
    CONTAINER_INSIGHTS_NAMESPACE.to_string()
}

fn default_sample_count() -> Statistic {
    Statistic::SampleCount
}

fn default_average() -> Statistic {
    Statistic::Average
}

fn default_minute_period() -> u64 {
    MINUTE_STAT_PERIOD.as_secs()
}

fn default_high_resolution_period() -> u64 {
    HIGH_RESOLUTION_STAT_PERIOD.as_secs()
}

fn default_run_duration() -> u64 {
    crate::runner::DEFAULT_AGENT_RUN_DURATION.as_secs()
}

fn default_discriminant() -> String {
    DEFAULT_DISCRIMINANT.to_string()
}

/// A runner spec with its schemas compiled, ready to be instantiated.
enum RunnerTemplate {
    SchemaMetrics {
        spec: SchemaMetricsSpec,
        schemas: Option<Arc<dyn SchemaResolver>>,
    },
    MeasuredMetrics(MeasuredMetricsSpec),
}

impl RunnerTemplate {
    fn compile(spec: RunnerSpec) -> Result<Self, ManifestError> {
        match spec {
            RunnerSpec::SchemaMetrics(mut spec) => {
                let schemas = match spec.performance_logs.take() {
                    Some(logs) => {
                        let table = SchemaTable::from_schemas(&logs.discriminant, logs.schemas)
                            .map_err(|source| ManifestError::Schema {
                                runner: spec.name.clone(),
                                source,
                            })?;
                        Some(Arc::new(table) as Arc<dyn SchemaResolver>)
                    }
                    None => None,
                };
                Ok(RunnerTemplate::SchemaMetrics { spec, schemas })
            }
            RunnerSpec::MeasuredMetrics(spec) => Ok(RunnerTemplate::MeasuredMetrics(spec)),
        }
    }

    fn instantiate(&self) -> Box<dyn TestRunner> {
        match self {
            RunnerTemplate::SchemaMetrics { spec, schemas } => {
                let options = ReconcileOptions::new(&spec.namespace)
                    .with_statistic(spec.statistic)
                    .with_period(Duration::from_secs(spec.period_secs));
                let mut runner = SchemaMetricsRunner::new(&spec.name, spec.expected.clone())
                    .with_metric_filter(&spec.metric_filter)
                    .with_options(options)
                    .with_run_duration(Duration::from_secs(spec.run_duration_secs));
                if let Some(file) = &spec.agent_config_file {
                    runner = runner.with_agent_config_file(file);
                }
                if let Some(schemas) = schemas {
                    runner = runner
                        .with_performance_logs(PerformanceLogCheck::new(Arc::clone(schemas)));
                }
                Box::new(runner)
            }
            RunnerTemplate::MeasuredMetrics(spec) => {
                let mut runner =
                    MeasuredMetricsRunner::new(&spec.name, &spec.namespace, spec.metrics.clone())
                        .with_statistic(spec.statistic, Duration::from_secs(spec.period_secs))
                        .with_threshold(spec.threshold)
                        .with_run_duration(Duration::from_secs(spec.run_duration_secs))
                        .with_setup_commands(spec.setup_commands.clone());
                if let Some(dimensions) = &spec.dimensions {
                    runner = runner.with_dimensions(
                        dimensions
                            .iter()
                            .map(|d| match &d.value {
                                Some(value) => DimensionInstruction::known(&d.key, value),
                                None => DimensionInstruction::unknown(&d.key),
                            })
                            .collect(),
                    );
                }
                if let Some(file) = &spec.agent_config_file {
                    runner = runner.with_agent_config_file(file);
                }
                Box::new(runner)
            }
        }
    }
}

/// A [`SuiteDefinition`] loaded from a manifest.
pub struct ManifestSuite {
    name: String,
    ec2: Vec<RunnerTemplate>,
    eks: Vec<RunnerTemplate>,
}

impl ManifestSuite {
    pub fn from_json(raw: &str) -> Result<Self, ManifestError> {
        let manifest: RawManifest = serde_json::from_str(raw)?;
        Ok(Self {
            name: manifest.name,
            ec2: compile_all(manifest.ec2)?,
            eks: compile_all(manifest.eks)?,
        })
    }

    pub fn from_path(path: &Path) -> Result<Self, ManifestError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw)
    }

    /// Runner names per compute type, EC2 first.
    pub fn runner_names(&self) -> (Vec<String>, Vec<String>) {
        let names = |templates: &[RunnerTemplate]| {
            templates
                .iter()
                .map(|t| t.instantiate().test_name().to_string())
                .collect()
        };
        (names(&self.ec2), names(&self.eks))
    }
}

fn compile_all(specs: Vec<RunnerSpec>) -> Result<Vec<RunnerTemplate>, ManifestError> {
    specs.into_iter().map(RunnerTemplate::compile).collect()
}

impl SuiteDefinition for ManifestSuite {
    fn name(&self) -> &str {
        &self.name
    }

    fn ec2_runners(&self, _env: &MetaData) -> Vec<Ec2Runner> {
        self.ec2
            .iter()
            .map(|t| Ec2Runner::new(t.instantiate()))
            .collect()
    }

    fn eks_runners(&self, _env: &MetaData) -> Vec<EksRunner> {
        self.eks
            .iter()
            .map(|t| EksRunner::new(t.instantiate()))
            .collect()
    }
}
