//! Datapoint checks for a single metric.

use crate::backend::{BackendError, MetricsBackend, Statistic};
use crate::dimension::DimensionSet;
use crate::status::TestResult;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Why a metric's values were rejected.
#[derive(Debug, Error)]
pub enum ValueCheckError {
    #[error("Failed to fetch values: {0}")]
    Fetch(#[from] BackendError),

    #[error("No datapoints returned")]
    NoDatapoints,

    #[error("Datapoint {value} is below threshold {threshold}")]
    BelowThreshold { value: f64, threshold: f64 },
}

/// One value query and its acceptance threshold.
#[derive(Debug, Clone, Copy)]
pub struct ValueCheck<'a> {
    pub namespace: &'a str,
    pub metric: &'a str,
    pub dimensions: &'a DimensionSet,
    pub statistic: Statistic,
    pub period: Duration,
    pub threshold: f64,
}

/// Fetch a metric's datapoints and require every one to be at least the
/// threshold. The result is named after the metric.
pub async fn check_metric_values(
    backend: &dyn MetricsBackend,
    check: ValueCheck<'_>,
) -> TestResult {
    match fetch_and_verify(backend, &check).await {
        Ok(()) => TestResult::passed(check.metric),
        Err(e) => {
            warn!(
                target: "agent_validation.metrics",
                metric = %check.metric,
                namespace = %check.namespace,
                error = %e,
                "Metric value check failed"
            );
            TestResult::failed(check.metric)
        }
    }
}

async fn fetch_and_verify(
    backend: &dyn MetricsBackend,
    check: &ValueCheck<'_>,
) -> Result<(), ValueCheckError> {
    let values = backend
        .get_values(
            check.namespace,
            check.metric,
            check.dimensions,
            check.statistic,
            check.period,
        )
        .await?;

    debug!(
        target: "agent_validation.metrics",
        metric = %check.metric,
        datapoints = values.len(),
        "Fetched metric values"
    );

    all_values_at_least(&values, check.threshold)
}

/// Every value is `>= threshold`. An empty slice is rejected.
pub fn all_values_at_least(values: &[f64], threshold: f64) -> Result<(), ValueCheckError> {
    if values.is_empty() {
        return Err(ValueCheckError::NoDatapoints);
    }

    match values.iter().find(|v| v.is_nan() || **v < threshold) {
        Some(&value) => Err(ValueCheckError::BelowThreshold { value, threshold }),
        None => Ok(()),
    }
}
