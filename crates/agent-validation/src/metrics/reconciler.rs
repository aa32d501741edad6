//! Reconciliation of emitted metrics against an expected schema.
//!
//! A pass has three stages:
//!
//! 1. **Listing** - every metric in the namespace scoped to the environment
//!    is listed once and grouped into an [`ActualMetricIndex`].
//! 2. **Availability** - for each expected dimension key, the set of metric
//!    names observed under that key must equal the expected set exactly.
//! 3. **Values** - for each expected metric, one observed dimension set is
//!    sampled at random and its datapoints are checked.
//!
//! Every failure becomes a FAILED [`TestResult`]; nothing aborts the pass
//! except a failed or empty listing, which yields a single result.

use super::value::{check_metric_values, ValueCheck};
use super::{ActualMetricIndex, ExpectedSchema};
use crate::backend::{MetricsBackend, Statistic, MINUTE_STAT_PERIOD};
use crate::dimension::{Dimension, DimensionSet, CLUSTER_NAME};
use crate::environment::MetaData;
use crate::status::{Status, TestResult};
use rand::seq::SliceRandom;
use rand::RngCore;
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Name of the result reported when the listing fails or is empty.
pub const METRIC_LISTING_RESULT: &str = "metric-listing";

/// Namespace container-insights metrics are published under.
pub const CONTAINER_INSIGHTS_NAMESPACE: &str = "ContainerInsights";

/// Query parameters for a reconciliation pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileOptions {
    pub namespace: String,
    /// Dimension the listing is scoped by, valued with the cluster name.
    pub scope_dimension: String,
    pub statistic: Statistic,
    pub period: Duration,
    /// Minimum accepted datapoint value.
    pub threshold: f64,
}

impl ReconcileOptions {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            scope_dimension: CLUSTER_NAME.to_string(),
            statistic: Statistic::SampleCount,
            period: MINUTE_STAT_PERIOD,
            threshold: 0.0,
        }
    }

    pub fn with_statistic(mut self, statistic: Statistic) -> Self {
        self.statistic = statistic;
        self
    }

    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self::new(CONTAINER_INSIGHTS_NAMESPACE)
    }
}

/// Compares a backend's metrics with an [`ExpectedSchema`].
pub struct MetricReconciler<'a> {
    backend: &'a dyn MetricsBackend,
    options: ReconcileOptions,
}

impl<'a> MetricReconciler<'a> {
    pub fn new(backend: &'a dyn MetricsBackend, options: ReconcileOptions) -> Self {
        Self { backend, options }
    }

    pub fn options(&self) -> &ReconcileOptions {
        &self.options
    }

    /// Run a full reconciliation pass.
    ///
    /// Metrics whose name contains a non-empty `metric_filter` are ignored.
    /// Results are ordered by dimension key; each key's availability result
    /// is followed by one value result per expected metric under it.
    pub async fn validate(
        &self,
        env: &MetaData,
        metric_filter: &str,
        expected: &ExpectedSchema,
        rng: &mut (dyn RngCore + Send),
    ) -> Vec<TestResult> {
        let scope = self.scope(env);
        let listings = match self
            .backend
            .list_metrics(&self.options.namespace, None, &scope)
            .await
        {
            Ok(listings) => listings,
            Err(e) => {
                warn!(
                    target: "agent_validation.metrics",
                    namespace = %self.options.namespace,
                    error = %e,
                    "Failed to list metrics"
                );
                return vec![TestResult::failed(METRIC_LISTING_RESULT)];
            }
        };

        if listings.is_empty() {
            warn!(
                target: "agent_validation.metrics",
                namespace = %self.options.namespace,
                "No metrics found"
            );
            return vec![TestResult::failed(METRIC_LISTING_RESULT)];
        }

        let index = ActualMetricIndex::build(listings, metric_filter);
        info!(
            target: "agent_validation.metrics",
            namespace = %self.options.namespace,
            keys = index.len(),
            "Indexed metrics"
        );

        let mut results = Vec::new();
        for (key, expected_names) in expected.iter() {
            let Some(actual) = index.get(key) else {
                warn!(
                    target: "agent_validation.metrics",
                    dims = %key,
                    "No metrics found for dimension key"
                );
                results.push(TestResult::failed(key.as_str()));
                continue;
            };

            let actual_names: BTreeSet<&str> = actual.keys().map(String::as_str).collect();
            let expected_refs: BTreeSet<&str> = expected_names.iter().map(String::as_str).collect();
            let available = actual_names == expected_refs;
            if !available {
                let missing: Vec<&&str> = expected_refs.difference(&actual_names).collect();
                let unexpected: Vec<&&str> = actual_names.difference(&expected_refs).collect();
                warn!(
                    target: "agent_validation.metrics",
                    dims = %key,
                    ?missing,
                    ?unexpected,
                    "Metric names do not match"
                );
            }
            results.push(TestResult::new(key.as_str(), Status::from_bool(available)));

            for name in expected_names {
                let observed = actual.get(name).map(Vec::as_slice).unwrap_or_default();
                results.push(self.check_sampled(name, observed, rng).await);
            }
        }

        results
    }

    fn scope(&self, env: &MetaData) -> DimensionSet {
        env.cluster_name()
            .map(|cluster| {
                DimensionSet::new(vec![Dimension::new(&self.options.scope_dimension, cluster)])
            })
            .unwrap_or_default()
    }

    async fn check_sampled(
        &self,
        name: &str,
        observed: &[DimensionSet],
        rng: &mut (dyn RngCore + Send),
    ) -> TestResult {
        let Some(dimensions) = observed.choose(rng) else {
            warn!(
                target: "agent_validation.metrics",
                metric = %name,
                "Metric was never observed"
            );
            return TestResult::failed(name);
        };

        debug!(
            target: "agent_validation.metrics",
            metric = %name,
            candidates = observed.len(),
            dims = ?dimensions,
            "Sampled dimension set"
        );

        check_metric_values(
            self.backend,
            ValueCheck {
                namespace: &self.options.namespace,
                metric: name,
                dimensions,
                statistic: self.options.statistic,
                period: self.options.period,
                threshold: self.options.threshold,
            },
        )
        .await
    }
}
