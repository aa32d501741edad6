//! Metric validation: expected schemas, the actual-metric index, and the
//! reconciler that compares them.

pub mod reconciler;
pub mod value;

pub use reconciler::{
    MetricReconciler, ReconcileOptions, CONTAINER_INSIGHTS_NAMESPACE, METRIC_LISTING_RESULT,
};
pub use value::{all_values_at_least, check_metric_values, ValueCheck, ValueCheckError};

use crate::backend::MetricListing;
use crate::dimension::{DimensionKey, DimensionSet};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Expected metric names per dimension key.
///
/// Deserializes from a JSON object whose keys are delimiter-joined dimension
/// names, e.g. `{"ClusterName-InstanceId": ["node_cpu_utilization"]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "BTreeMap<DimensionKey, Vec<String>>")]
pub struct ExpectedSchema(BTreeMap<DimensionKey, BTreeSet<String>>);

impl ExpectedSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add metrics expected under the given dimension names.
    pub fn with<N, M>(mut self, dimension_names: &[N], metrics: &[M]) -> Self
    where
        N: AsRef<str>,
        M: AsRef<str>,
    {
        self.insert(
            DimensionKey::from_names(dimension_names),
            metrics.iter().map(|m| m.as_ref().to_string()),
        );
        self
    }

    pub fn insert<I>(&mut self, key: DimensionKey, metrics: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.0.entry(key).or_default().extend(metrics);
    }

    pub fn get(&self, key: &DimensionKey) -> Option<&BTreeSet<String>> {
        self.0.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&DimensionKey, &BTreeSet<String>)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<BTreeMap<DimensionKey, Vec<String>>> for ExpectedSchema {
    fn from(table: BTreeMap<DimensionKey, Vec<String>>) -> Self {
        let mut schema = Self::new();
        for (key, metrics) in table {
            schema.insert(key, metrics);
        }
        schema
    }
}

/// Observed metrics per dimension key, per metric name.
///
/// Several instances (nodes, pods) can emit the same metric under the same
/// key with different values, so each name maps to every observed set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActualMetricIndex(BTreeMap<DimensionKey, BTreeMap<String, Vec<DimensionSet>>>);

impl ActualMetricIndex {
    /// Index a listing, skipping metrics whose name contains `metric_filter`.
    ///
    /// An empty filter skips nothing.
    pub fn build<I>(listings: I, metric_filter: &str) -> Self
    where
        I: IntoIterator<Item = MetricListing>,
    {
        let mut index: BTreeMap<DimensionKey, BTreeMap<String, Vec<DimensionSet>>> =
            BTreeMap::new();

        for listing in listings {
            if !metric_filter.is_empty() && listing.name.contains(metric_filter) {
                continue;
            }

            let key = listing.dimensions.key();
            debug!(
                target: "agent_validation.metrics",
                metric = %listing.name,
                dims = %key,
                "Indexing metric"
            );
            index
                .entry(key)
                .or_default()
                .entry(listing.name)
                .or_default()
                .push(listing.dimensions);
        }

        Self(index)
    }

    pub fn get(&self, key: &DimensionKey) -> Option<&BTreeMap<String, Vec<DimensionSet>>> {
        self.0.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &DimensionKey> {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
