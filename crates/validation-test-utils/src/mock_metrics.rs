//! In-memory metrics backend.
//!
//! # Example
//!
//! ```rust,ignore
//! use validation_test_utils::MockMetricsBackend;
//!
//! let backend = MockMetricsBackend::new()
//!     .with_listing("node_cpu_utilization", &[("ClusterName", "demo"), ("NodeName", "n1")])
//!     .with_values("node_cpu_utilization", vec![1.0, 2.0]);
//!
//! // Run a reconciliation, then inspect the calls
//! assert_eq!(backend.list_calls(), 1);
//! ```

use agent_validation::backend::{BackendError, MetricListing, MetricsBackend, Statistic};
use agent_validation::dimension::{Dimension, DimensionSet};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One recorded `get_values` call.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueQuery {
    pub namespace: String,
    pub name: String,
    pub dimensions: DimensionSet,
    pub statistic: Statistic,
    pub period: Duration,
}

/// One recorded `list_metrics` call.
#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
    pub namespace: String,
    pub name_filter: Option<String>,
    pub dimensions: DimensionSet,
}

/// Mock metrics backend with canned listings and values.
///
/// Clones share state, so a test can hand one clone to the code under test
/// and inspect calls through another.
#[derive(Debug, Clone)]
pub struct MockMetricsBackend {
    inner: Arc<Mutex<MockMetricsInner>>,
}

#[derive(Debug, Default)]
struct MockMetricsInner {
    listings: Vec<MetricListing>,
    values: HashMap<String, Vec<f64>>,
    default_values: Vec<f64>,
    fail_listing: bool,
    failing_metrics: HashSet<String>,
    list_calls: Vec<ListQuery>,
    value_calls: Vec<ValueQuery>,
}

/// Build a dimension set from name/value pairs.
pub fn dims(pairs: &[(&str, &str)]) -> DimensionSet {
    pairs
        .iter()
        .map(|(name, value)| Dimension::new(*name, *value))
        .collect()
}

impl Default for MockMetricsBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockMetricsBackend {
    /// Empty backend. Metrics without configured values return `[1.0]`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockMetricsInner {
                default_values: vec![1.0],
                ..Default::default()
            })),
        }
    }

    /// Add a metric to the listing.
    #[must_use]
    pub fn with_listing(self, name: &str, dimensions: &[(&str, &str)]) -> Self {
        self.inner
            .lock()
            .unwrap()
            .listings
            .push(MetricListing::new(name, dims(dimensions)));
        self
    }

    /// Datapoints returned for `name`, whatever the dimensions.
    #[must_use]
    pub fn with_values(self, name: &str, values: Vec<f64>) -> Self {
        self.inner
            .lock()
            .unwrap()
            .values
            .insert(name.to_string(), values);
        self
    }

    /// Datapoints returned for metrics without explicit values.
    #[must_use]
    pub fn with_default_values(self, values: Vec<f64>) -> Self {
        self.inner.lock().unwrap().default_values = values;
        self
    }

    /// Make `list_metrics` fail.
    #[must_use]
    pub fn failing_listing(self) -> Self {
        self.inner.lock().unwrap().fail_listing = true;
        self
    }

    /// Make `get_values` fail for `name`.
    #[must_use]
    pub fn failing_values(self, name: &str) -> Self {
        self.inner
            .lock()
            .unwrap()
            .failing_metrics
            .insert(name.to_string());
        self
    }

    /// Number of `list_metrics` calls.
    pub fn list_calls(&self) -> usize {
        self.inner.lock().unwrap().list_calls.len()
    }

    /// Recorded `list_metrics` calls.
    pub fn list_queries(&self) -> Vec<ListQuery> {
        self.inner.lock().unwrap().list_calls.clone()
    }

    /// Number of `get_values` calls.
    pub fn value_calls(&self) -> usize {
        self.inner.lock().unwrap().value_calls.len()
    }

    /// Recorded `get_values` calls, in order.
    pub fn value_queries(&self) -> Vec<ValueQuery> {
        self.inner.lock().unwrap().value_calls.clone()
    }

    /// Total backend calls of either kind.
    pub fn total_calls(&self) -> usize {
        self.list_calls() + self.value_calls()
    }
}

#[async_trait]
impl MetricsBackend for MockMetricsBackend {
    async fn list_metrics(
        &self,
        namespace: &str,
        name_filter: Option<&str>,
        dimensions: &DimensionSet,
    ) -> Result<Vec<MetricListing>, BackendError> {
        let mut inner = self.inner.lock().unwrap();
        inner.list_calls.push(ListQuery {
            namespace: namespace.to_string(),
            name_filter: name_filter.map(str::to_string),
            dimensions: dimensions.clone(),
        });

        if inner.fail_listing {
            return Err(BackendError::Unavailable("mock listing failure".to_string()));
        }

        Ok(inner
            .listings
            .iter()
            .filter(|listing| name_filter.is_none_or(|name| listing.name == name))
            .cloned()
            .collect())
    }

    async fn get_values(
        &self,
        namespace: &str,
        name: &str,
        dimensions: &DimensionSet,
        statistic: Statistic,
        period: Duration,
    ) -> Result<Vec<f64>, BackendError> {
        let mut inner = self.inner.lock().unwrap();
        inner.value_calls.push(ValueQuery {
            namespace: namespace.to_string(),
            name: name.to_string(),
            dimensions: dimensions.clone(),
            statistic,
            period,
        });

        if inner.failing_metrics.contains(name) {
            return Err(BackendError::QueryFailed(format!(
                "mock value failure for {}",
                name
            )));
        }

        Ok(inner
            .values
            .get(name)
            .cloned()
            .unwrap_or_else(|| inner.default_values.clone()))
    }
}
