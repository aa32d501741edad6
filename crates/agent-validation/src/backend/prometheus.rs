//! Prometheus-backed [`MetricsBackend`].
//!
//! Metric names map to `__name__`, dimensions map to labels, and the
//! namespace maps to a configurable label (the scrape `job` by default).
//! Listings come from `/api/v1/series`; values from `/api/v1/query_range`
//! with a `<stat>_over_time` aggregation per period.
//!
//! Target labels Prometheus attaches to every series (`instance` by default)
//! are dropped from listings so dimension keys only carry the metric's own
//! dimensions.

use super::{BackendError, MetricListing, MetricsBackend, Statistic};
use crate::dimension::{Dimension, DimensionSet};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;
use tracing::debug;

/// Label carrying the metric name.
const NAME_LABEL: &str = "__name__";

/// Default label the namespace is matched against.
pub const DEFAULT_NAMESPACE_LABEL: &str = "job";

/// Target labels stripped from listed series by default.
pub const DEFAULT_IGNORED_LABELS: &[&str] = &["instance"];

/// Default window listings and value queries look back over.
pub const DEFAULT_LOOKBACK: Duration = Duration::from_secs(10 * 60);

/// Response envelope shared by the Prometheus HTTP API.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    status: String,
    data: Option<T>,
    #[serde(default)]
    error: Option<String>,
}

/// Range query response data.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryData {
    result_type: String,
    result: Vec<RangeResult>,
}

/// One series of a range query.
#[derive(Debug, Deserialize)]
struct RangeResult {
    #[serde(default)]
    values: Vec<(f64, String)>,
}

/// Client for a Prometheus server.
pub struct PrometheusBackend {
    base_url: String,
    http_client: Client,
    namespace_label: String,
    ignored_labels: BTreeSet<String>,
    lookback: Duration,
}

impl PrometheusBackend {
    pub fn new(base_url: impl Into<String>, http_client: Client) -> Self {
        Self {
            base_url: base_url.into(),
            http_client,
            namespace_label: DEFAULT_NAMESPACE_LABEL.to_string(),
            ignored_labels: DEFAULT_IGNORED_LABELS
                .iter()
                .map(|label| label.to_string())
                .collect(),
            lookback: DEFAULT_LOOKBACK,
        }
    }

    /// Match the namespace against `label` instead of `job`.
    pub fn with_namespace_label(mut self, label: impl Into<String>) -> Self {
        self.namespace_label = label.into();
        self
    }

    /// Replace the set of target labels stripped from listings.
    pub fn with_ignored_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignored_labels = labels.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_lookback(mut self, lookback: Duration) -> Self {
        self.lookback = lookback;
        self
    }

    fn selector(&self, namespace: &str, name: Option<&str>, dimensions: &DimensionSet) -> String {
        let mut matchers = Vec::with_capacity(dimensions.len() + 2);
        if let Some(name) = name {
            matchers.push(format!("{}=\"{}\"", NAME_LABEL, escape_label_value(name)));
        }
        if !namespace.is_empty() {
            matchers.push(format!(
                "{}=\"{}\"",
                self.namespace_label,
                escape_label_value(namespace)
            ));
        }
        for dimension in dimensions {
            matchers.push(format!(
                "{}=\"{}\"",
                dimension.name,
                escape_label_value(&dimension.value)
            ));
        }
        format!("{{{}}}", matchers.join(","))
    }

    fn time_range(&self) -> (i64, i64) {
        let end = Utc::now().timestamp();
        let lookback = i64::try_from(self.lookback.as_secs()).unwrap_or(i64::MAX);
        (end.saturating_sub(lookback), end)
    }

    async fn get<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, BackendError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.http_client.get(&url).query(params).send().await?;

        if !response.status().is_success() {
            return Err(BackendError::QueryFailed(format!(
                "Status: {}",
                response.status()
            )));
        }

        let body = response.json::<ApiResponse<T>>().await?;
        if body.status != "success" {
            return Err(BackendError::QueryFailed(format!(
                "Query status: {} ({})",
                body.status,
                body.error.unwrap_or_default()
            )));
        }

        body.data
            .ok_or_else(|| BackendError::QueryFailed("Response has no data".to_string()))
    }
}

#[async_trait]
impl MetricsBackend for PrometheusBackend {
    async fn list_metrics(
        &self,
        namespace: &str,
        name_filter: Option<&str>,
        dimensions: &DimensionSet,
    ) -> Result<Vec<MetricListing>, BackendError> {
        let selector = self.selector(namespace, name_filter, dimensions);
        let (start, end) = self.time_range();
        debug!(target: "agent_validation.backend", selector = %selector, "Listing series");

        let series: Vec<BTreeMap<String, String>> = self
            .get(
                "/api/v1/series",
                &[
                    ("match[]", selector),
                    ("start", start.to_string()),
                    ("end", end.to_string()),
                ],
            )
            .await?;

        Ok(series
            .into_iter()
            .filter_map(|mut labels| {
                let name = labels.remove(NAME_LABEL)?;
                labels.remove(&self.namespace_label);
                labels.retain(|label, _| !self.ignored_labels.contains(label));
                let dimensions = labels
                    .into_iter()
                    .map(|(name, value)| Dimension::new(name, value))
                    .collect();
                Some(MetricListing::new(name, dimensions))
            })
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
        let period_secs = period.as_secs().max(1);
        let query = format!(
            "{}({}[{}s])",
            over_time_function(statistic),
            self.selector(namespace, Some(name), dimensions),
            period_secs
        );
        let (start, end) = self.time_range();
        debug!(target: "agent_validation.backend", query = %query, "Fetching metric values");

        let data: QueryData = self
            .get(
                "/api/v1/query_range",
                &[
                    ("query", query),
                    ("start", start.to_string()),
                    ("end", end.to_string()),
                    ("step", period_secs.to_string()),
                ],
            )
            .await?;

        if data.result_type != "matrix" {
            return Err(BackendError::QueryFailed(format!(
                "Unexpected result type: {}",
                data.result_type
            )));
        }

        data.result
            .into_iter()
            .flat_map(|series| series.values)
            .map(|(_, value)| {
                value.parse::<f64>().map_err(|e| {
                    BackendError::QueryFailed(format!("Invalid sample value '{}': {}", value, e))
                })
            })
            .collect()
    }
}

fn over_time_function(statistic: Statistic) -> &'static str {
    match statistic {
        Statistic::Average => "avg_over_time",
        Statistic::Sum => "sum_over_time",
        Statistic::SampleCount => "count_over_time",
        Statistic::Minimum => "min_over_time",
        Statistic::Maximum => "max_over_time",
    }
}

fn escape_label_value(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}
