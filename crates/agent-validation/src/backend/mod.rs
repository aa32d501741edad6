//! Telemetry backends the validators read from.
//!
//! The validation engine only sees the [`MetricsBackend`] and
//! [`LogsBackend`] traits. HTTP implementations for Prometheus and Loki live
//! in the submodules; tests use the mocks from `validation-test-utils`.

pub mod connection;
pub mod loki;
pub mod prometheus;

pub use connection::{BackendConnection, ConnectionError};
pub use loki::LokiBackend;
pub use prometheus::PrometheusBackend;

use crate::dimension::DimensionSet;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Statistic period for standard-resolution metrics.
pub const MINUTE_STAT_PERIOD: Duration = Duration::from_secs(60);

/// Statistic period for high-resolution metrics.
pub const HIGH_RESOLUTION_STAT_PERIOD: Duration = Duration::from_secs(10);

/// Backend query errors.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("JSON deserialization failed: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Command `{command}` failed: {message}")]
    CommandFailed { command: String, message: String },

    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

/// Aggregation applied to datapoints within one period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Statistic {
    Average,
    Sum,
    SampleCount,
    Minimum,
    Maximum,
}

/// One metric as returned by a listing: its name and concrete dimensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricListing {
    pub name: String,
    pub dimensions: DimensionSet,
}

impl MetricListing {
    pub fn new(name: impl Into<String>, dimensions: DimensionSet) -> Self {
        Self {
            name: name.into(),
            dimensions,
        }
    }
}

/// Metric listing and value queries (enables mocking).
#[async_trait]
pub trait MetricsBackend: Send + Sync {
    /// List metrics in `namespace` carrying all of `dimensions`.
    ///
    /// `name_filter` restricts the listing to one metric name.
    async fn list_metrics(
        &self,
        namespace: &str,
        name_filter: Option<&str>,
        dimensions: &DimensionSet,
    ) -> Result<Vec<MetricListing>, BackendError>;

    /// Datapoints of one metric aggregated by `statistic` over `period`.
    async fn get_values(
        &self,
        namespace: &str,
        name: &str,
        dimensions: &DimensionSet,
        statistic: Statistic,
        period: Duration,
    ) -> Result<Vec<f64>, BackendError>;
}

/// Log record queries (enables mocking).
#[async_trait]
pub trait LogsBackend: Send + Sync {
    /// Raw records of one stream, oldest first.
    ///
    /// A missing `start` means "from the beginning of retention"; a missing
    /// `end` means "now".
    async fn get_records(
        &self,
        group: &str,
        stream: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<String>, BackendError>;
}
