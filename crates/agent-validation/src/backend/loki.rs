//! Loki-backed [`LogsBackend`].
//!
//! A log group and stream are addressed by two stream labels
//! (`log_group` and `log_stream` by default).

use super::{BackendError, LogsBackend};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

/// Default label carrying the log group.
pub const DEFAULT_GROUP_LABEL: &str = "log_group";

/// Default label carrying the log stream.
pub const DEFAULT_STREAM_LABEL: &str = "log_stream";

/// Default maximum number of records returned per query.
pub const DEFAULT_LIMIT: u32 = 5000;

/// Days looked back when no start time is given.
///
/// 29 days stays inside Loki's default `max_query_length` (30d1h).
const RETENTION_WINDOW_DAYS: i64 = 29;

#[derive(Debug, Deserialize)]
struct QueryRangeResponse {
    status: String,
    data: StreamsData,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StreamsData {
    result_type: String,
    result: Vec<StreamResult>,
}

#[derive(Debug, Deserialize)]
struct StreamResult {
    /// `[timestamp_ns, line]` pairs.
    values: Vec<(String, String)>,
}

/// Client for a Loki server.
pub struct LokiBackend {
    base_url: String,
    http_client: Client,
    group_label: String,
    stream_label: String,
    limit: u32,
}

impl LokiBackend {
    pub fn new(base_url: impl Into<String>, http_client: Client) -> Self {
        Self {
            base_url: base_url.into(),
            http_client,
            group_label: DEFAULT_GROUP_LABEL.to_string(),
            stream_label: DEFAULT_STREAM_LABEL.to_string(),
            limit: DEFAULT_LIMIT,
        }
    }

    /// Address groups and streams through different labels.
    pub fn with_labels(
        mut self,
        group_label: impl Into<String>,
        stream_label: impl Into<String>,
    ) -> Self {
        self.group_label = group_label.into();
        self.stream_label = stream_label.into();
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    fn stream_selector(&self, group: &str, stream: &str) -> String {
        format!(
            "{{{}=\"{}\",{}=\"{}\"}}",
            self.group_label,
            escape(group),
            self.stream_label,
            escape(stream)
        )
    }
}

#[async_trait]
impl LogsBackend for LokiBackend {
    async fn get_records(
        &self,
        group: &str,
        stream: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<String>, BackendError> {
        let end = end.unwrap_or_else(Utc::now);
        let start = start.unwrap_or(end - chrono::Duration::days(RETENTION_WINDOW_DAYS));
        let query = self.stream_selector(group, stream);
        debug!(target: "agent_validation.backend", query = %query, "Fetching log records");

        let url = format!("{}/loki/api/v1/query_range", self.base_url);
        let response = self
            .http_client
            .get(&url)
            .query(&[
                ("query", query),
                ("start", nanos(start).to_string()),
                ("end", nanos(end).to_string()),
                ("limit", self.limit.to_string()),
                ("direction", "forward".to_string()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(BackendError::QueryFailed(format!(
                "Status: {}",
                response.status()
            )));
        }

        let body = response.json::<QueryRangeResponse>().await?;
        if body.status != "success" {
            return Err(BackendError::QueryFailed(format!(
                "Query status: {}",
                body.status
            )));
        }
        if body.data.result_type != "streams" {
            return Err(BackendError::QueryFailed(format!(
                "Unexpected result type: {}",
                body.data.result_type
            )));
        }

        let mut entries: Vec<(String, String)> = body
            .data
            .result
            .into_iter()
            .flat_map(|s| s.values)
            .collect();
        // Numeric order across streams: a shorter decimal timestamp is always smaller.
        entries.sort_by(|a, b| a.0.len().cmp(&b.0.len()).then_with(|| a.0.cmp(&b.0)));

        Ok(entries.into_iter().map(|(_, line)| line).collect())
    }
}

fn nanos(time: DateTime<Utc>) -> i64 {
    time.timestamp_nanos_opt().unwrap_or(i64::MAX)
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
