//! In-memory logs backend.

use agent_validation::backend::{BackendError, LogsBackend};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

/// One recorded `get_records` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordQuery {
    pub group: String,
    pub stream: String,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

/// Mock logs backend serving canned records per group and stream.
///
/// Unknown streams return no records.
#[derive(Debug, Clone, Default)]
pub struct MockLogsBackend {
    inner: Arc<Mutex<MockLogsInner>>,
}

#[derive(Debug, Default)]
struct MockLogsInner {
    streams: HashMap<(String, String), Vec<String>>,
    failing_streams: HashSet<String>,
    calls: Vec<RecordQuery>,
}

impl MockLogsBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `records` for `group`/`stream`.
    #[must_use]
    pub fn with_stream<S: Into<String>>(self, group: &str, stream: &str, records: Vec<S>) -> Self {
        self.inner.lock().unwrap().streams.insert(
            (group.to_string(), stream.to_string()),
            records.into_iter().map(Into::into).collect(),
        );
        self
    }

    /// Make fetches of `stream` fail in every group.
    #[must_use]
    pub fn failing_stream(self, stream: &str) -> Self {
        self.inner
            .lock()
            .unwrap()
            .failing_streams
            .insert(stream.to_string());
        self
    }

    /// Recorded `get_records` calls, in order.
    pub fn queries(&self) -> Vec<RecordQuery> {
        self.inner.lock().unwrap().calls.clone()
    }

    /// Streams fetched, in order.
    pub fn fetched_streams(&self) -> Vec<String> {
        self.queries().into_iter().map(|q| q.stream).collect()
    }
}

#[async_trait]
impl LogsBackend for MockLogsBackend {
    async fn get_records(
        &self,
        group: &str,
        stream: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<String>, BackendError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(RecordQuery {
            group: group.to_string(),
            stream: stream.to_string(),
            start,
            end,
        });

        if inner.failing_streams.contains(stream) {
            return Err(BackendError::QueryFailed(format!(
                "mock failure for stream {}",
                stream
            )));
        }

        Ok(inner
            .streams
            .get(&(group.to_string(), stream.to_string()))
            .cloned()
            .unwrap_or_default())
    }
}
