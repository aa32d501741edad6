//! Log stream validation.
//!
//! A [`LogValidator`] fetches the records of one stream and runs a list of
//! [`LogAssertion`]s over them in order. The first failing assertion fails
//! the stream.

pub mod assertions;
pub mod schema;

pub use assertions::{
    ContainsSubstring, LogAssertion, MatchesSchema, NoDuplicates, NonEmpty, PerRecord, RecordCheck,
};
pub use schema::{SchemaResolver, SchemaTable, DEFAULT_DISCRIMINANT};

use crate::backend::{BackendError, LogsBackend};
use crate::status::TestResult;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Longest record excerpt carried in an error.
const RECORD_EXCERPT_CHARS: usize = 256;

/// Why a log stream failed validation.
#[derive(Debug, Error)]
pub enum LogValidationError {
    #[error("Failed to fetch records: {0}")]
    Fetch(#[from] BackendError),

    #[error("No log records found")]
    Empty,

    #[error("Duplicate log record: {record}")]
    Duplicate { record: String },

    #[error("Record is not valid JSON ({message}): {record}")]
    MalformedRecord { record: String, message: String },

    #[error("Record has no string field {field}: {record}")]
    MissingDiscriminant { field: String, record: String },

    #[error("No schema registered for record type {record_type}")]
    UnknownRecordType { record_type: String },

    #[error("Record of type {record_type} violates its schema: {message}")]
    SchemaViolation {
        record_type: String,
        message: String,
    },

    #[error("Record does not contain {expected}: {record}")]
    MissingSubstring { expected: String, record: String },

    #[error("Invalid schema for record type {record_type}: {message}")]
    InvalidSchema {
        record_type: String,
        message: String,
    },
}

/// Shorten a record for inclusion in an error message.
pub(crate) fn excerpt(record: &str) -> String {
    match record.char_indices().nth(RECORD_EXCERPT_CHARS) {
        Some((cut, _)) => format!("{}...", record.get(..cut).unwrap_or(record)),
        None => record.to_string(),
    }
}

/// Time range records are fetched over. Open ends are left to the backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogWindow {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl LogWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    /// Everything the backend still retains.
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// From `start` until now.
    pub fn since(start: DateTime<Utc>) -> Self {
        Self {
            start: Some(start),
            end: None,
        }
    }
}

/// Runs assertions over log streams from a [`LogsBackend`].
pub struct LogValidator<'a> {
    backend: &'a dyn LogsBackend,
}

impl<'a> LogValidator<'a> {
    pub fn new(backend: &'a dyn LogsBackend) -> Self {
        Self { backend }
    }

    /// Validate one stream. The result is named `name`.
    pub async fn validate(
        &self,
        name: &str,
        group: &str,
        stream: &str,
        window: LogWindow,
        assertions: &[Box<dyn LogAssertion>],
    ) -> TestResult {
        match self.check(group, stream, window, assertions).await {
            Ok(()) => TestResult::passed(name),
            Err(e) => {
                warn!(
                    target: "agent_validation.logs",
                    group = %group,
                    stream = %stream,
                    error = %e,
                    "Log validation failed"
                );
                TestResult::failed(name)
            }
        }
    }

    /// Fetch the stream and run every assertion, stopping at the first
    /// failure.
    pub async fn check(
        &self,
        group: &str,
        stream: &str,
        window: LogWindow,
        assertions: &[Box<dyn LogAssertion>],
    ) -> Result<(), LogValidationError> {
        let records = self
            .backend
            .get_records(group, stream, window.start, window.end)
            .await?;

        debug!(
            target: "agent_validation.logs",
            group = %group,
            stream = %stream,
            records = records.len(),
            "Fetched log records"
        );

        for assertion in assertions {
            assertion.check(&records)?;
        }

        Ok(())
    }

    /// Validate several streams of one group, failing at the first stream
    /// that fails. No streams at all is a failure.
    pub async fn validate_sources<S: AsRef<str>>(
        &self,
        name: &str,
        group: &str,
        streams: &[S],
        window: LogWindow,
        assertions: &[Box<dyn LogAssertion>],
    ) -> TestResult {
        if streams.is_empty() {
            warn!(
                target: "agent_validation.logs",
                group = %group,
                "No log sources to validate"
            );
            return TestResult::failed(name);
        }

        for stream in streams {
            let stream = stream.as_ref();
            if let Err(e) = self.check(group, stream, window, assertions).await {
                warn!(
                    target: "agent_validation.logs",
                    group = %group,
                    stream = %stream,
                    error = %e,
                    "Log source failed validation"
                );
                return TestResult::failed(name);
            }
        }

        info!(
            target: "agent_validation.logs",
            group = %group,
            sources = streams.len(),
            "All log sources passed"
        );
        TestResult::passed(name)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_excerpt_truncates_long_records() {
        let long = "x".repeat(1000);
        let short = excerpt(&long);
        assert_eq!(short.len(), RECORD_EXCERPT_CHARS + 3);
        assert!(short.ends_with("..."));

        assert_eq!(excerpt("short"), "short");
    }

    #[test]
    fn test_excerpt_respects_char_boundaries() {
        let record = "é".repeat(300);
        let short = excerpt(&record);
        assert_eq!(short.chars().count(), RECORD_EXCERPT_CHARS + 3);
    }

    #[test]
    fn test_window_constructors() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 1, 1, 0, 0).unwrap();

        assert_eq!(LogWindow::unbounded(), LogWindow::default());
        assert_eq!(LogWindow::since(start).end, None);

        let window = LogWindow::new(start, end);
        assert_eq!(window.start, Some(start));
        assert_eq!(window.end, Some(end));
    }
}
