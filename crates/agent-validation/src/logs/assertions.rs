//! Composable checks over the records of one log stream.

use super::schema::SchemaResolver;
use super::{excerpt, LogValidationError};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

/// A check over every record of a stream.
pub trait LogAssertion: Send + Sync {
    fn check(&self, records: &[String]) -> Result<(), LogValidationError>;
}

/// A check applied to each record on its own.
pub trait RecordCheck: Send + Sync {
    fn check(&self, record: &str) -> Result<(), LogValidationError>;
}

/// Fails when the stream has no records.
#[derive(Debug, Clone, Copy, Default)]
pub struct NonEmpty;

impl LogAssertion for NonEmpty {
    fn check(&self, records: &[String]) -> Result<(), LogValidationError> {
        if records.is_empty() {
            return Err(LogValidationError::Empty);
        }
        Ok(())
    }
}

/// Fails when two records are byte-identical.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDuplicates;

impl LogAssertion for NoDuplicates {
    fn check(&self, records: &[String]) -> Result<(), LogValidationError> {
        let mut seen = HashSet::with_capacity(records.len());
        for record in records {
            if !seen.insert(record.as_str()) {
                return Err(LogValidationError::Duplicate {
                    record: excerpt(record),
                });
            }
        }
        Ok(())
    }
}

/// Runs record checks against every record, in order.
#[derive(Default)]
pub struct PerRecord {
    checks: Vec<Box<dyn RecordCheck>>,
}

impl PerRecord {
    pub fn new(checks: Vec<Box<dyn RecordCheck>>) -> Self {
        Self { checks }
    }

    pub fn with(mut self, check: impl RecordCheck + 'static) -> Self {
        self.checks.push(Box::new(check));
        self
    }
}

impl LogAssertion for PerRecord {
    fn check(&self, records: &[String]) -> Result<(), LogValidationError> {
        for record in records {
            for check in &self.checks {
                check.check(record)?;
            }
        }
        Ok(())
    }
}

/// Requires each record to contain a fixed substring.
#[derive(Debug, Clone)]
pub struct ContainsSubstring {
    expected: String,
}

impl ContainsSubstring {
    pub fn new(expected: impl Into<String>) -> Self {
        Self {
            expected: expected.into(),
        }
    }

    /// `"<field>":"<value>"` as it appears in compact JSON.
    pub fn json_field(field: &str, value: &str) -> Self {
        Self::new(format!("\"{}\":\"{}\"", field, value))
    }
}

impl RecordCheck for ContainsSubstring {
    fn check(&self, record: &str) -> Result<(), LogValidationError> {
        if record.contains(&self.expected) {
            return Ok(());
        }
        Err(LogValidationError::MissingSubstring {
            expected: self.expected.clone(),
            record: excerpt(record),
        })
    }
}

/// Validates each record against the schema for its type.
///
/// Records must be JSON objects carrying the resolver's discriminant field.
/// A record whose type has no schema fails.
#[derive(Clone)]
pub struct MatchesSchema {
    resolver: Arc<dyn SchemaResolver>,
}

impl MatchesSchema {
    pub fn new(resolver: Arc<dyn SchemaResolver>) -> Self {
        Self { resolver }
    }
}

impl RecordCheck for MatchesSchema {
    fn check(&self, record: &str) -> Result<(), LogValidationError> {
        let value: Value =
            serde_json::from_str(record).map_err(|e| LogValidationError::MalformedRecord {
                record: excerpt(record),
                message: e.to_string(),
            })?;

        let field = self.resolver.discriminant();
        let record_type = value.get(field).and_then(Value::as_str).ok_or_else(|| {
            LogValidationError::MissingDiscriminant {
                field: field.to_string(),
                record: excerpt(record),
            }
        })?;

        let validator = self.resolver.resolve(record_type).ok_or_else(|| {
            LogValidationError::UnknownRecordType {
                record_type: record_type.to_string(),
            }
        })?;

        validator
            .validate(&value)
            .map_err(|e| LogValidationError::SchemaViolation {
                record_type: record_type.to_string(),
                message: e.to_string(),
            })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::logs::SchemaTable;
    use serde_json::json;

    fn records(lines: &[&str]) -> Vec<String> {
        lines.iter().map(|l| l.to_string()).collect()
    }

    fn node_schema() -> Arc<dyn SchemaResolver> {
        Arc::new(
            SchemaTable::new()
                .with_schema(
                    "Node",
                    &json!({
                        "type": "object",
                        "required": ["Type", "ClusterName", "node_cpu_utilization"],
                        "properties": {
                            "node_cpu_utilization": {"type": "number"}
                        }
                    }),
                )
                .unwrap(),
        )
    }

    #[test]
    fn test_non_empty() {
        assert!(matches!(
            NonEmpty.check(&[]),
            Err(LogValidationError::Empty)
        ));
        assert!(NonEmpty.check(&records(&["a"])).is_ok());
    }

    #[test]
    fn test_byte_identical_records_are_duplicates() {
        let err = NoDuplicates
            .check(&records(&[r#"{"a":1}"#, r#"{"b":2}"#, r#"{"a":1}"#]))
            .unwrap_err();
        assert!(matches!(err, LogValidationError::Duplicate { .. }));
    }

    #[test]
    fn test_one_byte_difference_is_not_a_duplicate() {
        assert!(NoDuplicates
            .check(&records(&[r#"{"a":1}"#, r#"{"a":2}"#]))
            .is_ok());
        assert!(NoDuplicates
            .check(&records(&[r#"{"a":1}"#, r#"{"a":1} "#]))
            .is_ok());
    }

    #[test]
    fn test_contains_substring() {
        let check = ContainsSubstring::json_field("ClusterName", "demo");
        assert!(check
            .check(r#"{"Type":"Node","ClusterName":"demo"}"#)
            .is_ok());

        let err = check
            .check(r#"{"Type":"Node","ClusterName":"other"}"#)
            .unwrap_err();
        let cluster_field = r#""ClusterName":"demo""#;
        assert!(matches!(
            err,
            LogValidationError::MissingSubstring { expected, .. } if expected == cluster_field
        ));
    }

    #[test]
    fn test_schema_match_passes_valid_record() {
        let check = MatchesSchema::new(node_schema());
        assert!(check
            .check(r#"{"Type":"Node","ClusterName":"demo","node_cpu_utilization":12.5}"#)
            .is_ok());
    }

    #[test]
    fn test_unknown_record_type_fails() {
        let check = MatchesSchema::new(node_schema());
        let err = check
            .check(r#"{"Type":"Mystery","ClusterName":"demo"}"#)
            .unwrap_err();
        assert!(matches!(
            err,
            LogValidationError::UnknownRecordType { record_type } if record_type == "Mystery"
        ));
    }

    #[test]
    fn test_schema_violation_fails() {
        let check = MatchesSchema::new(node_schema());
        let err = check
            .check(r#"{"Type":"Node","ClusterName":"demo","node_cpu_utilization":"high"}"#)
            .unwrap_err();
        assert!(matches!(err, LogValidationError::SchemaViolation { .. }));
    }

    #[test]
    fn test_non_json_record_fails() {
        let check = MatchesSchema::new(node_schema());
        assert!(matches!(
            check.check("plain text line"),
            Err(LogValidationError::MalformedRecord { .. })
        ));
    }

    #[test]
    fn test_missing_discriminant_fails() {
        let check = MatchesSchema::new(node_schema());
        assert!(matches!(
            check.check(r#"{"ClusterName":"demo"}"#),
            Err(LogValidationError::MissingDiscriminant { field, .. }) if field == "Type"
        ));
    }

    #[test]
    fn test_per_record_stops_at_first_failure() {
        let assertion = PerRecord::default()
            .with(MatchesSchema::new(node_schema()))
            .with(ContainsSubstring::json_field("ClusterName", "demo"));

        let good = r#"{"Type":"Node","ClusterName":"demo","node_cpu_utilization":1}"#;
        let bad = r#"{"Type":"Node","ClusterName":"prod","node_cpu_utilization":1}"#;

        assert!(assertion.check(&records(&[good])).is_ok());
        assert!(matches!(
            assertion.check(&records(&[good, bad])),
            Err(LogValidationError::MissingSubstring { .. })
        ));
    }
}
