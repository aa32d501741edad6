//! Pass/fail results and their aggregation.
//!
//! Results form a three-level hierarchy: a [`TestResult`] is one check, a
//! [`TestGroupResult`] is everything a single runner produced, and a
//! [`SuiteResult`] collects the groups of a whole suite run. Status always
//! derives upward: any failed check fails its group and the suite.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of a single check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Passed,
    Failed,
}

impl Status {
    /// `Passed` when `passed` is true, `Failed` otherwise.
    pub fn from_bool(passed: bool) -> Self {
        if passed {
            Status::Passed
        } else {
            Status::Failed
        }
    }

    pub fn is_passed(self) -> bool {
        self == Status::Passed
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Passed => f.write_str("PASSED"),
            Status::Failed => f.write_str("FAILED"),
        }
    }
}

/// Result of one named check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResult {
    pub name: String,
    pub status: Status,
}

impl TestResult {
    pub fn new(name: impl Into<String>, status: Status) -> Self {
        Self {
            name: name.into(),
            status,
        }
    }

    pub fn passed(name: impl Into<String>) -> Self {
        Self::new(name, Status::Passed)
    }

    pub fn failed(name: impl Into<String>) -> Self {
        Self::new(name, Status::Failed)
    }
}

/// All results produced by one test runner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestGroupResult {
    pub name: String,
    pub results: Vec<TestResult>,
}

impl TestGroupResult {
    pub fn new(name: impl Into<String>, results: Vec<TestResult>) -> Self {
        Self {
            name: name.into(),
            results,
        }
    }

    /// Failed if any contained result failed.
    pub fn status(&self) -> Status {
        Status::from_bool(self.results.iter().all(|r| r.status.is_passed()))
    }
}

/// Ordered group results of a suite run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuiteResult {
    groups: Vec<TestGroupResult>,
}

impl SuiteResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, group: TestGroupResult) {
        self.groups.push(group);
    }

    pub fn groups(&self) -> &[TestGroupResult] {
        &self.groups
    }

    /// Failed if any result across any group failed.
    ///
    /// An empty suite is `Passed`.
    pub fn status(&self) -> Status {
        Status::from_bool(self.groups.iter().all(|g| g.status().is_passed()))
    }

    /// Number of failed results across all groups.
    pub fn failed_count(&self) -> usize {
        self.groups
            .iter()
            .flat_map(|g| g.results.iter())
            .filter(|r| !r.status.is_passed())
            .count()
    }
}

const TABLE_WIDTH: usize = 72;
const NAME_COLUMN_WIDTH: usize = 60;

/// Summary table printed at suite teardown.
impl fmt::Display for SuiteResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(TABLE_WIDTH);
        writeln!(f, "{rule}")?;
        for group in &self.groups {
            writeln!(
                f,
                "{:<width$}| {}",
                group.name,
                group.status(),
                width = NAME_COLUMN_WIDTH
            )?;
            for result in &group.results {
                writeln!(
                    f,
                    "  {:<width$}| {}",
                    result.name,
                    result.status,
                    width = NAME_COLUMN_WIDTH - 2
                )?;
            }
            writeln!(f, "{}", "-".repeat(TABLE_WIDTH))?;
        }
        writeln!(f, "Suite status: {}", self.status())?;
        write!(f, "{rule}")
    }
}
