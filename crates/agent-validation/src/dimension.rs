//! Dimensions, canonical dimension keys, and runtime dimension resolution.
//!
//! A metric is identified in the backend by its name plus a set of
//! dimensions. Validation groups metrics by the *names* of their dimensions,
//! so a set such as `{ClusterName=x, NodeName=y}` and
//! `{NodeName=z, ClusterName=w}` share the key `ClusterName-NodeName`.
//!
//! Dimension names are sorted before joining, and any name containing the
//! delimiter or the escape character is escaped, so two different name sets
//! never produce the same key. An empty name is written as `\0`, which keeps
//! `[""]` apart from the empty set.

use crate::backend::BackendError;
use crate::environment::{ComputeType, EnvironmentMetadata, MetaData};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

/// Delimiter between dimension names in a [`DimensionKey`].
pub const DIMENSION_DELIMITER: char = '-';

const DELIMITER_STR: &str = "-";

const ESCAPE: char = '\\';

/// Escaped form of an empty dimension name.
const EMPTY_NAME: &str = "\\0";

const EMPTY_MARKER: char = '0';

/// Dimension name for the EC2 instance identifier.
pub const INSTANCE_ID: &str = "InstanceId";

/// Dimension name for the EC2 instance type.
pub const INSTANCE_TYPE: &str = "InstanceType";

/// Dimension name for the cluster identifier.
pub const CLUSTER_NAME: &str = "ClusterName";

/// A resolved dimension.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Dimension {
    pub name: String,
    pub value: String,
}

impl Dimension {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Ordered set of resolved dimensions attached to one metric.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DimensionSet(Vec<Dimension>);

impl DimensionSet {
    pub fn new(dimensions: Vec<Dimension>) -> Self {
        Self(dimensions)
    }

    pub fn push(&mut self, dimension: Dimension) {
        self.0.push(dimension);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Dimension> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Value of the first dimension called `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|d| d.name == name)
            .map(|d| d.value.as_str())
    }

    /// Canonical key of this set's dimension names.
    pub fn key(&self) -> DimensionKey {
        DimensionKey::from_names(self.0.iter().map(|d| d.name.as_str()))
    }
}

impl FromIterator<Dimension> for DimensionSet {
    fn from_iter<I: IntoIterator<Item = Dimension>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a DimensionSet {
    type Item = &'a Dimension;
    type IntoIter = std::slice::Iter<'a, Dimension>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Canonical string identifying a combination of dimension names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DimensionKey(String);

impl DimensionKey {
    /// Build the key for a multiset of dimension names, in any order.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut names: Vec<S> = names.into_iter().collect();
        names.sort_by(|a, b| a.as_ref().cmp(b.as_ref()));

        let escaped: Vec<Cow<'_, str>> = names.iter().map(|n| escape_name(n.as_ref())).collect();
        Self(escaped.join(DELIMITER_STR))
    }

    /// Parse a delimiter-joined key as written in schema tables.
    ///
    /// The names are re-sorted, so `"NodeName-ClusterName"` and
    /// `"ClusterName-NodeName"` parse to the same key.
    pub fn parse(raw: &str) -> Self {
        Self::from_names(split_key(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Unescaped dimension names in canonical order.
    pub fn names(&self) -> Vec<String> {
        split_key(&self.0)
    }
}

impl fmt::Display for DimensionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for DimensionKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for DimensionKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(DimensionKey::parse(&raw))
    }
}

fn escape_name(name: &str) -> Cow<'_, str> {
    if name.is_empty() {
        return Cow::Borrowed(EMPTY_NAME);
    }
    if !name.contains([DIMENSION_DELIMITER, ESCAPE]) {
        return Cow::Borrowed(name);
    }

    let mut escaped = String::with_capacity(name.len() + 2);
    for c in name.chars() {
        if c == DIMENSION_DELIMITER || c == ESCAPE {
            escaped.push(ESCAPE);
        }
        escaped.push(c);
    }
    Cow::Owned(escaped)
}

fn split_key(raw: &str) -> Vec<String> {
    if raw.is_empty() {
        return Vec::new();
    }

    let mut names = Vec::new();
    let mut current = String::new();
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        match c {
            ESCAPE => match chars.next() {
                Some(EMPTY_MARKER) => {}
                Some(escaped) => current.push(escaped),
                None => current.push(ESCAPE),
            },
            DIMENSION_DELIMITER => names.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    names.push(current);
    names
}

/// Value half of a [`DimensionInstruction`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DimensionValue {
    Known(String),
    /// Resolved from environment metadata when dimensions are built.
    Unknown,
}

/// Abstract dimension to be turned into a concrete [`Dimension`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DimensionInstruction {
    pub key: String,
    pub value: DimensionValue,
}

impl DimensionInstruction {
    pub fn known(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: DimensionValue::Known(value.into()),
        }
    }

    pub fn unknown(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: DimensionValue::Unknown,
        }
    }
}

/// Why an unknown dimension value could not be resolved.
#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("No resolver for dimension {0}")]
    Unsupported(String),

    #[error("Cluster name is not available for compute type {0}")]
    NoCluster(ComputeType),

    #[error("Metadata lookup failed: {0}")]
    Metadata(#[from] BackendError),
}

/// Resolves dimension instructions against the running environment.
#[derive(Clone)]
pub struct DimensionFactory {
    env: MetaData,
    metadata: Arc<dyn EnvironmentMetadata>,
}

impl DimensionFactory {
    pub fn new(env: MetaData, metadata: Arc<dyn EnvironmentMetadata>) -> Self {
        Self { env, metadata }
    }

    /// Resolve every instruction.
    ///
    /// Known values pass through unchanged. Unknown values that cannot be
    /// resolved are left out of the returned set and reported in the second
    /// element instead.
    pub async fn get_dimensions(
        &self,
        instructions: &[DimensionInstruction],
    ) -> (DimensionSet, Vec<DimensionInstruction>) {
        let mut dimensions = DimensionSet::default();
        let mut failed = Vec::new();

        for instruction in instructions {
            match &instruction.value {
                DimensionValue::Known(value) => {
                    dimensions.push(Dimension::new(&instruction.key, value));
                }
                DimensionValue::Unknown => match self.resolve(&instruction.key).await {
                    Ok(value) => dimensions.push(Dimension::new(&instruction.key, value)),
                    Err(e) => {
                        warn!(
                            target: "agent_validation.dimension",
                            dimension = %instruction.key,
                            error = %e,
                            "Failed to resolve dimension"
                        );
                        failed.push(instruction.clone());
                    }
                },
            }
        }

        (dimensions, failed)
    }

    async fn resolve(&self, key: &str) -> Result<String, ResolutionError> {
        match key {
            INSTANCE_ID => Ok(self.metadata.instance_id().await?),
            INSTANCE_TYPE => Ok(self.metadata.instance_type().await?),
            CLUSTER_NAME => self
                .env
                .cluster_name()
                .map(str::to_string)
                .ok_or_else(|| ResolutionError::NoCluster(self.env.compute_type.clone())),
            other => Err(ResolutionError::Unsupported(other.to_string())),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::environment::InstanceInfo;
    use async_trait::async_trait;

    struct StaticMetadata {
        instance_id: Option<&'static str>,
    }

    #[async_trait]
    impl EnvironmentMetadata for StaticMetadata {
        async fn instance_id(&self) -> Result<String, BackendError> {
            self.instance_id
                .map(str::to_string)
                .ok_or_else(|| BackendError::Unavailable("no instance metadata".to_string()))
        }

        async fn instance_type(&self) -> Result<String, BackendError> {
            Ok("t3.medium".to_string())
        }

        async fn cluster_instances(
            &self,
            _cluster_name: &str,
        ) -> Result<Vec<InstanceInfo>, BackendError> {
            Ok(Vec::new())
        }
    }

    fn factory(env: MetaData, instance_id: Option<&'static str>) -> DimensionFactory {
        DimensionFactory::new(env, Arc::new(StaticMetadata { instance_id }))
    }

    #[test]
    fn test_key_is_order_independent() {
        let names = ["NodeName", "ClusterName", "InstanceId"];
        let expected = DimensionKey::from_names(["ClusterName", "InstanceId", "NodeName"]);

        let permutations = [
            [0, 1, 2],
            [0, 2, 1],
            [1, 0, 2],
            [1, 2, 0],
            [2, 0, 1],
            [2, 1, 0],
        ];
        for order in permutations {
            let permuted: Vec<&str> = order.iter().filter_map(|&i| names.get(i).copied()).collect();
            assert_eq!(DimensionKey::from_names(permuted), expected);
        }
        assert_eq!(expected.as_str(), "ClusterName-InstanceId-NodeName");
    }

    #[test]
    fn test_dimension_set_key_ignores_values() {
        let a = DimensionSet::new(vec![
            Dimension::new("NodeName", "node-a"),
            Dimension::new("ClusterName", "x"),
        ]);
        let b = DimensionSet::new(vec![
            Dimension::new("ClusterName", "y"),
            Dimension::new("NodeName", "node-b"),
        ]);
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn test_delimiter_in_name_does_not_collide() {
        let joined = DimensionKey::from_names(["A-B"]);
        let split = DimensionKey::from_names(["A", "B"]);
        assert_ne!(joined, split);
        assert_eq!(joined.names(), vec!["A-B".to_string()]);
        assert_eq!(split.names(), vec!["A".to_string(), "B".to_string()]);
    }

    #[test]
    fn test_parse_round_trips_escaped_names() {
        let key = DimensionKey::from_names(["Zone", "weird-name", r"back\slash"]);
        assert_eq!(DimensionKey::parse(key.as_str()), key);
    }

    #[test]
    fn test_empty_name_is_distinct_from_no_names() {
        let none = DimensionKey::from_names(Vec::<&str>::new());
        let empty = DimensionKey::from_names([""]);
        assert_ne!(none, empty);
        assert_eq!(empty.names(), vec![String::new()]);
        assert_eq!(DimensionKey::parse(empty.as_str()), empty);

        let with_empty = DimensionKey::from_names(["", "ClusterName"]);
        assert_ne!(with_empty, DimensionKey::from_names(["ClusterName"]));
        assert_eq!(
            with_empty.names(),
            vec![String::new(), "ClusterName".to_string()]
        );
    }

    #[test]
    fn test_literal_zero_after_escape_is_not_an_empty_name() {
        let key = DimensionKey::from_names([r"\0"]);
        assert_eq!(key.names(), vec![r"\0".to_string()]);
        assert_ne!(key, DimensionKey::from_names([""]));
    }

    #[test]
    fn test_parse_resorts_names() {
        assert_eq!(
            DimensionKey::parse("NodeName-ClusterName"),
            DimensionKey::parse("ClusterName-NodeName")
        );
        assert!(DimensionKey::parse("").names().is_empty());
    }

    #[tokio::test]
    async fn test_known_values_pass_through() {
        let factory = factory(MetaData::ec2(), None);
        let (dims, failed) = factory
            .get_dimensions(&[DimensionInstruction::known("Service", "billing")])
            .await;

        assert!(failed.is_empty());
        assert_eq!(dims.get("Service"), Some("billing"));
    }

    #[tokio::test]
    async fn test_unknown_instance_id_resolves_from_metadata() {
        let factory = factory(MetaData::ec2(), Some("i-0123456789abcdef0"));
        let (dims, failed) = factory
            .get_dimensions(&[DimensionInstruction::unknown(INSTANCE_ID)])
            .await;

        assert!(failed.is_empty());
        assert_eq!(dims.get(INSTANCE_ID), Some("i-0123456789abcdef0"));
    }

    #[tokio::test]
    async fn test_resolution_failure_is_recorded_not_fatal() {
        let factory = factory(MetaData::ec2(), None);
        let instructions = [
            DimensionInstruction::unknown(INSTANCE_ID),
            DimensionInstruction::known("Service", "billing"),
            DimensionInstruction::unknown("NoSuchDimension"),
        ];
        let (dims, failed) = factory.get_dimensions(&instructions).await;

        assert_eq!(dims.len(), 1);
        assert_eq!(dims.get("Service"), Some("billing"));
        assert_eq!(
            failed,
            vec![
                DimensionInstruction::unknown(INSTANCE_ID),
                DimensionInstruction::unknown("NoSuchDimension"),
            ]
        );
    }

    #[tokio::test]
    async fn test_cluster_name_requires_cluster_environment() {
        let (_, failed) = factory(MetaData::ec2(), None)
            .get_dimensions(&[DimensionInstruction::unknown(CLUSTER_NAME)])
            .await;
        assert_eq!(failed.len(), 1);

        let (dims, failed) = factory(MetaData::eks("demo"), None)
            .get_dimensions(&[DimensionInstruction::unknown(CLUSTER_NAME)])
            .await;
        assert!(failed.is_empty());
        assert_eq!(dims.get(CLUSTER_NAME), Some("demo"));
    }
}
