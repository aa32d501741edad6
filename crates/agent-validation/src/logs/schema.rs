//! Record-type to JSON schema lookup.

use super::LogValidationError;
use jsonschema::Validator;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// Field naming a structured record's type.
pub const DEFAULT_DISCRIMINANT: &str = "Type";

/// Maps a record's type to the schema it must satisfy.
pub trait SchemaResolver: Send + Sync {
    /// Field holding the record type.
    fn discriminant(&self) -> &str;

    /// Compiled schema for `record_type`, if one is registered.
    fn resolve(&self, record_type: &str) -> Option<&Validator>;
}

/// Compiled schemas keyed by record type.
pub struct SchemaTable {
    discriminant: String,
    schemas: HashMap<String, Validator>,
}

impl SchemaTable {
    /// Empty table keyed on the `Type` field.
    pub fn new() -> Self {
        Self::with_discriminant(DEFAULT_DISCRIMINANT)
    }

    pub fn with_discriminant(discriminant: impl Into<String>) -> Self {
        Self {
            discriminant: discriminant.into(),
            schemas: HashMap::new(),
        }
    }

    /// Compile and register a schema, replacing any previous one for the
    /// same type.
    pub fn insert(
        &mut self,
        record_type: impl Into<String>,
        schema: &Value,
    ) -> Result<(), LogValidationError> {
        let record_type = record_type.into();
        let validator =
            jsonschema::validator_for(schema).map_err(|e| LogValidationError::InvalidSchema {
                record_type: record_type.clone(),
                message: e.to_string(),
            })?;
        self.schemas.insert(record_type, validator);
        Ok(())
    }

    pub fn with_schema(
        mut self,
        record_type: impl Into<String>,
        schema: &Value,
    ) -> Result<Self, LogValidationError> {
        self.insert(record_type, schema)?;
        Ok(self)
    }

    /// Build a table from `{record_type: schema}` pairs.
    pub fn from_schemas<I, K>(discriminant: &str, schemas: I) -> Result<Self, LogValidationError>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let mut table = Self::with_discriminant(discriminant);
        for (record_type, schema) in schemas {
            table.insert(record_type, &schema)?;
        }
        Ok(table)
    }

    /// Registered record types, sorted.
    pub fn record_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.schemas.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

impl Default for SchemaTable {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SchemaTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaTable")
            .field("discriminant", &self.discriminant)
            .field("record_types", &self.record_types())
            .finish()
    }
}

impl SchemaResolver for SchemaTable {
    fn discriminant(&self) -> &str {
        &self.discriminant
    }

    fn resolve(&self, record_type: &str) -> Option<&Validator> {
        self.schemas.get(record_type)
    }
}
