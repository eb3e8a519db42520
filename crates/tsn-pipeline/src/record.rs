//! Raw and validated record types
//!
//! A [`RawRecord`] is the untyped unit a fetcher produces: a mapping of
//! source field names to JSON values, ephemeral within a single run.
//! Validation wraps it into a [`ValidatedRecord`] carrying the outcome
//! and the coerced field values, keeping the original for traceability.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Source-specific mapping of field name to untyped value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    /// Field name -> untyped value, as produced by the source
    pub fields: Map<String, Value>,

    /// Position within the source (row number, item index) for
    /// rejection reporting
    pub source_offset: Option<u64>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style field insertion, used by fetchers
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn with_offset(mut self, offset: u64) -> Self {
        self.source_offset = Some(offset);
        self
    }

    /// Get a field value
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Get a field as a trimmed string, if it is a string
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str).map(str::trim)
    }
}

/// Outcome of validating a single raw record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "reason")]
pub enum ValidationStatus {
    /// Conformed to the schema as-is
    Passed,
    /// Accepted after one or more type coercions or default fills
    Coerced,
    /// Nonconforming; excluded from the rest of the pipeline
    Rejected(String),
}

impl ValidationStatus {
    pub fn as_str(&self) -> &str {
        match self {
            ValidationStatus::Passed => "passed",
            ValidationStatus::Coerced => "coerced",
            ValidationStatus::Rejected(_) => "rejected",
        }
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, ValidationStatus::Rejected(_))
    }
}

/// A raw record after schema enforcement
///
/// Carries the original record untouched plus the field map with
/// coercions and defaults applied. Downstream stages read only the
/// validated fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatedRecord {
    /// The original record, for traceability
    pub raw: RawRecord,

    /// Field values after coercion and default filling
    pub fields: Map<String, Value>,

    pub status: ValidationStatus,
}

impl ValidatedRecord {
    /// Get a validated field value
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Get a validated field as a trimmed string
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str).map(str::trim)
    }

    /// Get a validated field as a float
    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.fields.get(name).and_then(Value::as_f64)
    }
}
