//! Declared schemas and record validation
//!
//! A [`Schema`] enumerates the fields a source is expected to produce,
//! with per-field type, nullability, optional default, and optional
//! numeric range. Validation never aborts a batch: nonconforming
//! records are marked rejected with a reason and counted, so a single
//! bad row cannot take down a run.

use crate::normalize::parse_date_flexible;
use crate::record::{RawRecord, ValidatedRecord, ValidationStatus};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Expected type of a schema field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    String,
    Float,
    Integer,
    /// A string holding a parseable calendar date
    Date,
}

impl FieldType {
    pub fn as_str(&self) -> &str {
        match self {
            FieldType::String => "string",
            FieldType::Float => "float",
            FieldType::Integer => "integer",
            FieldType::Date => "date",
        }
    }
}

/// Declaration of a single expected field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub field_type: FieldType,

    /// Whether the field may be missing or null
    #[serde(default)]
    pub nullable: bool,

    /// Value substituted when the field is missing or null
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    /// Inclusive numeric range constraint, for Float and Integer fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<(f64, f64)>,
}

impl FieldSpec {
    /// A required field of the given type
    pub fn required(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            nullable: false,
            default: None,
            range: None,
        }
    }

    /// An optional (nullable) field of the given type
    pub fn optional(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            nullable: true,
            default: None,
            range: None,
        }
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_range(mut self, min: f64, max: f64) -> Self {
        self.range = Some((min, max));
        self
    }
}

/// Declared schema for one source's raw records
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub fields: Vec<FieldSpec>,
}

/// Per-run validation counters, exposed for observability
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationStats {
    pub passed: u64,
    pub coerced: u64,
    pub rejected: u64,
}

impl Schema {
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    /// Check the schema itself for misconfiguration
    ///
    /// Invalid schemas are a fatal, run-wide error.
    pub fn check(&self) -> Result<(), String> {
        if self.fields.is_empty() {
            return Err("schema declares no fields".to_string());
        }

        let mut seen = std::collections::HashSet::new();
        for field in &self.fields {
            if field.name.is_empty() {
                return Err("schema contains a field with an empty name".to_string());
            }
            if !seen.insert(field.name.as_str()) {
                return Err(format!("duplicate field '{}' in schema", field.name));
            }
            if let Some((min, max)) = field.range {
                if !matches!(field.field_type, FieldType::Float | FieldType::Integer) {
                    return Err(format!(
                        "field '{}' declares a range but has non-numeric type {}",
                        field.name,
                        field.field_type.as_str()
                    ));
                }
                if min > max {
                    return Err(format!(
                        "field '{}' has inverted range [{}, {}]",
                        field.name, min, max
                    ));
                }
            }
        }
        Ok(())
    }

    /// Validate one raw record against the schema
    ///
    /// Missing optional fields are filled with the declared default or
    /// left null; wrong types are coerced where possible. Coercion
    /// failure or a missing required field rejects the record. Fields
    /// the schema does not declare are carried through untouched.
    pub fn validate(&self, raw: RawRecord, stats: &mut ValidationStats) -> ValidatedRecord {
        let mut fields: Map<String, Value> = raw.fields.clone();
        let mut coerced = false;

        for spec in &self.fields {
            let current = fields.get(&spec.name).cloned();
            let is_absent = matches!(current, None | Some(Value::Null));

            if is_absent {
                match (&spec.default, spec.nullable) {
                    (Some(default), _) => {
                        fields.insert(spec.name.clone(), default.clone());
                        coerced = true;
                    },
                    (None, true) => {
                        fields.insert(spec.name.clone(), Value::Null);
                    },
                    (None, false) => {
                        stats.rejected += 1;
                        return rejected(raw, fields, format!("missing required field '{}'", spec.name));
                    },
                }
                continue;
            }

            // current is Some and non-null here
            let value = match current {
                Some(v) => v,
                None => continue,
            };

            match coerce_value(&value, spec.field_type) {
                Coercion::Unchanged => {},
                Coercion::Coerced(v) => {
                    fields.insert(spec.name.clone(), v);
                    coerced = true;
                },
                Coercion::Failed => {
                    stats.rejected += 1;
                    return rejected(
                        raw,
                        fields,
                        format!(
                            "field '{}' value {} is not a valid {}",
                            spec.name, value, spec.field_type.as_str()
                        ),
                    );
                },
            }

            if let Some((min, max)) = spec.range {
                // Range applies to the post-coercion numeric value
                let n = fields.get(&spec.name).and_then(Value::as_f64);
                match n {
                    Some(n) if n >= min && n <= max => {},
                    Some(n) => {
                        stats.rejected += 1;
                        return rejected(
                            raw,
                            fields,
                            format!("field '{}' value {} outside range [{}, {}]", spec.name, n, min, max),
                        );
                    },
                    None => {},
                }
            }
        }

        let status = if coerced {
            stats.coerced += 1;
            ValidationStatus::Coerced
        } else {
            stats.passed += 1;
            ValidationStatus::Passed
        };

        ValidatedRecord { raw, fields, status }
    }
}

fn rejected(raw: RawRecord, fields: Map<String, Value>, reason: String) -> ValidatedRecord {
    let reason = match raw.source_offset {
        Some(offset) => format!("record {}: {}", offset, reason),
        None => reason,
    };
    ValidatedRecord {
        raw,
        fields,
        status: ValidationStatus::Rejected(reason),
    }
}

enum Coercion {
    Unchanged,
    Coerced(Value),
    Failed,
}

/// Attempt to conform a value to the expected type
fn coerce_value(value: &Value, expected: FieldType) -> Coercion {
    match expected {
        FieldType::String => match value {
            Value::String(_) => Coercion::Unchanged,
            Value::Number(n) => Coercion::Coerced(Value::String(n.to_string())),
            Value::Bool(b) => Coercion::Coerced(Value::String(b.to_string())),
            _ => Coercion::Failed,
        },
        FieldType::Float => match value {
            Value::Number(_) => Coercion::Unchanged,
            Value::String(s) => match s.trim().parse::<f64>() {
                Ok(n) if n.is_finite() => match serde_json::Number::from_f64(n) {
                    Some(n) => Coercion::Coerced(Value::Number(n)),
                    None => Coercion::Failed,
                },
                _ => Coercion::Failed,
            },
            _ => Coercion::Failed,
        },
        FieldType::Integer => match value {
            Value::Number(n) if n.is_i64() || n.is_u64() => Coercion::Unchanged,
            Value::Number(n) => match n.as_f64() {
                Some(f) if f.fract() == 0.0 => Coercion::Coerced(Value::from(f as i64)),
                _ => Coercion::Failed,
            },
            Value::String(s) => match s.trim().parse::<i64>() {
                Ok(n) => Coercion::Coerced(Value::from(n)),
                Err(_) => Coercion::Failed,
            },
            _ => Coercion::Failed,
        },
        FieldType::Date => match value {
            Value::String(s) => match parse_date_flexible(s) {
                Some(date) => {
                    let iso = date.format("%Y-%m-%d").to_string();
                    if *s == iso {
                        Coercion::Unchanged
                    } else {
                        Coercion::Coerced(Value::String(iso))
                    }
                },
                None => Coercion::Failed,
            },
            _ => Coercion::Failed,
        },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn price_schema() -> Schema {
        Schema::new(vec![
            FieldSpec::required("date", FieldType::Date),
            FieldSpec::required("value", FieldType::Float),
            FieldSpec::optional("unit", FieldType::String),
        ])
    }

    #[test]
    fn test_conforming_record_passes() {
        let mut stats = ValidationStats::default();
        let raw = RawRecord::new()
            .with_field("date", "2024-01-01")
            .with_field("value", 100.5)
            .with_field("unit", "ars");

        let validated = price_schema().validate(raw, &mut stats);
        assert_eq!(validated.status, ValidationStatus::Passed);
        assert_eq!(stats.passed, 1);
    }

    #[test]
    fn test_numeric_string_is_coerced() {
        let mut stats = ValidationStats::default();
        let raw = RawRecord::new()
            .with_field("date", "2024-01-01")
            .with_field("value", "100.5")
            .with_field("unit", "ars");

        let validated = price_schema().validate(raw, &mut stats);
        assert_eq!(validated.status, ValidationStatus::Coerced);
        assert_eq!(validated.get_f64("value"), Some(100.5));
        assert_eq!(stats.coerced, 1);
    }

    #[test]
    fn test_missing_optional_left_null() {
        let mut stats = ValidationStats::default();
        let raw = RawRecord::new()
            .with_field("date", "2024-01-01")
            .with_field("value", 1.0);

        let validated = price_schema().validate(raw, &mut stats);
        assert_eq!(validated.status, ValidationStatus::Passed);
        assert_eq!(validated.get("unit"), Some(&Value::Null));
    }

    #[test]
    fn test_missing_optional_filled_with_default() {
        let mut stats = ValidationStats::default();
        let schema = Schema::new(vec![
            FieldSpec::required("value", FieldType::Float),
            FieldSpec::optional("unit", FieldType::String).with_default("ars"),
        ]);
        let raw = RawRecord::new().with_field("value", 1.0);

        let validated = schema.validate(raw, &mut stats);
        assert_eq!(validated.status, ValidationStatus::Coerced);
        assert_eq!(validated.get_str("unit"), Some("ars"));
    }

    #[test]
    fn test_missing_required_rejects() {
        let mut stats = ValidationStats::default();
        let raw = RawRecord::new().with_field("value", 1.0).with_offset(7);

        let validated = price_schema().validate(raw, &mut stats);
        match &validated.status {
            ValidationStatus::Rejected(reason) => {
                assert!(reason.contains("record 7"));
                assert!(reason.contains("date"));
            },
            other => panic!("expected rejection, got {:?}", other),
        }
        assert_eq!(stats.rejected, 1);
    }

    #[test]
    fn test_uncoercible_value_rejects_without_aborting() {
        let mut stats = ValidationStats::default();
        let schema = price_schema();

        let bad = RawRecord::new()
            .with_field("date", "2024-01-01")
            .with_field("value", "not-a-number");
        let good = RawRecord::new()
            .with_field("date", "2024-01-02")
            .with_field("value", 2.0);

        assert!(schema.validate(bad, &mut stats).status.is_rejected());
        assert!(!schema.validate(good, &mut stats).status.is_rejected());
        assert_eq!(stats.rejected, 1);
        assert_eq!(stats.passed, 1);
    }

    #[test]
    fn test_range_constraint() {
        let mut stats = ValidationStats::default();
        let schema = Schema::new(vec![
            FieldSpec::required("value", FieldType::Float).with_range(0.0, 100.0),
        ]);

        let inside = RawRecord::new().with_field("value", 50.0);
        let outside = RawRecord::new().with_field("value", -1.0);

        assert!(!schema.validate(inside, &mut stats).status.is_rejected());
        assert!(schema.validate(outside, &mut stats).status.is_rejected());
    }

    #[test]
    fn test_date_normalized_to_iso() {
        let mut stats = ValidationStats::default();
        let schema = Schema::new(vec![FieldSpec::required("date", FieldType::Date)]);
        let raw = RawRecord::new().with_field("date", "2024-12-16T14:06:00Z");

        let validated = schema.validate(raw, &mut stats);
        assert_eq!(validated.status, ValidationStatus::Coerced);
        assert_eq!(validated.get_str("date"), Some("2024-12-16"));
    }

    #[test]
    fn test_undeclared_fields_carried_through() {
        let mut stats = ValidationStats::default();
        let raw = RawRecord::new()
            .with_field("date", "2024-01-01")
            .with_field("value", 1.0)
            .with_field("extra", json!({"k": "v"}));

        let validated = price_schema().validate(raw, &mut stats);
        assert!(validated.get("extra").is_some());
    }

    #[test]
    fn test_schema_check_rejects_duplicates_and_bad_ranges() {
        let dup = Schema::new(vec![
            FieldSpec::required("a", FieldType::Float),
            FieldSpec::required("a", FieldType::String),
        ]);
        assert!(dup.check().is_err());

        let inverted = Schema::new(vec![
            FieldSpec::required("a", FieldType::Float).with_range(10.0, 0.0),
        ]);
        assert!(inverted.check().is_err());

        assert!(Schema::default().check().is_err());
        assert!(price_schema().check().is_ok());
    }

    #[test]
    fn test_schema_check_rejects_range_on_non_numeric_field() {
        let string_range = Schema::new(vec![
            FieldSpec::required("unit", FieldType::String).with_range(0.0, 100.0),
        ]);
        let err = string_range.check().unwrap_err();
        assert!(err.contains("unit"));
        assert!(err.contains("non-numeric"));

        let date_range = Schema::new(vec![
            FieldSpec::required("date", FieldType::Date).with_range(0.0, 100.0),
        ]);
        assert!(date_range.check().is_err());

        let integer_range = Schema::new(vec![
            FieldSpec::required("count", FieldType::Integer).with_range(0.0, 100.0),
        ]);
        assert!(integer_range.check().is_ok());
    }
}
