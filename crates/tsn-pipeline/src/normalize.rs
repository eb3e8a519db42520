//! Normalization of validated records into stream points
//!
//! A [`MappingRule`] describes how one source's field names map onto
//! the canonical (stream_id, date, value) shape. Normalization is
//! deterministic: the same validated record always yields the same
//! stream point. Records with unparseable dates or values are dropped
//! with a reason, never halting the run.

use crate::error::NormalizeError;
use crate::record::ValidatedRecord;
use crate::types::StreamPoint;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tsn_common::StreamId;

/// How the stream id is derived for a record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamIdRule {
    /// Every record of the source goes to one fixed stream
    Fixed(StreamId),

    /// Concatenate the named record fields (joined with `-`, with an
    /// optional static prefix) and hash the result into a stream id
    Derived {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        prefix: Option<String>,
        fields: Vec<String>,
    },
}

/// How the canonical date is read from a record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateRule {
    /// A single field holding a parseable date
    Field(String),

    /// Separate year and month columns; the day defaults to the first
    /// of the month. Month accepts numbers and English month names.
    YearMonth { year: String, month: String },
}

/// Keep only records whose field equals the expected value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldFilter {
    pub field: String,
    pub equals: String,
}

/// Source-specific mapping onto the canonical time-series shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingRule {
    pub stream_id: StreamIdRule,
    pub date: DateRule,

    /// Field holding the numeric value
    pub value_field: String,

    /// Optional record filter applied before mapping
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<FieldFilter>,

    /// Fields carried into point metadata when present
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub metadata_fields: Vec<String>,
}

impl MappingRule {
    /// Map every record of the source onto one fixed stream
    pub fn to_stream(stream_id: StreamId, date: DateRule, value_field: impl Into<String>) -> Self {
        Self {
            stream_id: StreamIdRule::Fixed(stream_id),
            date,
            value_field: value_field.into(),
            filter: None,
            metadata_fields: Vec::new(),
        }
    }

    pub fn with_filter(mut self, field: impl Into<String>, equals: impl Into<String>) -> Self {
        self.filter = Some(FieldFilter {
            field: field.into(),
            equals: equals.into(),
        });
        self
    }

    pub fn with_metadata_fields(mut self, fields: Vec<String>) -> Self {
        self.metadata_fields = fields;
        self
    }
}

/// Map a validated record onto a stream point
///
/// Returns `Ok(None)` for records the rule filters out and for records
/// that were rejected upstream. Errors are per-record drop reasons.
pub fn normalize(
    record: &ValidatedRecord,
    rule: &MappingRule,
) -> Result<Option<StreamPoint>, NormalizeError> {
    if record.status.is_rejected() {
        return Ok(None);
    }

    if let Some(filter) = &rule.filter {
        match record.get(&filter.field) {
            Some(value) if value_as_string(value).as_deref() == Some(filter.equals.as_str()) => {},
            _ => return Ok(None),
        }
    }

    let stream_id = derive_stream_id(record, &rule.stream_id)?;
    let date = derive_date(record, &rule.date)?;
    let value = derive_value(record, &rule.value_field)?;

    let mut metadata = BTreeMap::new();
    for field in &rule.metadata_fields {
        if let Some(value) = record.get(field) {
            if let Some(s) = value_as_string(value) {
                metadata.insert(field.clone(), s);
            }
        }
    }

    Ok(Some(StreamPoint {
        stream_id,
        date,
        value,
        metadata: if metadata.is_empty() { None } else { Some(metadata) },
    }))
}

fn derive_stream_id(
    record: &ValidatedRecord,
    rule: &StreamIdRule,
) -> Result<StreamId, NormalizeError> {
    match rule {
        StreamIdRule::Fixed(id) => Ok(id.clone()),
        StreamIdRule::Derived { prefix, fields } => {
            let mut parts: Vec<String> = Vec::with_capacity(fields.len() + 1);
            if let Some(prefix) = prefix {
                parts.push(prefix.clone());
            }
            for field in fields {
                let value = record
                    .get(field)
                    .and_then(value_as_string)
                    .ok_or_else(|| NormalizeError::MissingField(field.clone()))?;
                parts.push(value);
            }
            Ok(StreamId::generate(&parts.join("-")))
        },
    }
}

fn derive_date(record: &ValidatedRecord, rule: &DateRule) -> Result<NaiveDate, NormalizeError> {
    match rule {
        DateRule::Field(field) => {
            let raw = record
                .get(field)
                .and_then(value_as_string)
                .ok_or_else(|| NormalizeError::MissingField(field.clone()))?;
            parse_date_flexible(&raw).ok_or_else(|| NormalizeError::BadDate {
                field: field.clone(),
                value: raw,
            })
        },
        DateRule::YearMonth { year, month } => {
            let year_raw = record
                .get(year)
                .and_then(value_as_string)
                .ok_or_else(|| NormalizeError::MissingField(year.clone()))?;
            let month_raw = record
                .get(month)
                .and_then(value_as_string)
                .ok_or_else(|| NormalizeError::MissingField(month.clone()))?;

            let y: i32 = year_raw.trim().parse().map_err(|_| NormalizeError::BadDate {
                field: year.clone(),
                value: year_raw.clone(),
            })?;
            let m = parse_month(&month_raw).ok_or_else(|| NormalizeError::BadDate {
                field: month.clone(),
                value: month_raw.clone(),
            })?;

            NaiveDate::from_ymd_opt(y, m, 1).ok_or(NormalizeError::BadDate {
                field: month.clone(),
                value: format!("{}-{}", year_raw, month_raw),
            })
        },
    }
}

fn derive_value(record: &ValidatedRecord, field: &str) -> Result<f64, NormalizeError> {
    let value = record
        .get(field)
        .ok_or_else(|| NormalizeError::MissingField(field.to_string()))?;

    match value {
        Value::Number(n) => n.as_f64().ok_or_else(|| NormalizeError::BadValue {
            field: field.to_string(),
            value: n.to_string(),
        }),
        Value::String(s) => s.trim().parse::<f64>().map_err(|_| NormalizeError::BadValue {
            field: field.to_string(),
            value: s.clone(),
        }),
        other => Err(NormalizeError::BadValue {
            field: field.to_string(),
            value: other.to_string(),
        }),
    }
}

fn value_as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Parse a date from the formats the sources actually produce
///
/// Accepted: ISO dates (`2024-01-16`), RFC 3339 timestamps (truncated
/// to their date), `YYYY/MM/DD`, and `YYYY-MM-DD HH:MM:SS`. Anything
/// else is ambiguous and treated as unparseable.
pub fn parse_date_flexible(s: &str) -> Option<NaiveDate> {
    let s = s.trim();

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Some(dt.date());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.date());
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y/%m/%d") {
        return Some(date);
    }

    None
}

/// Parse a month number from a digit string or an English month name
pub fn parse_month(s: &str) -> Option<u32> {
    let s = s.trim();

    if let Ok(n) = s.parse::<u32>() {
        return (1..=12).contains(&n).then_some(n);
    }

    let name = s.to_lowercase();
    let month = match name.as_str() {
        "january" | "jan" => 1,
        "february" | "feb" => 2,
        "march" | "mar" => 3,
        "april" | "apr" => 4,
        "may" => 5,
        "june" | "jun" => 6,
        "july" | "jul" => 7,
        "august" | "aug" => 8,
        "september" | "sep" | "sept" => 9,
        "october" | "oct" => 10,
        "november" | "nov" => 11,
        "december" | "dec" => 12,
        _ => return None,
    };
    Some(month)
}
