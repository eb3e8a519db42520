//! Primitive source descriptors
//!
//! A primitive sources file is a CSV with one row per managed stream:
//!
//! ```csv
//! source_type,stream_id,source_id
//! gsheets:1abc...,st2393fded6ff3bde0e77209bc41f964,1.1.01
//! ```

use serde::Deserialize;
use tsn_common::{StreamId, TsnError};

// ============================================================================
// Types
// ============================================================================

/// One row of a primitive sources file
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct PrimitiveSource {
    pub source_type: String,
    pub stream_id: StreamId,
    pub source_id: String,
}

/// Parsed form of the `source_type` column
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceType {
    /// `gsheets:<sheet_id>`
    Gsheet { sheet_id: String },
}

impl PrimitiveSource {
    pub fn source_type(&self) -> Result<SourceType, TsnError> {
        SourceType::parse(&self.source_type)
    }
}

impl SourceType {
    pub fn parse(s: &str) -> Result<Self, TsnError> {
        let s = s.trim();
        match s.split_once(':') {
            Some(("gsheets", sheet_id)) if !sheet_id.is_empty() => Ok(SourceType::Gsheet {
                sheet_id: sheet_id.to_string(),
            }),
            _ => Err(TsnError::parse(format!(
                "unknown source type '{}': expected 'gsheets:<sheet_id>'",
                s
            ))),
        }
    }
}

// ============================================================================
// Parsing
// ============================================================================

/// Parse a primitive sources CSV body
///
/// Rows with a malformed stream id fail the whole parse: a sources file
/// is operator-managed configuration, so a single bad row means the
/// file needs fixing rather than partial processing.
pub fn parse_primitive_sources(body: &str) -> Result<Vec<PrimitiveSource>, TsnError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes());

    let mut sources = Vec::new();
    for (idx, row) in reader.deserialize::<PrimitiveSource>().enumerate() {
        let source = row.map_err(|e| {
            TsnError::parse(format!("primitive sources row {}: {}", idx + 1, e))
        })?;
        sources.push(source);
    }

    if sources.is_empty() {
        return Err(TsnError::parse(
            "primitive sources file contains no rows".to_string(),
        ));
    }

    Ok(sources)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
source_type,stream_id,source_id
gsheets:1abcDEF,st2393fded6ff3bde0e77209bc41f964,1.1.01
gsheets:1abcDEF,stb59d3b9e43672955d9c56935d15c4e,1.1.02
";

    #[test]
    fn test_parse_sample_file() {
        let sources = parse_primitive_sources(SAMPLE).unwrap();
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].source_id, "1.1.01");
        assert_eq!(
            sources[0].stream_id.as_str(),
            "st2393fded6ff3bde0e77209bc41f964"
        );
        assert_eq!(
            sources[0].source_type().unwrap(),
            SourceType::Gsheet {
                sheet_id: "1abcDEF".to_string()
            }
        );
    }

    #[test]
    fn test_bad_stream_id_fails_parse() {
        let body = "source_type,stream_id,source_id\ngsheets:x,not-a-stream-id,1.1.01\n";
        let err = parse_primitive_sources(body).unwrap_err();
        assert!(err.to_string().contains("row 1"));
    }

    #[test]
    fn test_unknown_source_type() {
        assert!(SourceType::parse("ftp:whatever").is_err());
        assert!(SourceType::parse("gsheets:").is_err());
    }

    #[test]
    fn test_empty_file_is_an_error() {
        let err = parse_primitive_sources("source_type,stream_id,source_id\n").unwrap_err();
        assert!(err.to_string().contains("no rows"));
    }
}
