//! CSV to raw-record conversion
//!
//! Shared by the tabular sources (Google Sheets, GitHub CSV). Every
//! cell is kept as a string; type enforcement belongs to the declared
//! schema, not the fetcher. Rows are yielded lazily so the pipeline
//! consumes them as a stream.

use csv::ReaderBuilder;
use std::io::Cursor;
use tracing::warn;
use tsn_pipeline::{FetchError, RawRecord, RawRecordStream};

/// Parse CSV text into a lazy stream of raw records
///
/// The header row supplies field names. Rows that the CSV reader
/// cannot decode are skipped with a warning; they are structural noise
/// (ragged rows, encoding glitches), not data to validate.
pub fn csv_record_stream(body: String, delimiter: u8) -> Result<RawRecordStream, FetchError> {
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(Cursor::new(body));

    let headers = reader
        .headers()
        .map_err(|e| FetchError::Format(format!("missing CSV header row: {}", e)))?
        .iter()
        .map(str::to_string)
        .collect::<Vec<_>>();

    if headers.is_empty() {
        return Err(FetchError::Format("empty CSV header row".to_string()));
    }

    let rows = reader.into_records().enumerate().filter_map(move |(idx, row)| {
        let offset = idx as u64 + 1;
        match row {
            Ok(row) => {
                let mut record = RawRecord::new().with_offset(offset);
                for (name, value) in headers.iter().zip(row.iter()) {
                    record = record.with_field(name.clone(), value);
                }
                Some(Ok(record))
            },
            Err(err) => {
                warn!(row = offset, "Skipping undecodable CSV row: {}", err);
                None
            },
        }
    });

    Ok(Box::pin(futures::stream::iter(rows)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use futures::StreamExt;

    async fn collect(body: &str, delimiter: u8) -> Vec<RawRecord> {
        let stream = csv_record_stream(body.to_string(), delimiter).unwrap();
        stream.map(|r| r.unwrap()).collect().await
    }

    #[tokio::test]
    async fn test_rows_become_records_with_header_names() {
        let records = collect("Year,Month,ID,Value\n2024,01,1.1.01,100.5\n", b',').await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get_str("Year"), Some("2024"));
        assert_eq!(records[0].get_str("Value"), Some("100.5"));
        assert_eq!(records[0].source_offset, Some(1));
    }

    #[tokio::test]
    async fn test_pipe_delimiter() {
        let records = collect("a|b\n1|2\n", b'|').await;
        assert_eq!(records[0].get_str("b"), Some("2"));
    }

    #[tokio::test]
    async fn test_short_rows_keep_present_columns() {
        // flexible mode: a missing trailing cell leaves the field absent
        let records = collect("a,b\n1\n2,3\n", b',').await;
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("b"), None);
        assert_eq!(records[1].get_str("b"), Some("3"));
    }

    #[test]
    fn test_headerless_body_is_format_error() {
        assert!(csv_record_stream(String::new(), b',').is_err());
    }
}
