//! Google Sheets source
//!
//! Reads a sheet through the public CSV export endpoint. The expected
//! layout follows the shared convention for TSN input sheets:
//!
//! - `Year`: YYYY
//! - `Month`: month number or English name
//! - `ID`: source id used to filter rows for one stream
//! - `Value`: numeric value to publish

use crate::csv_records::csv_record_stream;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;
use tsn_common::StreamId;
use tsn_pipeline::{
    DateRule, FetchError, FieldSpec, FieldType, MappingRule, RawRecordStream, Schema,
    SourceFetcher, SourceSpec,
};

const GSHEET_EXPORT_BASE: &str = "https://docs.google.com/spreadsheets";

/// Default timeout for sheet export requests in seconds
const FETCH_TIMEOUT_SECS: u64 = 30;

/// Fetcher for one Google Sheet
pub struct GsheetFetcher {
    client: Client,
    base_url: String,
    sheet_id: String,
}

impl GsheetFetcher {
    pub fn new(sheet_id: impl Into<String>) -> Result<Self, FetchError> {
        Self::with_base_url(sheet_id, GSHEET_EXPORT_BASE)
    }

    /// Override the export endpoint, for tests
    pub fn with_base_url(
        sheet_id: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
            .user_agent("tsn-adapters/0.1")
            .build()
            .map_err(|e| FetchError::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            sheet_id: sheet_id.into(),
        })
    }

    fn export_url(&self) -> String {
        format!("{}/d/{}/export?format=csv", self.base_url, self.sheet_id)
    }
}

#[async_trait]
impl SourceFetcher for GsheetFetcher {
    async fn fetch(&self, spec: &SourceSpec) -> Result<RawRecordStream, FetchError> {
        let url = self.export_url();
        debug!(source = %spec.name, sheet_id = %self.sheet_id, "Fetching sheet export");

        let response = self.client.get(&url).send().await?.error_for_status()?;
        let body = response.text().await?;

        csv_record_stream(body, b',')
    }
}

/// Declared schema for the shared sheet layout
pub fn sheet_schema() -> Schema {
    Schema::new(vec![
        FieldSpec::required("Year", FieldType::Integer),
        FieldSpec::required("Month", FieldType::String),
        FieldSpec::required("ID", FieldType::String),
        FieldSpec::required("Value", FieldType::Float),
    ])
}

/// Mapping for one (stream, source id) pair within a sheet
pub fn sheet_mapping(stream_id: StreamId, source_id: &str) -> MappingRule {
    MappingRule::to_stream(
        stream_id,
        DateRule::YearMonth {
            year: "Year".to_string(),
            month: "Month".to_string(),
        },
        "Value",
    )
    .with_filter("ID", source_id)
}

/// Complete source spec for one sheet-backed stream
pub fn sheet_spec(name: &str, stream_id: StreamId, source_id: &str) -> SourceSpec {
    SourceSpec {
        name: name.to_string(),
        schema: sheet_schema(),
        mapping: sheet_mapping(stream_id, source_id),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tsn_pipeline::normalize::normalize;
    use tsn_pipeline::ValidationStats;

    #[test]
    fn test_export_url_shape() {
        let fetcher = GsheetFetcher::new("abc123").unwrap();
        assert_eq!(
            fetcher.export_url(),
            "https://docs.google.com/spreadsheets/d/abc123/export?format=csv"
        );
    }

    #[test]
    fn test_sheet_spec_maps_a_row_end_to_end() {
        let stream_id = StreamId::generate("sheet-test");
        let spec = sheet_spec("sheet", stream_id.clone(), "1.1.01");

        let raw = tsn_pipeline::RawRecord::new()
            .with_field("Year", "2024")
            .with_field("Month", "March")
            .with_field("ID", "1.1.01")
            .with_field("Value", "100.5");

        let mut stats = ValidationStats::default();
        let validated = spec.schema.validate(raw, &mut stats);
        let point = normalize(&validated, &spec.mapping).unwrap().unwrap();

        assert_eq!(point.stream_id, stream_id);
        assert_eq!(point.date.to_string(), "2024-03-01");
        assert_eq!(point.value, 100.5);
    }

    #[test]
    fn test_sheet_spec_filters_other_ids() {
        let spec = sheet_spec("sheet", StreamId::generate("sheet-test"), "1.1.01");
        let raw = tsn_pipeline::RawRecord::new()
            .with_field("Year", "2024")
            .with_field("Month", "3")
            .with_field("ID", "9.9.99")
            .with_field("Value", "1");

        let mut stats = ValidationStats::default();
        let validated = spec.schema.validate(raw, &mut stats);
        assert_eq!(normalize(&validated, &spec.mapping).unwrap(), None);
    }
}
