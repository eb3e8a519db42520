//! Argentina SEPA precios source
//!
//! SEPA ("Sistema Electrónico de Publicidad de Precios Argentinos")
//! publishes daily ZIP archives of supermarket prices on the national
//! open-data portal. The source works in three steps:
//!
//! 1. [`scraper`] discovers daily uploads on the dataset activity page
//! 2. [`prices`] unpacks an archive and aggregates an average list
//!    price per product category
//! 3. [`SepaFetcher`] exposes the result as a record stream

pub mod dates;
pub mod prices;
pub mod scraper;

pub use prices::{read_sepa_zip, sepa_mapping, sepa_schema, sepa_spec};
pub use scraper::{parse_historical_items, SepaDataItem, SepaScraper};

use async_trait::async_trait;
use chrono::NaiveDate;
use futures::stream;
use tracing::info;
use tsn_pipeline::{FetchError, RawRecordStream, SourceFetcher, SourceSpec};

/// Fetcher for one day of SEPA prices
///
/// Without an explicit date the most recent upload on the activity
/// page is used.
pub struct SepaFetcher {
    scraper: SepaScraper,
    date: Option<NaiveDate>,
}

impl SepaFetcher {
    pub fn new() -> Result<Self, FetchError> {
        Ok(Self { scraper: SepaScraper::new()?, date: None })
    }

    pub fn with_scraper(scraper: SepaScraper) -> Self {
        Self { scraper, date: None }
    }

    /// Restrict the run to a specific upload date
    pub fn for_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    fn select_item(&self, items: Vec<SepaDataItem>) -> Result<SepaDataItem, FetchError> {
        match self.date {
            Some(date) => items.into_iter().find(|item| item.date == date).ok_or_else(|| {
                FetchError::Format(format!("no SEPA upload found for date {}", date))
            }),
            None => items
                .into_iter()
                .max_by_key(|item| item.date)
                .ok_or_else(|| FetchError::Format("no SEPA uploads found".to_string())),
        }
    }
}

#[async_trait]
impl SourceFetcher for SepaFetcher {
    async fn fetch(&self, spec: &SourceSpec) -> Result<RawRecordStream, FetchError> {
        let items = self.scraper.fetch_historical_items().await?;
        let item = self.select_item(items)?;
        info!(
            source = %spec.name,
            date = %item.date,
            resource_id = %item.resource_id,
            "Downloading SEPA archive"
        );

        let bytes = self.scraper.download(&item).await?;
        let records = read_sepa_zip(&bytes, item.date)?;
        info!(source = %spec.name, categories = records.len(), "Aggregated SEPA archive");

        Ok(Box::pin(stream::iter(records.into_iter().map(Ok))))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn item(date: NaiveDate, resource_id: &str) -> SepaDataItem {
        SepaDataItem {
            date,
            dataset_id: "xyz789".to_string(),
            resource_id: resource_id.to_string(),
        }
    }

    #[test]
    fn test_select_latest_by_default() {
        let fetcher = SepaFetcher::new().unwrap();
        let d1 = NaiveDate::from_ymd_opt(2024, 12, 16).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2024, 12, 17).unwrap();

        let selected = fetcher.select_item(vec![item(d1, "a"), item(d2, "b")]).unwrap();
        assert_eq!(selected.resource_id, "b");
    }

    #[test]
    fn test_select_specific_date() {
        let d1 = NaiveDate::from_ymd_opt(2024, 12, 16).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2024, 12, 17).unwrap();
        let fetcher = SepaFetcher::new().unwrap().for_date(d1);

        let selected = fetcher.select_item(vec![item(d1, "a"), item(d2, "b")]).unwrap();
        assert_eq!(selected.resource_id, "a");
    }

    #[test]
    fn test_missing_date_is_an_error() {
        let d1 = NaiveDate::from_ymd_opt(2024, 12, 16).unwrap();
        let missing = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let fetcher = SepaFetcher::new().unwrap().for_date(missing);

        let err = fetcher.select_item(vec![item(d1, "a")]).unwrap_err();
        assert!(err.to_string().contains("no SEPA upload found for date 2024-01-01"));
    }
}
