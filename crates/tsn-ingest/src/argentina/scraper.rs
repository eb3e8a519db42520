//! SEPA portal activity scraper
//!
//! The datos.produccion.gob.ar dataset page lists one activity entry
//! per daily ZIP upload. Each entry carries a Spanish timestamp and a
//! resource link of the form `/dataset/<dataset_id>/archivo/<resource_id>`.

use super::dates::{parse_spanish_datetime, weekday_es};
use chrono::NaiveDate;
use regex::Regex;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, warn};
use tsn_pipeline::FetchError;

const DATASET_BASE: &str = "https://datos.produccion.gob.ar/dataset";
const MAIN_PAGE: &str = "https://datos.produccion.gob.ar/dataset/sepa-precios";

/// Default timeout for portal requests in seconds
const FETCH_TIMEOUT_SECS: u64 = 60;

static HREF_RE: OnceLock<Regex> = OnceLock::new();

#[allow(clippy::expect_used)]
fn href_regex() -> &'static Regex {
    HREF_RE.get_or_init(|| {
        Regex::new(r"^/dataset/(.+?)/archivo/(.+?)$").expect("static regex is valid")
    })
}

/// One daily SEPA upload discovered on the activity page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SepaDataItem {
    pub date: NaiveDate,
    pub dataset_id: String,
    pub resource_id: String,
}

impl SepaDataItem {
    /// Link to the resource page on the portal
    pub fn resource_link(&self) -> String {
        format!("{}/{}/archivo/{}", DATASET_BASE, self.dataset_id, self.resource_id)
    }

    /// Direct ZIP download link. The portal names the file after the
    /// Spanish weekday and serves it under `resource`, not `archivo`.
    pub fn download_link(&self) -> String {
        format!(
            "{}/{}/resource/{}/download/sepa_{}.zip",
            DATASET_BASE,
            self.dataset_id,
            self.resource_id,
            weekday_es(self.date)
        )
    }
}

/// Parse the activity page HTML into data items
///
/// Malformed entries are logged and skipped; an empty result is an
/// error because the page always lists recent uploads when healthy.
pub fn parse_historical_items(html: &str) -> Result<Vec<SepaDataItem>, FetchError> {
    let document = Html::parse_document(html);

    let activity_selector = parse_selector(".activity")?;
    let item_selector = parse_selector("li.item.changed-resource")?;

    let main_element = document
        .select(&activity_selector)
        .next()
        .ok_or_else(|| FetchError::Format("activity list not found on page".to_string()))?;

    let mut items = Vec::new();
    for element in main_element.select(&item_selector) {
        match extract_data_item(element) {
            Ok(item) => items.push(item),
            Err(reason) => warn!(reason = %reason, "Skipping malformed activity entry"),
        }
    }

    if items.is_empty() {
        return Err(FetchError::Format(
            "no historical data items found on page".to_string(),
        ));
    }

    Ok(items)
}

fn parse_selector(css: &str) -> Result<Selector, FetchError> {
    Selector::parse(css).map_err(|e| FetchError::Format(format!("bad selector '{}': {}", css, e)))
}

fn extract_data_item(element: ElementRef<'_>) -> Result<SepaDataItem, String> {
    let date_selector = parse_selector(".date").map_err(|e| e.to_string())?;
    let anchor_selector =
        parse_selector(r#"a[href*="archivo"]"#).map_err(|e| e.to_string())?;

    let title = element
        .select(&date_selector)
        .next()
        .and_then(|e| e.value().attr("title"))
        .ok_or_else(|| "date element title not found in item".to_string())?;

    let date = parse_spanish_datetime(title)
        .ok_or_else(|| format!("could not parse date title '{}'", title))?;

    let href = element
        .select(&anchor_selector)
        .next()
        .and_then(|a| a.value().attr("href"))
        .ok_or_else(|| "resource anchor not found in item".to_string())?;

    let captures = href_regex()
        .captures(href)
        .ok_or_else(|| format!("resource href '{}' does not match expected pattern", href))?;

    Ok(SepaDataItem {
        date,
        dataset_id: captures[1].to_string(),
        resource_id: captures[2].to_string(),
    })
}

/// HTTP wrapper around the activity page and ZIP downloads
pub struct SepaScraper {
    client: Client,
    main_url: String,
}

impl SepaScraper {
    pub fn new() -> Result<Self, FetchError> {
        Self::with_main_url(MAIN_PAGE)
    }

    /// Override the activity page URL, for tests
    pub fn with_main_url(main_url: impl Into<String>) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
            .user_agent("tsn-adapters SEPA scraper")
            .build()
            .map_err(|e| FetchError::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { client, main_url: main_url.into() })
    }

    /// Scrape the activity page for daily upload items
    pub async fn fetch_historical_items(&self) -> Result<Vec<SepaDataItem>, FetchError> {
        debug!(url = %self.main_url, "Fetching SEPA activity page");
        let html = self
            .client
            .get(&self.main_url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        parse_historical_items(&html)
    }

    /// Download one item's ZIP archive into memory
    pub async fn download(&self, item: &SepaDataItem) -> Result<Vec<u8>, FetchError> {
        self.download_from(&item.download_link()).await
    }

    /// Download a ZIP archive from an explicit URL, for tests and
    /// mirrored copies
    pub async fn download_from(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        debug!(url = %url, "Downloading SEPA archive");
        let bytes = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        Ok(bytes.to_vec())
    }
}
