//! GitHub-hosted CSV source
//!
//! Fetches CSV files through the raw content endpoint. Used both as a
//! generic [`SourceFetcher`] and to load primitive sources files that
//! describe which streams a repository manages.

use crate::csv_records::csv_record_stream;
use crate::sources::{parse_primitive_sources, PrimitiveSource};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::debug;
use tsn_pipeline::{FetchError, RawRecordStream, SourceFetcher, SourceSpec};

const RAW_CONTENT_BASE: &str = "https://raw.githubusercontent.com";

/// Default timeout for raw content requests in seconds
const FETCH_TIMEOUT_SECS: u64 = 30;

/// One CSV file in a GitHub repository
pub struct GithubCsvSource {
    client: Client,
    base_url: String,
    repo: String,
    path: String,
    branch: String,
    has_token: bool,
}

impl GithubCsvSource {
    /// `repo` is `owner/name`; `token` grants access to private repos.
    pub fn new(
        repo: impl Into<String>,
        path: impl Into<String>,
        branch: impl Into<String>,
        token: Option<&str>,
    ) -> Result<Self, FetchError> {
        Self::with_base_url(repo, path, branch, token, RAW_CONTENT_BASE)
    }

    /// Override the raw content endpoint, for tests
    pub fn with_base_url(
        repo: impl Into<String>,
        path: impl Into<String>,
        branch: impl Into<String>,
        token: Option<&str>,
        base_url: impl Into<String>,
    ) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        if let Some(token) = token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| FetchError::Auth("GitHub token contains invalid characters".to_string()))?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
            .user_agent("tsn-adapters/0.1")
            .default_headers(headers)
            .build()
            .map_err(|e| FetchError::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            repo: repo.into(),
            path: path.into(),
            branch: branch.into(),
            has_token: token.is_some(),
        })
    }

    fn raw_url(&self) -> String {
        format!(
            "{}/{}/{}/{}",
            self.base_url,
            self.repo,
            self.branch,
            self.path.trim_start_matches('/')
        )
    }

    /// Download the file body, mapping 404 to an auth hint: the raw
    /// endpoint reports missing and forbidden files identically.
    async fn fetch_body(&self) -> Result<String, FetchError> {
        let url = self.raw_url();
        debug!(url = %url, "Fetching raw file from GitHub");

        let response = self.client.get(&url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            let hint = if self.has_token {
                "ensure your GitHub token has read access to the repository"
            } else {
                "the repository might be private or a GitHub token is missing"
            };
            return Err(FetchError::Auth(format!(
                "{}/{} not found on branch {}: {}",
                self.repo, self.path, self.branch, hint
            )));
        }

        let body = response.error_for_status()?.text().await?;
        Ok(body)
    }

    /// Parse the file as a primitive sources descriptor
    pub async fn load_primitive_sources(&self) -> Result<Vec<PrimitiveSource>, FetchError> {
        let body = self.fetch_body().await?;
        parse_primitive_sources(&body).map_err(|e| FetchError::Format(e.to_string()))
    }
}

#[async_trait]
impl SourceFetcher for GithubCsvSource {
    async fn fetch(&self, spec: &SourceSpec) -> Result<RawRecordStream, FetchError> {
        debug!(source = %spec.name, repo = %self.repo, path = %self.path, "Fetching GitHub CSV");
        let body = self.fetch_body().await?;
        csv_record_stream(body, b',')
    }
}
