//! TSN client boundary
//!
//! The [`TsnClient`] trait is the seam between the pipeline and the
//! network SDK: batch record submission, existing-record queries to
//! seed deduplication, and stream lifecycle calls. [`HttpTsnClient`]
//! implements it against a TSN gateway; tests substitute an in-memory
//! implementation.
//!
//! Authentication and session lifecycle belong to the gateway side of
//! this boundary; the client only carries the bearer token.

use crate::error::WriteError;
use crate::types::{StreamPoint, WriteOutcome, WriteReceipt};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::debug;
use tsn_common::StreamId;

/// Default timeout for gateway requests in seconds.
/// Can be overridden via TSN_API_TIMEOUT_SECS.
pub const DEFAULT_API_TIMEOUT_SECS: u64 = 60;

/// Stream type deployed for primitive (directly written) series
pub const STREAM_TYPE_PRIMITIVE: &str = "primitive";

/// Client interface to the TSN network
#[async_trait]
pub trait TsnClient: Send + Sync {
    /// Whether the stream is already deployed
    async fn stream_exists(&self, stream_id: &StreamId) -> Result<bool, WriteError>;

    /// Deploy a primitive stream
    async fn deploy_stream(&self, stream_id: &StreamId) -> Result<(), WriteError>;

    /// Initialize a freshly deployed stream
    async fn init_stream(&self, stream_id: &StreamId) -> Result<(), WriteError>;

    /// Submit a batch of points to one stream
    ///
    /// Returns one receipt per submitted point, in submission order.
    async fn insert_records(
        &self,
        stream_id: &StreamId,
        points: &[StreamPoint],
    ) -> Result<Vec<WriteReceipt>, WriteError>;

    /// Dates already present on the stream from the given date onward,
    /// used to seed the dedup ledger
    async fn get_existing_dates(
        &self,
        stream_id: &StreamId,
        date_from: NaiveDate,
    ) -> Result<BTreeSet<NaiveDate>, WriteError>;
}

// ============================================================================
// Wire types
// ============================================================================

/// Standard gateway response envelope
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct DeployRequest<'a> {
    stream_id: &'a str,
    stream_type: &'a str,
}

#[derive(Debug, Serialize)]
struct InsertRequest {
    records: Vec<WireRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireRecord {
    date: NaiveDate,
    value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    inserted_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    metadata: Option<std::collections::BTreeMap<String, String>>,
}

#[derive(Debug, Deserialize)]
struct InsertResponse {
    results: Vec<WireReceipt>,
}

#[derive(Debug, Deserialize)]
struct WireReceipt {
    date: NaiveDate,
    status: String,
    #[serde(default)]
    tx_hash: Option<String>,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RecordsResponse {
    records: Vec<WireRecord>,
}

// ============================================================================
// HTTP implementation
// ============================================================================

/// HTTP client for a TSN gateway
pub struct HttpTsnClient {
    client: Client,
    base_url: String,
    token: String,
}

impl HttpTsnClient {
    /// Create a new gateway client
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Result<Self, WriteError> {
        let timeout_secs = std::env::var("TSN_API_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_API_TIMEOUT_SECS);

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent("tsn-adapters/0.1")
            .build()
            .map_err(|e| WriteError::Permanent(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    /// Create from environment variables
    ///
    /// - `TSN_PROVIDER`: gateway base URL
    /// - `TSN_PRIVATE_KEY`: bearer token
    pub fn from_env() -> Result<Self, WriteError> {
        let base_url = std::env::var("TSN_PROVIDER")
            .map_err(|_| WriteError::Permanent("TSN_PROVIDER is not set".to_string()))?;
        let token = std::env::var("TSN_PRIVATE_KEY")
            .map_err(|_| WriteError::Permanent("TSN_PRIVATE_KEY is not set".to_string()))?;

        Self::new(base_url, token)
    }

    /// The gateway base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn stream_url(&self, stream_id: &StreamId) -> String {
        format!("{}/v1/streams/{}", self.base_url, stream_id)
    }

    /// Unwrap the gateway envelope, mapping failures to permanent
    /// errors (the request itself succeeded)
    fn unwrap_envelope<T>(response: ApiResponse<T>, context: &str) -> Result<T, WriteError> {
        if !response.success {
            return Err(WriteError::Permanent(format!(
                "{}: {}",
                context,
                response.error.unwrap_or_else(|| "gateway reported failure".to_string())
            )));
        }
        response
            .data
            .ok_or_else(|| WriteError::Permanent(format!("{}: empty gateway response", context)))
    }
}

#[async_trait]
impl TsnClient for HttpTsnClient {
    async fn stream_exists(&self, stream_id: &StreamId) -> Result<bool, WriteError> {
        let response = self
            .client
            .get(self.stream_url(stream_id))
            .bearer_auth(&self.token)
            .send()
            .await?;

        if response.status().as_u16() == 404 {
            return Ok(false);
        }
        response.error_for_status()?;
        Ok(true)
    }

    async fn deploy_stream(&self, stream_id: &StreamId) -> Result<(), WriteError> {
        debug!(stream_id = %stream_id, "Deploying stream");

        let request = DeployRequest {
            stream_id: stream_id.as_str(),
            stream_type: STREAM_TYPE_PRIMITIVE,
        };

        self.client
            .post(format!("{}/v1/streams", self.base_url))
            .bearer_auth(&self.token)
            .json(&request)
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }

    async fn init_stream(&self, stream_id: &StreamId) -> Result<(), WriteError> {
        self.client
            .post(format!("{}/init", self.stream_url(stream_id)))
            .bearer_auth(&self.token)
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }

    async fn insert_records(
        &self,
        stream_id: &StreamId,
        points: &[StreamPoint],
    ) -> Result<Vec<WriteReceipt>, WriteError> {
        let inserted_at = Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();
        let request = InsertRequest {
            records: points
                .iter()
                .map(|p| WireRecord {
                    date: p.date,
                    value: p.value,
                    inserted_at: Some(inserted_at.clone()),
                    metadata: p.metadata.clone(),
                })
                .collect(),
        };

        let response = self
            .client
            .post(format!("{}/records", self.stream_url(stream_id)))
            .bearer_auth(&self.token)
            .json(&request)
            .send()
            .await?
            .error_for_status()?;

        let envelope: ApiResponse<InsertResponse> = response.json().await?;
        let data = Self::unwrap_envelope(envelope, "insert_records")?;

        let receipts = data
            .results
            .into_iter()
            .map(|r| {
                let outcome = match r.status.as_str() {
                    "accepted" => WriteOutcome::Accepted {
                        tx_hash: r.tx_hash.unwrap_or_default(),
                    },
                    "duplicate" => WriteOutcome::Duplicate,
                    other => WriteOutcome::Failed {
                        reason: r
                            .reason
                            .unwrap_or_else(|| format!("gateway status '{}'", other)),
                    },
                };
                WriteReceipt {
                    stream_id: stream_id.clone(),
                    date: r.date,
                    outcome,
                }
            })
            .collect();

        Ok(receipts)
    }

    async fn get_existing_dates(
        &self,
        stream_id: &StreamId,
        date_from: NaiveDate,
    ) -> Result<BTreeSet<NaiveDate>, WriteError> {
        let response = self
            .client
            .get(format!("{}/records", self.stream_url(stream_id)))
            .query(&[("date_from", date_from.format("%Y-%m-%d").to_string())])
            .bearer_auth(&self.token)
            .send()
            .await?
            .error_for_status()?;

        let envelope: ApiResponse<RecordsResponse> = response.json().await?;
        let data = Self::unwrap_envelope(envelope, "get_existing_dates")?;

        Ok(data.records.into_iter().map(|r| r.date).collect())
    }
}
