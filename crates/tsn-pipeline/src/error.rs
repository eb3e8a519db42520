//! Error taxonomy for the ingestion pipeline
//!
//! Per-record problems (validation rejections, unparseable dates) are
//! not represented here as hard errors; they are counted and reported
//! in the run summary. These types cover the failures that need a
//! retry decision or halt a run.

use thiserror::Error;

/// Errors raised while fetching raw records from an external source
#[derive(Error, Debug)]
pub enum FetchError {
    /// Network-level failure (connection, timeout, non-2xx status)
    #[error("Fetch failed: {0}. Check the source endpoint and your network connection.")]
    Network(String),

    /// Credentials were rejected or missing for a protected source
    #[error("Authentication failed: {0}. Verify the configured token or credentials.")]
    Auth(String),

    /// Response body could not be parsed into raw records
    #[error("Unparseable source response: {0}")]
    Format(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) if status.as_u16() == 401 || status.as_u16() == 403 => {
                FetchError::Auth(err.to_string())
            },
            _ => FetchError::Network(err.to_string()),
        }
    }
}

/// Per-record normalization failure; the record is dropped with a
/// logged reason, never halting the run
#[derive(Error, Debug)]
pub enum NormalizeError {
    #[error("Unparseable date {value:?} in field '{field}'")]
    BadDate { field: String, value: String },

    #[error("Non-numeric value {value:?} in field '{field}'")]
    BadValue { field: String, value: String },

    #[error("Missing field '{0}' required by the mapping rule")]
    MissingField(String),
}

/// Errors raised while submitting points to the network
#[derive(Error, Debug)]
pub enum WriteError {
    /// Retried with bounded exponential backoff
    #[error("Transient write failure: {0}")]
    Transient(String),

    /// Reported and skipped, never retried indefinitely
    #[error("Permanent write failure: {0}")]
    Permanent(String),
}

impl From<reqwest::Error> for WriteError {
    fn from(err: reqwest::Error) -> Self {
        let transient = err.is_timeout()
            || err.is_connect()
            || err
                .status()
                .map(|s| s.is_server_error() || s.as_u16() == 429)
                .unwrap_or(true);

        if transient {
            WriteError::Transient(err.to_string())
        } else {
            WriteError::Permanent(err.to_string())
        }
    }
}

/// Run-wide fatal errors; these halt the pipeline and surface to the
/// scheduler with partial-progress accounting
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Source unavailable: {0}")]
    SourceUnavailable(#[from] FetchError),

    #[error("Invalid schema configuration: {0}")]
    SchemaConfig(String),

    #[error("Stream {stream_id} could not be deployed: {reason}")]
    StreamDeploy { stream_id: String, reason: String },

    #[error("TSN client error: {0}")]
    Client(String),

    #[error(transparent)]
    Common(#[from] tsn_common::TsnError),
}

/// Classifies errors into retryable and terminal for the retry policy
pub trait IsTransient {
    fn is_transient(&self) -> bool;
}

impl IsTransient for FetchError {
    fn is_transient(&self) -> bool {
        matches!(self, FetchError::Network(_))
    }
}

impl IsTransient for WriteError {
    fn is_transient(&self) -> bool {
        matches!(self, WriteError::Transient(_))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_transient_classification() {
        assert!(FetchError::Network("timeout".into()).is_transient());
        assert!(!FetchError::Auth("bad token".into()).is_transient());
        assert!(!FetchError::Format("not csv".into()).is_transient());
    }

    #[test]
    fn test_write_error_transient_classification() {
        assert!(WriteError::Transient("503".into()).is_transient());
        assert!(!WriteError::Permanent("400".into()).is_transient());
    }
}
