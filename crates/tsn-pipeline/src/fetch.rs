//! Source fetcher boundary
//!
//! One fetcher per source type. Fetchers yield raw records lazily so
//! paginated or chunked sources never need the full dataset in memory.
//! Rate limiting and backoff are the caller's concern: the runner
//! wraps the initial `fetch` call in its [`RetryPolicy`](crate::retry::RetryPolicy).

use crate::error::FetchError;
use crate::record::RawRecord;
use crate::types::SourceSpec;
use async_trait::async_trait;
use futures::stream::BoxStream;

/// Lazy sequence of raw records from one source
pub type RawRecordStream = BoxStream<'static, Result<RawRecord, FetchError>>;

/// Retrieves raw records from one external source
///
/// Implementations own their fetch endpoint and parameters; the
/// [`SourceSpec`] supplies run-level context (name, declared schema).
/// Errors are never swallowed: transport failures, credential
/// rejections, and unparseable payloads all surface as [`FetchError`].
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Open the source and return its record stream
    ///
    /// A mid-stream `Err` halts the run; per-row oddities should
    /// instead surface as raw records that fail validation.
    async fn fetch(&self, spec: &SourceSpec) -> Result<RawRecordStream, FetchError>;
}
