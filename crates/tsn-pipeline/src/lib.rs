//! TSN ingestion pipeline core
//!
//! Source-agnostic infrastructure for publishing external datasets as
//! time-series records on the TSN network. A pipeline run is a single
//! streaming pass over one source:
//!
//! ```text
//! fetch -> validate -> normalize -> write
//! ```
//!
//! - **fetch**: a [`fetch::SourceFetcher`] yields raw records lazily,
//!   so large sources are never fully materialized.
//! - **validate**: [`schema::Schema`] enforces declared field types and
//!   ranges, coercing where possible; a bad record never aborts a run.
//! - **normalize**: [`normalize::MappingRule`] maps validated records
//!   onto canonical [`types::StreamPoint`]s with deterministic stream
//!   ids and ISO dates.
//! - **write**: [`writer::IdempotentWriter`] batches points per stream
//!   and submits them through a [`client::TsnClient`], deduplicating
//!   against the network and retrying transient failures.
//!
//! The [`runner::PipelineRunner`] composes the stages and always
//! returns a [`types::RunSummary`], even on partial failure. Only
//! run-wide fatal errors mark the run as failed.

pub mod client;
pub mod error;
pub mod fetch;
pub mod normalize;
pub mod record;
pub mod retry;
pub mod runner;
pub mod schema;
pub mod types;
pub mod writer;

pub use client::{HttpTsnClient, TsnClient};
pub use error::{FetchError, NormalizeError, PipelineError, WriteError};
pub use fetch::{RawRecordStream, SourceFetcher};
pub use normalize::{DateRule, MappingRule, StreamIdRule};
pub use record::{RawRecord, ValidatedRecord, ValidationStatus};
pub use retry::RetryPolicy;
pub use runner::PipelineRunner;
pub use schema::{FieldSpec, FieldType, Schema, ValidationStats};
pub use types::{
    RunOutcome, RunSummary, SourceSpec, StreamPoint, WriteOutcome, WriteReceipt,
};
pub use writer::{DedupStrategy, IdempotentWriter, WriterStats};
