//! Pipeline orchestration shim
//!
//! Composes fetch -> validate -> normalize -> write into the single
//! invocable unit an external scheduler calls on a cron-like cadence.
//! The runner holds no state between invocations; everything a run
//! learns lives in its [`RunSummary`].

use crate::error::PipelineError;
use crate::fetch::SourceFetcher;
use crate::normalize::normalize;
use crate::retry::RetryPolicy;
use crate::schema::ValidationStats;
use crate::types::{RunSummary, SourceSpec};
use crate::writer::{DedupStrategy, IdempotentWriter, DEFAULT_BATCH_SIZE};
use crate::TsnClient;
use futures::StreamExt;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Runs one source pipeline end to end
pub struct PipelineRunner {
    client: Arc<dyn TsnClient>,
    policy: RetryPolicy,
    strategy: DedupStrategy,
    batch_size: usize,
}

impl PipelineRunner {
    pub fn new(client: Arc<dyn TsnClient>) -> Self {
        Self {
            client,
            policy: RetryPolicy::default(),
            strategy: DedupStrategy::default(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_dedup_strategy(mut self, strategy: DedupStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Execute one streaming pass over the source
    ///
    /// Always returns a summary. Per-record problems are counted;
    /// fatal errors (source unavailable, invalid schema, stream
    /// deployment failure) halt the run and are recorded with
    /// partial-progress counts.
    pub async fn run(&self, spec: &SourceSpec, fetcher: &dyn SourceFetcher) -> RunSummary {
        let mut summary = RunSummary::new(&spec.name);
        info!(source = %spec.name, "Starting pipeline run");

        if let Err(reason) = spec.schema.check() {
            error!(source = %spec.name, "Invalid schema configuration: {}", reason);
            summary.fatal_error = Some(PipelineError::SchemaConfig(reason).to_string());
            summary.finalize();
            return summary;
        }

        let mut stream = match self
            .policy
            .run("fetch", || fetcher.fetch(spec))
            .await
        {
            Ok(stream) => stream,
            Err(err) => {
                error!(source = %spec.name, "Source unavailable: {}", err);
                summary.fatal_error = Some(PipelineError::SourceUnavailable(err).to_string());
                summary.finalize();
                return summary;
            },
        };

        let mut writer = IdempotentWriter::with_batch_size(
            Arc::clone(&self.client),
            self.policy,
            self.strategy,
            self.batch_size,
        );
        let mut validation = ValidationStats::default();

        while let Some(item) = stream.next().await {
            let raw = match item {
                Ok(raw) => raw,
                Err(err) => {
                    // Mid-stream transport failure; halt with partial counts
                    error!(source = %spec.name, "Fetch stream failed: {}", err);
                    summary.fatal_error =
                        Some(PipelineError::SourceUnavailable(err).to_string());
                    break;
                },
            };
            summary.fetched += 1;

            let validated = spec.schema.validate(raw, &mut validation);
            if let crate::record::ValidationStatus::Rejected(reason) = &validated.status {
                warn!(source = %spec.name, "Record rejected: {}", reason);
                summary.rejection_reasons.push(reason.clone());
                continue;
            }

            match normalize(&validated, &spec.mapping) {
                Ok(Some(point)) => {
                    summary.normalized += 1;
                    if let Err(err) = writer.push(point).await {
                        error!(source = %spec.name, "Fatal write error: {}", err);
                        summary.fatal_error = Some(err.to_string());
                        break;
                    }
                },
                Ok(None) => {
                    summary.filtered += 1;
                },
                Err(err) => {
                    warn!(source = %spec.name, "Record dropped: {}", err);
                    summary.dropped += 1;
                    summary.rejection_reasons.push(err.to_string());
                },
            }
        }

        summary.passed = validation.passed;
        summary.coerced = validation.coerced;
        summary.rejected = validation.rejected;

        match writer.finish().await {
            Ok(stats) => {
                summary.written = stats.written;
                summary.duplicate = stats.duplicate;
                summary.failed = stats.failed;
            },
            Err(err) => {
                error!(source = %spec.name, "Fatal error flushing writer: {}", err);
                if summary.fatal_error.is_none() {
                    summary.fatal_error = Some(err.to_string());
                }
            },
        }

        summary.finalize();
        info!(
            source = %spec.name,
            outcome = summary.outcome.as_str(),
            fetched = summary.fetched,
            rejected = summary.rejected,
            normalized = summary.normalized,
            dropped = summary.dropped,
            written = summary.written,
            duplicate = summary.duplicate,
            failed = summary.failed,
            "Pipeline run finished"
        );
        summary
    }
}
