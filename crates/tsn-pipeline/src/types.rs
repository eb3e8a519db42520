//! Canonical pipeline types
//!
//! The write model of the network is minimal: a stream is addressed by
//! a [`StreamId`](tsn_common::StreamId) and holds (date, value) points
//! with optional metadata. Everything a source produces is funneled
//! into that shape before submission.

use crate::normalize::MappingRule;
use crate::schema::Schema;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tsn_common::StreamId;

/// Canonical unit submitted to the network
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamPoint {
    pub stream_id: StreamId,

    /// Canonical timestamp: an ISO calendar date, regardless of the
    /// source-local format
    pub date: NaiveDate,

    pub value: f64,

    /// Optional source-specific annotations carried through to the
    /// network
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, String>>,
}

/// Result of submitting one stream point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum WriteOutcome {
    /// Newly written; carries the network-assigned confirmation token
    Accepted { tx_hash: String },
    /// Already present on the network or earlier in this run
    Duplicate,
    /// Not written; reported and skipped
    Failed { reason: String },
}

/// Receipt for a submitted point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteReceipt {
    pub stream_id: StreamId,
    pub date: NaiveDate,
    #[serde(flatten)]
    pub outcome: WriteOutcome,
}

impl WriteReceipt {
    pub fn is_accepted(&self) -> bool {
        matches!(self.outcome, WriteOutcome::Accepted { .. })
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self.outcome, WriteOutcome::Duplicate)
    }
}

/// Static configuration for one external source
///
/// Owned by the orchestration shim; loaded once per run and never
/// mutated mid-run. The fetch endpoint and its parameters live in the
/// source-specific fetcher configuration assembled next to this spec.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSpec {
    /// Human-readable source name, used in logs and summaries
    pub name: String,

    /// Declared schema the fetched records must conform to
    pub schema: Schema,

    /// How validated records map onto stream points
    pub mapping: MappingRule,
}

/// Overall outcome of a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every fetched record was written or deduplicated
    Success,
    /// The run completed but some records were rejected, dropped, or
    /// failed to write
    Partial,
    /// A fatal error halted the run; counts reflect partial progress
    Failed,
}

impl RunOutcome {
    pub fn as_str(&self) -> &str {
        match self {
            RunOutcome::Success => "success",
            RunOutcome::Partial => "partial",
            RunOutcome::Failed => "failed",
        }
    }
}

/// Aggregate accounting for one pipeline run
///
/// Always produced, even when the run halts early. Per-record problems
/// are counted here instead of aborting the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub source: String,
    pub outcome: RunOutcome,

    /// Records produced by the fetcher
    pub fetched: u64,
    /// Records that passed validation unchanged
    pub passed: u64,
    /// Records accepted after coercion or default filling
    pub coerced: u64,
    /// Records rejected by the validator
    pub rejected: u64,
    /// Points produced by the normalizer
    pub normalized: u64,
    /// Records excluded by the mapping rule's filter
    pub filtered: u64,
    /// Records dropped during normalization (unparseable date, bad value)
    pub dropped: u64,
    /// Points newly written to the network
    pub written: u64,
    /// Points skipped as already present (idempotence)
    pub duplicate: u64,
    /// Points that failed to write after retries
    pub failed: u64,

    /// Per-record rejection and drop reasons, in encounter order
    pub rejection_reasons: Vec<String>,

    /// Fatal error that halted the run, if any
    pub fatal_error: Option<String>,
}

impl RunSummary {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            outcome: RunOutcome::Success,
            fetched: 0,
            passed: 0,
            coerced: 0,
            rejected: 0,
            normalized: 0,
            filtered: 0,
            dropped: 0,
            written: 0,
            duplicate: 0,
            failed: 0,
            rejection_reasons: Vec::new(),
            fatal_error: None,
        }
    }

    /// Records accepted by the validator (passed or coerced)
    pub fn validated(&self) -> u64 {
        self.passed + self.coerced
    }

    /// Resolve the final outcome from the counts and fatal state
    pub fn finalize(&mut self) {
        self.outcome = if self.fatal_error.is_some() {
            RunOutcome::Failed
        } else if self.rejected > 0 || self.dropped > 0 || self.failed > 0 {
            RunOutcome::Partial
        } else {
            RunOutcome::Success
        };
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_finalize_success() {
        let mut summary = RunSummary::new("test");
        summary.fetched = 5;
        summary.passed = 5;
        summary.written = 5;
        summary.finalize();
        assert_eq!(summary.outcome, RunOutcome::Success);
    }

    #[test]
    fn test_finalize_partial_on_rejects() {
        let mut summary = RunSummary::new("test");
        summary.fetched = 5;
        summary.rejected = 1;
        summary.finalize();
        assert_eq!(summary.outcome, RunOutcome::Partial);
    }

    #[test]
    fn test_finalize_failed_wins_over_partial() {
        let mut summary = RunSummary::new("test");
        summary.rejected = 1;
        summary.fatal_error = Some("source unavailable".to_string());
        summary.finalize();
        assert_eq!(summary.outcome, RunOutcome::Failed);
    }

    #[test]
    fn test_validated_counts() {
        let mut summary = RunSummary::new("test");
        summary.passed = 3;
        summary.coerced = 2;
        assert_eq!(summary.validated(), 5);
    }
}
