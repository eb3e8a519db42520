//! Idempotent batched writer
//!
//! Submits normalized points to the network through a [`TsnClient`],
//! upholding two invariants:
//!
//! - **Idempotence**: submitting the same (stream_id, date) more than
//!   once, within or across runs, never creates a duplicate entry.
//! - **Ordering**: dates within one stream are non-decreasing in
//!   submission order. A batch is sorted before submission; a point
//!   arriving after a newer one has already been written is rejected,
//!   never silently written out of order.
//!
//! Points are buffered per stream and flushed in bounded batches to
//! limit round trips. Transient failures are retried under the
//! configured [`RetryPolicy`]; permanent failures mark the batch's
//! points failed and the run continues.

use crate::client::TsnClient;
use crate::error::{PipelineError, WriteError};
use crate::retry::RetryPolicy;
use crate::types::{StreamPoint, WriteOutcome, WriteReceipt};
use chrono::NaiveDate;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};
use tsn_common::StreamId;

/// Query horizon when seeding the dedup ledger
const LEDGER_SEED_FROM: (i32, u32, u32) = (1000, 1, 1);

/// Default points per insert call
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// How deduplication against previously written records is achieved
///
/// Whether the network guarantees idempotent writes is a deployment
/// property, so the strategy is configurable rather than assumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DedupStrategy {
    /// Seed a local ledger from the network's existing records before
    /// the first write to each stream
    #[default]
    ClientLedger,

    /// Rely on the network's idempotent-upsert semantics; the writer
    /// still suppresses redundant calls for points confirmed in the
    /// current run
    NetworkUpsert,
}

/// Aggregate writer counters plus the receipts for every point
#[derive(Debug, Default)]
pub struct WriterStats {
    pub written: u64,
    pub duplicate: u64,
    pub failed: u64,
    pub receipts: Vec<WriteReceipt>,
}

#[derive(Default)]
struct StreamState {
    /// Deploy check and ledger seeding done
    prepared: bool,
    /// Dates confirmed on the network (seeded and/or written this run)
    ledger: BTreeSet<NaiveDate>,
    /// Newest date written this run; older late arrivals are rejected
    last_written: Option<NaiveDate>,
    buffer: Vec<StreamPoint>,
}

/// Batched, deduplicating writer for one pipeline run
pub struct IdempotentWriter {
    client: Arc<dyn TsnClient>,
    policy: RetryPolicy,
    strategy: DedupStrategy,
    batch_size: usize,
    streams: HashMap<StreamId, StreamState>,
    stats: WriterStats,
}

impl IdempotentWriter {
    pub fn new(client: Arc<dyn TsnClient>, policy: RetryPolicy, strategy: DedupStrategy) -> Self {
        Self::with_batch_size(client, policy, strategy, DEFAULT_BATCH_SIZE)
    }

    pub fn with_batch_size(
        client: Arc<dyn TsnClient>,
        policy: RetryPolicy,
        strategy: DedupStrategy,
        batch_size: usize,
    ) -> Self {
        Self {
            client,
            policy,
            strategy,
            batch_size: batch_size.max(1),
            streams: HashMap::new(),
            stats: WriterStats::default(),
        }
    }

    /// Queue one point, flushing its stream when the batch fills
    ///
    /// Errors here are fatal (stream deployment or ledger seeding
    /// failed); per-point write failures are accounted in the stats
    /// instead.
    pub async fn push(&mut self, point: StreamPoint) -> Result<(), PipelineError> {
        let stream_id = point.stream_id.clone();
        let state = self.streams.entry(stream_id.clone()).or_default();
        state.buffer.push(point);

        if state.buffer.len() >= self.batch_size {
            self.flush_stream(&stream_id).await?;
        }
        Ok(())
    }

    /// Flush all remaining buffers and return the accumulated stats
    pub async fn finish(mut self) -> Result<WriterStats, PipelineError> {
        let stream_ids: Vec<StreamId> = self.streams.keys().cloned().collect();
        for stream_id in stream_ids {
            self.flush_stream(&stream_id).await?;
        }

        info!(
            written = self.stats.written,
            duplicate = self.stats.duplicate,
            failed = self.stats.failed,
            "Writer finished"
        );
        Ok(self.stats)
    }

    async fn flush_stream(&mut self, stream_id: &StreamId) -> Result<(), PipelineError> {
        let state = match self.streams.get_mut(stream_id) {
            Some(state) => state,
            None => return Ok(()),
        };
        if state.buffer.is_empty() {
            return Ok(());
        }
        let mut batch = std::mem::take(&mut state.buffer);

        if !state.prepared {
            self.prepare_stream(stream_id).await?;
        }

        // Reorder inside the batch; sort is stable so equal dates keep
        // their arrival order.
        batch.sort_by_key(|p| p.date);

        let state = self
            .streams
            .get_mut(stream_id)
            .ok_or_else(|| PipelineError::Client("stream state vanished mid-flush".to_string()))?;

        let mut to_submit: Vec<StreamPoint> = Vec::with_capacity(batch.len());
        let mut batch_dates: BTreeSet<NaiveDate> = BTreeSet::new();

        for point in batch {
            if state.ledger.contains(&point.date) || batch_dates.contains(&point.date) {
                self.stats.duplicate += 1;
                self.stats.receipts.push(WriteReceipt {
                    stream_id: stream_id.clone(),
                    date: point.date,
                    outcome: WriteOutcome::Duplicate,
                });
                continue;
            }

            if let Some(last) = state.last_written {
                if point.date < last {
                    warn!(
                        stream_id = %stream_id,
                        date = %point.date,
                        last_written = %last,
                        "Rejecting out-of-order point"
                    );
                    self.stats.failed += 1;
                    self.stats.receipts.push(WriteReceipt {
                        stream_id: stream_id.clone(),
                        date: point.date,
                        outcome: WriteOutcome::Failed {
                            reason: format!(
                                "out of order: {} arrived after {} was written",
                                point.date, last
                            ),
                        },
                    });
                    continue;
                }
            }

            batch_dates.insert(point.date);
            to_submit.push(point);
        }

        if to_submit.is_empty() {
            return Ok(());
        }

        debug!(stream_id = %stream_id, count = to_submit.len(), "Submitting batch");

        let client = Arc::clone(&self.client);
        let result = self
            .policy
            .run("insert_records", || {
                let client = Arc::clone(&client);
                let points = to_submit.clone();
                let stream_id = stream_id.clone();
                async move { client.insert_records(&stream_id, &points).await }
            })
            .await;

        match result {
            Ok(receipts) => {
                for receipt in receipts {
                    match &receipt.outcome {
                        WriteOutcome::Accepted { .. } => {
                            self.stats.written += 1;
                            state.ledger.insert(receipt.date);
                            state.last_written = Some(
                                state.last_written.map_or(receipt.date, |d| d.max(receipt.date)),
                            );
                        },
                        WriteOutcome::Duplicate => {
                            self.stats.duplicate += 1;
                            state.ledger.insert(receipt.date);
                        },
                        WriteOutcome::Failed { .. } => {
                            self.stats.failed += 1;
                        },
                    }
                    self.stats.receipts.push(receipt);
                }
            },
            Err(err) => {
                // Reported and skipped; the run carries on as partial.
                warn!(stream_id = %stream_id, "Batch write failed after retries: {}", err);
                for point in to_submit {
                    self.stats.failed += 1;
                    self.stats.receipts.push(WriteReceipt {
                        stream_id: stream_id.clone(),
                        date: point.date,
                        outcome: WriteOutcome::Failed {
                            reason: err.to_string(),
                        },
                    });
                }
            },
        }

        Ok(())
    }

    /// Deploy the stream if missing and seed the dedup ledger
    async fn prepare_stream(&mut self, stream_id: &StreamId) -> Result<(), PipelineError> {
        let client = Arc::clone(&self.client);

        let exists = self
            .policy
            .run("stream_exists", || {
                let client = Arc::clone(&client);
                let stream_id = stream_id.clone();
                async move { client.stream_exists(&stream_id).await }
            })
            .await
            .map_err(|e| PipelineError::StreamDeploy {
                stream_id: stream_id.to_string(),
                reason: e.to_string(),
            })?;

        if !exists {
            info!(stream_id = %stream_id, "Stream missing, deploying");
            for (op_name, call) in [("deploy_stream", true), ("init_stream", false)] {
                let client = Arc::clone(&client);
                self.policy
                    .run(op_name, || {
                        let client = Arc::clone(&client);
                        let stream_id = stream_id.clone();
                        async move {
                            if call {
                                client.deploy_stream(&stream_id).await
                            } else {
                                client.init_stream(&stream_id).await
                            }
                        }
                    })
                    .await
                    .map_err(|e| PipelineError::StreamDeploy {
                        stream_id: stream_id.to_string(),
                        reason: e.to_string(),
                    })?;
            }
        }

        let seeded = match self.strategy {
            DedupStrategy::ClientLedger => {
                let (y, m, d) = LEDGER_SEED_FROM;
                let from = NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default();
                let dates = self
                    .policy
                    .run("get_existing_dates", || {
                        let client = Arc::clone(&client);
                        let stream_id = stream_id.clone();
                        async move { client.get_existing_dates(&stream_id, from).await }
                    })
                    .await
                    .map_err(|e| PipelineError::Client(format!(
                        "failed to seed dedup ledger for {}: {}",
                        stream_id, e
                    )))?;
                debug!(stream_id = %stream_id, existing = dates.len(), "Seeded dedup ledger");
                dates
            },
            DedupStrategy::NetworkUpsert => BTreeSet::new(),
        };

        let state = self
            .streams
            .get_mut(stream_id)
            .ok_or_else(|| PipelineError::Client("stream state vanished mid-prepare".to_string()))?;
        state.ledger.extend(seeded);
        state.prepared = true;

        Ok(())
    }
}
