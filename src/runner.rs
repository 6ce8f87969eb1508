//! Chunked probe execution and per-target aggregation
//!
//! A target's total packet count is split into bounded chunks so no single
//! probe service call runs unboundedly long. Chunks for one target run
//! sequentially; each result is pushed to the record queue as soon as it
//! lands, and the frozen aggregate follows after the last chunk.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::probe::ProbeService;
use crate::queue::RecordQueue;
use crate::record::{ProbeAggregate, ProbeChunkResult, Record};

/// What to do with a target's remaining chunks after one of them fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkFailurePolicy {
    /// Record the failure and keep probing the remaining chunks.
    #[default]
    Continue,
    /// Record the failure and skip the target's remaining chunks.
    AbortTarget,
}

/// Splits `total_count` packets into chunks of at most `chunk_size`.
///
/// Produces `ceil(total/chunk)` entries summing to `total_count`; the last
/// entry carries the remainder. `chunk_size` must be non-zero.
pub fn chunk_sizes(total_count: u32, chunk_size: u32) -> Vec<u32> {
    debug_assert!(chunk_size > 0);
    let mut sizes = Vec::with_capacity(total_count.div_ceil(chunk_size) as usize);
    let mut remaining = total_count;
    while remaining > 0 {
        let count = remaining.min(chunk_size);
        sizes.push(count);
        remaining -= count;
    }
    sizes
}

/// Runs one target's chunked burst through the probe service.
pub struct ProbeRunner {
    service: Arc<dyn ProbeService>,
    queue: RecordQueue,
    policy: ChunkFailurePolicy,
}

impl ProbeRunner {
    pub fn new(service: Arc<dyn ProbeService>, queue: RecordQueue, policy: ChunkFailurePolicy) -> Self {
        Self { service, queue, policy }
    }

    /// Probes `target` with `total_count` packets in chunks of `chunk_size`
    /// and returns the frozen aggregate. Chunk failures are recorded, not
    /// propagated; whether they abort the rest of the target depends on the
    /// configured policy.
    pub async fn run_target(&self, target: &str, total_count: u32, chunk_size: u32) -> ProbeAggregate {
        let sizes = chunk_sizes(total_count, chunk_size);
        info!(
            host = target,
            packets = total_count,
            chunks = sizes.len(),
            "starting probe burst"
        );

        let mut builder = AggregateBuilder::new(target);
        let mut sent_before = 0u32;
        for (index, count) in sizes.iter().copied().enumerate() {
            let first_packet = sent_before + 1;
            let last_packet = sent_before + count;
            sent_before = last_packet;

            let result = match self.service.probe(target, count).await {
                Ok(stats) => {
                    info!(
                        host = target,
                        chunk = index + 1,
                        first_packet,
                        last_packet,
                        min_ms = stats.min_ms,
                        max_ms = stats.max_ms,
                        avg_ms = stats.avg_ms,
                        "chunk ok"
                    );
                    ProbeChunkResult {
                        target: target.to_string(),
                        chunk_index: index,
                        packets_sent: count,
                        stats: Some(stats),
                        error: None,
                        timestamp: Utc::now(),
                    }
                }
                Err(err) => {
                    error!(
                        host = target,
                        chunk = index + 1,
                        first_packet,
                        last_packet,
                        error = %err,
                        "chunk failed"
                    );
                    ProbeChunkResult {
                        target: target.to_string(),
                        chunk_index: index,
                        packets_sent: count,
                        stats: None,
                        error: Some(err.to_string()),
                        timestamp: Utc::now(),
                    }
                }
            };

            let abort = !result.succeeded() && self.policy == ChunkFailurePolicy::AbortTarget;
            builder.add(&result);
            self.queue.push(Record::Chunk(result));
            if abort {
                warn!(host = target, "aborting remaining chunks for target");
                break;
            }
        }

        let aggregate = builder.finish();
        info!(
            host = target,
            packets = aggregate.total_packets_sent,
            rtt_min = aggregate.rtt_min,
            rtt_max = aggregate.rtt_max,
            rtt_avg = aggregate.rtt_avg,
            failed_chunks = aggregate.chunks_failed,
            "probe summary"
        );
        self.queue.push(Record::Summary(aggregate.clone()));
        aggregate
    }
}

/// Running fold over a target's chunk results.
///
/// Min of mins, max of maxes, equal-weight mean of per-chunk averages over
/// the succeeded chunks; zeros if none succeeded.
struct AggregateBuilder {
    target: String,
    total_packets: u32,
    min: Option<f64>,
    max: Option<f64>,
    avg_sum: f64,
    succeeded: usize,
    failed: usize,
}

impl AggregateBuilder {
    fn new(target: &str) -> Self {
        Self {
            target: target.to_string(),
            total_packets: 0,
            min: None,
            max: None,
            avg_sum: 0.0,
            succeeded: 0,
            failed: 0,
        }
    }

    fn add(&mut self, chunk: &ProbeChunkResult) {
        self.total_packets += chunk.packets_sent;
        match &chunk.stats {
            Some(stats) => {
                self.min = Some(self.min.map_or(stats.min_ms, |m| m.min(stats.min_ms)));
                self.max = Some(self.max.map_or(stats.max_ms, |m| m.max(stats.max_ms)));
                self.avg_sum += stats.avg_ms;
                self.succeeded += 1;
            }
            None => self.failed += 1,
        }
    }

    fn finish(self) -> ProbeAggregate {
        let rtt_avg = if self.succeeded > 0 {
            self.avg_sum / self.succeeded as f64
        } else {
            0.0
        };
        ProbeAggregate {
            target: self.target,
            total_packets_sent: self.total_packets,
            rtt_min: self.min.unwrap_or(0.0),
            rtt_max: self.max.unwrap_or(0.0),
            rtt_avg,
            chunks_succeeded: self.succeeded,
            chunks_failed: self.failed,
            timestamp: Utc::now(),
        }
    }
}
