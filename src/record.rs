//! Telemetry record types and their CSV projection
//!
//! Everything the session persists flows through the [`Record`] union:
//! periodic system samples from the monitoring loop, per-chunk probe results
//! from the workers, and the frozen per-target aggregate emitted after a
//! target's last chunk. All three share one append-only CSV schema; a row
//! fills either the system columns or the probe columns and leaves the other
//! side blank.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Column header written exactly once when the store is created.
pub const CSV_HEADER: &str = "timestamp,cpu_percent,mem_percent,mem_used_mb,\
mem_free_mb,disk_percent,disk_free_gb,target,rtt_min,rtt_max,rtt_avg";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One snapshot of host resource usage
#[derive(Debug, Clone, Serialize)]
pub struct SystemSample {
    pub timestamp: DateTime<Utc>,
    pub cpu_percent: f32,
    pub mem_percent: f32,
    pub mem_used_mb: u64,
    pub mem_free_mb: u64,
    pub disk_percent: f32,
    pub disk_free_gb: f64,
}

/// RTT summary of one probe burst, in milliseconds
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RttStats {
    pub min_ms: f64,
    pub max_ms: f64,
    pub avg_ms: f64,
}

/// Outcome of a single chunk sent through the probe service.
///
/// Pushed to the queue as soon as the chunk finishes, so partial progress is
/// durable even if the aggregate for the target is never finalized.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeChunkResult {
    pub target: String,
    /// Zero-based position of this chunk within its target's burst.
    pub chunk_index: usize,
    pub packets_sent: u32,
    /// `Some` iff the chunk succeeded.
    pub stats: Option<RttStats>,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ProbeChunkResult {
    pub fn succeeded(&self) -> bool {
        self.stats.is_some()
    }
}

/// Per-target summary frozen after the target's last chunk.
///
/// RTT fields are folded over succeeded chunks only; if every chunk failed
/// they are reported as zeros, never NaN.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeAggregate {
    pub target: String,
    pub total_packets_sent: u32,
    pub rtt_min: f64,
    pub rtt_max: f64,
    pub rtt_avg: f64,
    pub chunks_succeeded: usize,
    pub chunks_failed: usize,
    pub timestamp: DateTime<Utc>,
}

/// Unit stored in the record queue and appended to the telemetry store
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Record {
    Sample(SystemSample),
    Chunk(ProbeChunkResult),
    Summary(ProbeAggregate),
}

impl Record {
    /// Renders one CSV data row matching [`CSV_HEADER`], without a trailing
    /// newline.
    pub fn to_csv_row(&self) -> String {
        match self {
            Record::Sample(s) => format!(
                "{},{:.2},{:.2},{},{},{:.2},{:.2},,,,",
                s.timestamp.format(TIMESTAMP_FORMAT),
                s.cpu_percent,
                s.mem_percent,
                s.mem_used_mb,
                s.mem_free_mb,
                s.disk_percent,
                s.disk_free_gb,
            ),
            Record::Chunk(c) => {
                let stats = c.stats.clone().unwrap_or_default();
                probe_row(&c.timestamp, &c.target, stats.min_ms, stats.max_ms, stats.avg_ms)
            }
            Record::Summary(a) => probe_row(&a.timestamp, &a.target, a.rtt_min, a.rtt_max, a.rtt_avg),
        }
    }
}

fn probe_row(timestamp: &DateTime<Utc>, target: &str, min: f64, max: f64, avg: f64) -> String {
    format!(
        "{},,,,,,,{},{:.3},{:.3},{:.3}",
        timestamp.format(TIMESTAMP_FORMAT),
        target,
        min,
        max,
        avg,
    )
}
