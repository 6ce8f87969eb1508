//! Scripted collaborators for exercising the pipeline without a network
//! or a real host query.

use std::collections::VecDeque;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use crate::probe::{ProbeError, ProbeService};
use crate::record::{RttStats, SystemSample};
use crate::sampler::SystemSampler;

pub fn rtt(min_ms: f64, max_ms: f64, avg_ms: f64) -> RttStats {
    RttStats { min_ms, max_ms, avg_ms }
}

/// Probe service replaying a queue of scripted outcomes in call order.
///
/// `check_ready` always succeeds; an exhausted script fails loudly so a test
/// that probes more than it scripted cannot pass by accident.
pub struct ScriptedProber {
    outcomes: Mutex<VecDeque<Result<RttStats, String>>>,
    pub calls: AtomicUsize,
    pub packet_counts: Mutex<Vec<u32>>,
}

impl ScriptedProber {
    pub fn new(outcomes: Vec<Result<RttStats, String>>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into()),
            calls: AtomicUsize::new(0),
            packet_counts: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ProbeService for ScriptedProber {
    async fn check_ready(&self) -> Result<(), ProbeError> {
        Ok(())
    }

    async fn probe(&self, target: &str, packet_count: u32) -> Result<RttStats, ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.packet_counts.lock().push(packet_count);
        match self.outcomes.lock().pop_front() {
            Some(Ok(stats)) => Ok(stats),
            Some(Err(detail)) => Err(ProbeError::Failed {
                target: target.to_string(),
                detail,
            }),
            None => Err(ProbeError::Failed {
                target: target.to_string(),
                detail: "scripted outcomes exhausted".to_string(),
            }),
        }
    }
}

/// Sampler returning a fixed snapshot instantly.
pub struct StaticSampler;

#[async_trait]
impl SystemSampler for StaticSampler {
    async fn sample(&self) -> SystemSample {
        SystemSample {
            timestamp: Utc::now(),
            cpu_percent: 12.5,
            mem_percent: 40.0,
            mem_used_mb: 2048,
            mem_free_mb: 3072,
            disk_percent: 55.0,
            disk_free_gb: 120.5,
        }
    }
}
