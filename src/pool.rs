//! Bounded fan-out of per-target probe work
//!
//! One task per target, throttled by a semaphore so at most `worker_limit`
//! bursts run concurrently. Completion means every spawned unit has joined,
//! success or failure; a failing target never cancels its siblings.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info};

use crate::record::ProbeAggregate;
use crate::runner::ProbeRunner;

pub struct ProbePool {
    runner: Arc<ProbeRunner>,
    worker_limit: usize,
}

impl ProbePool {
    pub fn new(runner: Arc<ProbeRunner>, worker_limit: usize) -> Self {
        Self { runner, worker_limit }
    }

    /// Probes every target in `targets` (duplicates included, each processed
    /// independently) and resolves once all of them have finished. Aggregates
    /// are returned in completion order.
    pub async fn run(&self, targets: &[String], packet_count: u32, chunk_size: u32) -> Vec<ProbeAggregate> {
        if targets.is_empty() {
            return Vec::new();
        }

        let permits = self.worker_limit.max(1).min(targets.len());
        info!(targets = targets.len(), workers = permits, "probe pool starting");
        let semaphore = Arc::new(Semaphore::new(permits));

        let mut tasks = JoinSet::new();
        for target in targets.iter().cloned() {
            let runner = Arc::clone(&self.runner);
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                // The semaphore is never closed; a failed acquire just means
                // the task runs unthrottled.
                let _permit = semaphore.acquire_owned().await.ok();
                runner.run_target(&target, packet_count, chunk_size).await
            });
        }

        let mut aggregates = Vec::with_capacity(targets.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(aggregate) => aggregates.push(aggregate),
                Err(err) => error!(error = %err, "probe worker task failed"),
            }
        }
        info!(completed = aggregates.len(), "probe pool finished");
        aggregates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::record_queue;
    use crate::runner::ChunkFailurePolicy;
    use crate::testutil::{rtt, ScriptedProber};
    use std::sync::atomic::Ordering;

    #[tokio::test]
    async fn duplicate_targets_are_probed_independently() {
        let prober = Arc::new(ScriptedProber::new(vec![
            Ok(rtt(1.0, 2.0, 1.5)),
            Ok(rtt(1.0, 2.0, 1.5)),
            Ok(rtt(1.0, 2.0, 1.5)),
        ]));
        let (queue, _receiver) = record_queue();
        let runner = Arc::new(ProbeRunner::new(prober.clone(), queue, ChunkFailurePolicy::Continue));
        let pool = ProbePool::new(runner, 2);

        let targets = vec![
            "10.0.0.1".to_string(),
            "10.0.0.1".to_string(),
            "10.0.0.2".to_string(),
        ];
        let aggregates = pool.run(&targets, 5, 10).await;

        assert_eq!(aggregates.len(), 3);
        assert_eq!(prober.calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            aggregates.iter().filter(|a| a.target == "10.0.0.1").count(),
            2
        );
    }

    #[tokio::test]
    async fn one_failing_target_does_not_cancel_siblings() {
        let prober = Arc::new(ScriptedProber::new(vec![
            Err("unreachable".to_string()),
            Ok(rtt(1.0, 2.0, 1.5)),
        ]));
        let (queue, _receiver) = record_queue();
        let runner = Arc::new(ProbeRunner::new(prober, queue, ChunkFailurePolicy::Continue));
        // Single worker keeps the scripted outcome order deterministic.
        let pool = ProbePool::new(runner, 1);

        let targets = vec!["10.0.0.9".to_string(), "10.0.0.1".to_string()];
        let aggregates = pool.run(&targets, 5, 10).await;

        assert_eq!(aggregates.len(), 2);
        assert_eq!(
            aggregates.iter().filter(|a| a.chunks_succeeded == 1).count(),
            1
        );
        assert_eq!(
            aggregates.iter().filter(|a| a.chunks_failed == 1).count(),
            1
        );
    }

    #[tokio::test]
    async fn empty_target_list_completes_immediately() {
        let prober = Arc::new(ScriptedProber::new(Vec::new()));
        let (queue, _receiver) = record_queue();
        let runner = Arc::new(ProbeRunner::new(prober.clone(), queue, ChunkFailurePolicy::Continue));
        let pool = ProbePool::new(runner, 4);

        assert!(pool.run(&[], 5, 10).await.is_empty());
        assert_eq!(prober.calls.load(Ordering::SeqCst), 0);
    }
}
