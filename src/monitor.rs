//! Fixed-interval system monitoring loop
//!
//! Samples the host at each tick and pushes the result to the record queue
//! until either the stop signal fires or the monitoring window elapses. On
//! its own timeout the loop sets the stop signal itself, which lets a pure
//! monitoring session self-terminate. Ticks are best-effort: a slow sample
//! delays the next tick, it is never caught up.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tracing::info;

use crate::queue::RecordQueue;
use crate::record::Record;
use crate::sampler::SystemSampler;
use crate::signal::StopSignal;

pub struct MonitorLoop {
    sampler: Arc<dyn SystemSampler>,
    queue: RecordQueue,
    stop: StopSignal,
    interval: Duration,
    max_duration: Duration,
}

impl MonitorLoop {
    pub fn new(
        sampler: Arc<dyn SystemSampler>,
        queue: RecordQueue,
        stop: StopSignal,
        interval: Duration,
        max_duration: Duration,
    ) -> Self {
        Self {
            sampler,
            queue,
            stop,
            interval,
            max_duration,
        }
    }

    /// Runs the loop to completion and returns the number of samples pushed.
    pub async fn run(self) -> usize {
        info!(
            interval_secs = self.interval.as_secs_f64(),
            max_secs = self.max_duration.as_secs_f64(),
            "monitoring loop started"
        );

        let started = Instant::now();
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut samples = 0usize;
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = self.stop.wait() => {
                    info!("monitoring loop observed stop signal");
                    break;
                }
            }
            if self.stop.is_set() {
                info!("monitoring loop observed stop signal");
                break;
            }

            let sample = self.sampler.sample().await;
            info!(
                cpu = sample.cpu_percent,
                mem = sample.mem_percent,
                disk = sample.disk_percent,
                "system sample"
            );
            self.queue.push(Record::Sample(sample));
            samples += 1;

            if started.elapsed() >= self.max_duration {
                info!("monitoring window elapsed, raising stop signal");
                self.stop.set();
                break;
            }
        }

        info!(samples, "monitoring loop finished");
        samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::record_queue;
    use crate::testutil::StaticSampler;

    fn monitor(
        queue: RecordQueue,
        stop: StopSignal,
        interval_secs: u64,
        max_secs: u64,
    ) -> MonitorLoop {
        MonitorLoop::new(
            Arc::new(StaticSampler),
            queue,
            stop,
            Duration::from_secs(interval_secs),
            Duration::from_secs(max_secs),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn self_terminates_at_max_duration() {
        let (queue, mut receiver) = record_queue();
        let stop = StopSignal::new();

        // interval 1s, window 5s: ticks at t=0..=5, boundary inclusive.
        let samples = monitor(queue, stop.clone(), 1, 5).run().await;

        assert_eq!(samples, 6);
        assert!(stop.is_set());

        let mut records = Vec::new();
        assert_eq!(receiver.recv_batch(&mut records, 16).await, 6);
        assert!(records.iter().all(|r| matches!(r, Record::Sample(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn exits_without_sampling_when_stop_preset() {
        let (queue, _receiver) = record_queue();
        let stop = StopSignal::new();
        stop.set();

        let samples = monitor(queue, stop, 1, 100).run().await;
        assert_eq!(samples, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn external_stop_ends_the_loop_mid_window() {
        let (queue, _receiver) = record_queue();
        let stop = StopSignal::new();

        let handle = tokio::spawn(monitor(queue, stop.clone(), 1, 1000).run());
        tokio::time::sleep(Duration::from_millis(3500)).await;
        stop.set();

        // Samples at t=0,1,2,3; the t=4 tick never fires.
        let samples = handle.await.unwrap();
        assert_eq!(samples, 4);
    }
}
