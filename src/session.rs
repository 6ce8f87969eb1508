//! Session controller and termination protocol
//!
//! Owns the stop signal and the record queue, spawns the monitoring loop,
//! the probe pool and the persistence writer, and walks the session through
//! `Starting -> Running -> Draining -> Terminated`.
//!
//! Exactly two paths may set the stop signal: the monitoring loop's own
//! max-duration timeout, and the controller's join on probe pool completion.
//! Setting it twice is a no-op by construction.

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::time::Instant;
use tracing::{error, info};
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::monitor::MonitorLoop;
use crate::pool::ProbePool;
use crate::probe::{PingProber, ProbeService};
use crate::queue::record_queue;
use crate::record::ProbeAggregate;
use crate::runner::ProbeRunner;
use crate::sampler::{SysinfoSampler, SystemSampler};
use crate::signal::StopSignal;
use crate::writer::{CsvStore, PersistenceWriter, WriterReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Starting,
    Running,
    Draining,
    Terminated,
}

/// Everything a bounded session produced, reported at exit.
#[derive(Debug, Serialize)]
pub struct SessionReport {
    pub session_id: Uuid,
    pub elapsed_secs: f64,
    pub samples_taken: usize,
    pub aggregates: Vec<ProbeAggregate>,
    pub records_written: usize,
    pub records_lost: usize,
}

pub struct SessionController {
    config: SessionConfig,
    probe: Arc<dyn ProbeService>,
    sampler: Arc<dyn SystemSampler>,
    session_id: Uuid,
    state: SessionState,
}

impl SessionController {
    pub fn new(
        config: SessionConfig,
        probe: Arc<dyn ProbeService>,
        sampler: Arc<dyn SystemSampler>,
    ) -> Self {
        Self {
            config,
            probe,
            sampler,
            session_id: Uuid::new_v4(),
            state: SessionState::Starting,
        }
    }

    /// Controller wired to the production collaborators: `ping` subprocess
    /// probes and a sysinfo-backed sampler.
    pub fn with_default_collaborators(config: SessionConfig) -> Self {
        let timeout = config.probe_timeout();
        Self::new(config, Arc::new(PingProber::new(timeout)), Arc::new(SysinfoSampler))
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    fn transition(&mut self, next: SessionState) {
        info!(session = %self.session_id, from = ?self.state, to = ?next, "session state transition");
        self.state = next;
    }

    /// Runs one bounded session to completion.
    ///
    /// The only error that escapes is the startup connectivity check; probe,
    /// sampler and store failures are recorded and contained.
    pub async fn run(mut self) -> Result<SessionReport> {
        let started = Instant::now();
        info!(
            session = %self.session_id,
            targets = self.config.probe.targets.len(),
            monitoring = self.config.monitor.enabled,
            "session starting"
        );

        // A pure monitoring session never touches the probe service, so it
        // must not depend on the probe backend being available either.
        if !self.config.probe.targets.is_empty() {
            self.probe
                .check_ready()
                .await
                .context("probe service connectivity check failed")?;
        }

        let store = CsvStore::new(self.config.store.path.clone());
        store
            .ensure_created()
            .await
            .context("failed to create telemetry store")?;

        let (queue, receiver) = record_queue();
        let stop = StopSignal::new();

        let writer = PersistenceWriter::new(
            store,
            self.config.flush_retry(),
            self.config.store.drain_batch,
        );
        let writer_handle = tokio::spawn(writer.run(receiver));

        let monitor_handle = if self.config.monitor.enabled {
            let monitor = MonitorLoop::new(
                Arc::clone(&self.sampler),
                queue.clone(),
                stop.clone(),
                self.config.sample_interval(),
                self.config.max_monitor_duration(),
            );
            Some(tokio::spawn(monitor.run()))
        } else {
            None
        };

        self.transition(SessionState::Running);

        let aggregates = if self.config.probe.targets.is_empty() {
            Vec::new()
        } else {
            let runner = Arc::new(ProbeRunner::new(
                Arc::clone(&self.probe),
                queue.clone(),
                self.config.probe.on_chunk_failure,
            ));
            let pool = ProbePool::new(runner, self.config.probe.worker_limit);
            let aggregates = pool
                .run(
                    &self.config.probe.targets,
                    self.config.probe.packet_count,
                    self.config.probe.chunk_size,
                )
                .await;
            // All probe work is done; the monitor no longer needs to run.
            stop.set();
            aggregates
        };

        let samples_taken = match monitor_handle {
            Some(handle) => handle.await.unwrap_or_else(|err| {
                error!(error = %err, "monitoring task failed");
                0
            }),
            None => 0,
        };

        self.transition(SessionState::Draining);
        // Last producer handle; closing the queue releases the writer once
        // it has drained every remaining record.
        drop(queue);
        let writer_report = writer_handle.await.unwrap_or_else(|err| {
            error!(error = %err, "persistence writer task failed");
            WriterReport::default()
        });

        self.transition(SessionState::Terminated);
        let elapsed = started.elapsed();
        info!(
            session = %self.session_id,
            elapsed_secs = elapsed.as_secs_f64(),
            samples = samples_taken,
            written = writer_report.records_written,
            "session terminated"
        );

        Ok(SessionReport {
            session_id: self.session_id,
            elapsed_secs: elapsed.as_secs_f64(),
            samples_taken,
            aggregates,
            records_written: writer_report.records_written,
            records_lost: writer_report.records_lost,
        })
    }
}
