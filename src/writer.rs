//! Append-only CSV store and the persistence writer that drains the queue
//!
//! The writer owns the queue's only receiving end. It drains records in
//! batches, appends each batch as a single write, and exits once the queue
//! is closed (all producers finished, stop signal raised) and fully drained.
//! An unwritable store is retried, not fatal: records accumulate until the
//! store becomes writable again or the session ends.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::{error, info};

use crate::queue::RecordReceiver;
use crate::record::{Record, CSV_HEADER};

/// Retries granted to a failing store once no more records can arrive.
const CLOSED_RETRY_LIMIT: u32 = 5;

/// Append-only CSV telemetry store.
pub struct CsvStore {
    path: PathBuf,
}

impl CsvStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Creates the store file with its header row if it does not exist yet.
    /// Idempotent: an existing store is left untouched.
    pub async fn ensure_created(&self) -> Result<()> {
        if tokio::fs::try_exists(&self.path)
            .await
            .with_context(|| format!("cannot stat {}", self.path.display()))?
        {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("cannot create {}", parent.display()))?;
            }
        }
        tokio::fs::write(&self.path, format!("{CSV_HEADER}\n"))
            .await
            .with_context(|| format!("cannot create store {}", self.path.display()))?;
        info!(path = %self.path.display(), "telemetry store created");
        Ok(())
    }

    /// Appends the records as one write, in slice order.
    ///
    /// On failure the store is rolled back to its previous length, so a
    /// retried batch never leaves a duplicated prefix behind.
    pub async fn append(&self, records: &[Record]) -> std::io::Result<()> {
        let mut buf = String::with_capacity(records.len() * 96);
        for record in records {
            buf.push_str(&record.to_csv_row());
            buf.push('\n');
        }
        let mut file = OpenOptions::new().append(true).open(&self.path).await?;
        let committed_len = file.metadata().await?.len();
        let result = async {
            file.write_all(buf.as_bytes()).await?;
            file.flush().await
        }
        .await;
        if result.is_err() {
            let _ = file.set_len(committed_len).await;
        }
        result
    }
}

/// What the writer managed to persist by the time it exited.
#[derive(Debug, Default, Serialize)]
pub struct WriterReport {
    pub records_written: usize,
    pub records_lost: usize,
}

pub struct PersistenceWriter {
    store: CsvStore,
    retry: Duration,
    batch: usize,
}

impl PersistenceWriter {
    pub fn new(store: CsvStore, retry: Duration, batch: usize) -> Self {
        Self { store, retry, batch }
    }

    /// Drains the queue until it is closed and empty. Every record received
    /// is appended exactly once, in enqueue order; records that cannot be
    /// written after the queue has closed are counted as lost.
    pub async fn run(self, mut queue: RecordReceiver) -> WriterReport {
        info!("persistence writer started");
        let mut report = WriterReport::default();
        let mut pending: Vec<Record> = Vec::new();
        let mut closed = false;
        let mut consecutive_failures = 0u32;

        loop {
            if pending.is_empty() {
                if queue.recv_batch(&mut pending, self.batch).await == 0 {
                    break;
                }
            }
            // A full pending buffer must not mask closure of the queue.
            closed = queue.drain_available(&mut pending, self.batch) || closed || queue.is_closed();

            match self.store.append(&pending).await {
                Ok(()) => {
                    report.records_written += pending.len();
                    pending.clear();
                    consecutive_failures = 0;
                }
                Err(err) => {
                    consecutive_failures += 1;
                    error!(
                        error = %err,
                        pending = pending.len(),
                        "telemetry store unwritable, will retry"
                    );
                    if closed && consecutive_failures >= CLOSED_RETRY_LIMIT {
                        // Whatever is still buffered can never be written now.
                        queue.drain_available(&mut pending, usize::MAX);
                        report.records_lost = pending.len();
                        error!(
                            lost = pending.len(),
                            "store still unwritable at session end, dropping pending records"
                        );
                        break;
                    }
                    tokio::time::sleep(self.retry).await;
                }
            }
        }

        info!(
            written = report.records_written,
            lost = report.records_lost,
            "persistence writer finished"
        );
        report
    }
}
