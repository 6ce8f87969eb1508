//! Shared record queue between producers and the persistence writer
//!
//! Unbounded multi-producer/single-consumer buffer: pushes never block the
//! monitoring loop or a probe worker, at the cost of unbounded memory if the
//! writer falls behind. Closing the channel (every producer handle dropped)
//! is the writer's signal that no more records will arrive.

use tokio::sync::mpsc;
use tracing::warn;

use crate::record::Record;

/// Creates the queue and its single receiving end.
pub fn record_queue() -> (RecordQueue, RecordReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (RecordQueue { tx }, RecordReceiver { rx })
}

/// Producer handle. Cloned into every component that emits records.
#[derive(Debug, Clone)]
pub struct RecordQueue {
    tx: mpsc::UnboundedSender<Record>,
}

impl RecordQueue {
    /// Enqueues a record. Never blocks; records pushed after the writer has
    /// gone away are dropped with a warning.
    pub fn push(&self, record: Record) {
        if self.tx.send(record).is_err() {
            warn!("record dropped: persistence writer already gone");
        }
    }
}

/// Consuming end, owned exclusively by the persistence writer.
#[derive(Debug)]
pub struct RecordReceiver {
    rx: mpsc::UnboundedReceiver<Record>,
}

impl RecordReceiver {
    /// Waits for at least one record and appends up to `limit` of them to
    /// `buf`, preserving enqueue order. Returns the number received; 0 means
    /// the queue is closed and fully drained.
    pub async fn recv_batch(&mut self, buf: &mut Vec<Record>, limit: usize) -> usize {
        self.rx.recv_many(buf, limit).await
    }

    /// Moves any immediately available records into `buf` until it holds
    /// `limit` entries. Returns true once the queue is closed.
    pub fn drain_available(&mut self, buf: &mut Vec<Record>, limit: usize) -> bool {
        while buf.len() < limit {
            match self.rx.try_recv() {
                Ok(record) => buf.push(record),
                Err(mpsc::error::TryRecvError::Empty) => return false,
                Err(mpsc::error::TryRecvError::Disconnected) => return true,
            }
        }
        self.is_closed()
    }

    /// True once every producer handle has been dropped. Records may still
    /// be buffered and remain receivable.
    pub fn is_closed(&self) -> bool {
        self.rx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{ProbeAggregate, Record};
    use chrono::Utc;

    fn summary(target: &str) -> Record {
        Record::Summary(ProbeAggregate {
            target: target.to_string(),
            total_packets_sent: 1,
            rtt_min: 1.0,
            rtt_max: 1.0,
            rtt_avg: 1.0,
            chunks_succeeded: 1,
            chunks_failed: 0,
            timestamp: Utc::now(),
        })
    }

    #[tokio::test]
    async fn preserves_enqueue_order_and_signals_close() {
        let (queue, mut receiver) = record_queue();
        for name in ["a", "b", "c"] {
            queue.push(summary(name));
        }
        drop(queue);

        let mut batch = Vec::new();
        let received = receiver.recv_batch(&mut batch, 16).await;
        assert_eq!(received, 3);
        let targets: Vec<_> = batch
            .iter()
            .map(|r| match r {
                Record::Summary(a) => a.target.clone(),
                other => panic!("unexpected record {other:?}"),
            })
            .collect();
        assert_eq!(targets, ["a", "b", "c"]);

        // Closed and drained.
        assert_eq!(receiver.recv_batch(&mut batch, 16).await, 0);
    }

    #[tokio::test]
    async fn drain_available_reports_disconnect() {
        let (queue, mut receiver) = record_queue();
        queue.push(summary("a"));
        drop(queue);

        let mut batch = Vec::new();
        assert!(receiver.drain_available(&mut batch, 16));
        assert_eq!(batch.len(), 1);
    }

    #[tokio::test]
    async fn drain_available_reports_disconnect_on_full_buffer() {
        let (queue, mut receiver) = record_queue();
        queue.push(summary("a"));
        queue.push(summary("b"));
        drop(queue);

        // The buffer is already at capacity; closure must still be visible.
        let mut batch = vec![summary("pending")];
        assert!(receiver.drain_available(&mut batch, 1));
        assert_eq!(batch.len(), 1);
        assert!(receiver.is_closed());
    }

    #[tokio::test]
    async fn is_closed_tracks_producer_handles() {
        let (queue, receiver) = record_queue();
        let clone = queue.clone();
        assert!(!receiver.is_closed());
        drop(queue);
        assert!(!receiver.is_closed());
        drop(clone);
        assert!(receiver.is_closed());
    }

    #[tokio::test]
    async fn push_after_receiver_drop_is_silent() {
        let (queue, receiver) = record_queue();
        drop(receiver);
        queue.push(summary("a"));
    }
}
