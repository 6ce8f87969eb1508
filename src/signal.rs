//! Cooperative stop latch shared by all session components

use std::sync::Arc;
use tokio::sync::watch;

/// Write-once boolean latch used for cooperative cancellation.
///
/// Cloning is cheap and every clone observes the same latch. `set` is
/// idempotent; the latch is never cleared. Components check it at loop
/// boundaries or `wait` on it inside a `select!`.
#[derive(Debug, Clone)]
pub struct StopSignal {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl StopSignal {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self { tx: Arc::new(tx), rx }
    }

    /// Sets the latch. Calling this more than once is a no-op.
    pub fn set(&self) {
        self.tx.send_if_modified(|stopped| {
            if *stopped {
                false
            } else {
                *stopped = true;
                true
            }
        });
    }

    pub fn is_set(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the latch is set; immediately if it already is.
    pub async fn wait(&self) {
        let mut rx = self.rx.clone();
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_unset() {
        assert!(!StopSignal::new().is_set());
    }

    #[test]
    fn setting_twice_is_a_noop() {
        let stop = StopSignal::new();
        stop.set();
        assert!(stop.is_set());
        stop.set();
        assert!(stop.is_set());
    }

    #[tokio::test]
    async fn wait_resolves_after_set() {
        let stop = StopSignal::new();
        let observer = stop.clone();
        let waiter = tokio::spawn(async move { observer.wait().await });
        stop.set();
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn wait_resolves_immediately_when_already_set() {
        let stop = StopSignal::new();
        stop.set();
        stop.wait().await;
    }

    #[tokio::test]
    async fn clones_observe_the_same_latch() {
        let stop = StopSignal::new();
        let clone = stop.clone();
        stop.set();
        assert!(clone.is_set());
    }
}
