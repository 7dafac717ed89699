//! Shutdown fan-out.
//!
//! One `Shutdown` is created in `main` and cloned freely. The API server, the
//! relay listener and the relay's heartbeat sweep each hold a receiver from
//! [`Shutdown::subscribe`] and stop once [`wait`] resolves on it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

#[derive(Debug)]
struct Signal {
    fired: AtomicBool,
    tx: broadcast::Sender<()>,
}

/// Cloneable stop switch. Firing it is one-shot.
#[derive(Debug, Clone)]
pub struct Shutdown {
    signal: Arc<Signal>,
}

impl Shutdown {
    pub fn new() -> Self {
        // A single slot is enough: receivers only care that something was sent
        let (tx, _) = broadcast::channel(1);
        Self {
            signal: Arc::new(Signal {
                fired: AtomicBool::new(false),
                tx,
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.signal.tx.subscribe()
    }

    /// Fire the switch. Returns `false` if it had already been fired, in
    /// which case nothing is sent again.
    pub fn trigger(&self) -> bool {
        if self.signal.fired.swap(true, Ordering::AcqRel) {
            return false;
        }
        let listeners = self.signal.tx.send(()).unwrap_or(0);
        tracing::info!(listeners, "Shutdown triggered");
        true
    }

    pub fn is_triggered(&self) -> bool {
        self.signal.fired.load(Ordering::Acquire)
    }

    /// Receivers that have not been dropped yet.
    pub fn receiver_count(&self) -> usize {
        self.signal.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Park until `rx` sees the switch fire.
///
/// Also returns when every `Shutdown` clone is gone, so a task never outlives
/// the process owner that could have stopped it.
pub async fn wait(mut rx: broadcast::Receiver<()>) {
    let _ = rx.recv().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_trigger_reaches_every_subscriber() {
        let shutdown = Shutdown::new();
        let a = shutdown.subscribe();
        let b = shutdown.clone().subscribe();
        assert_eq!(shutdown.receiver_count(), 2);

        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(1), wait(a)).await.unwrap();
        tokio::time::timeout(Duration::from_secs(1), wait(b)).await.unwrap();
    }

    #[test]
    fn test_trigger_fires_once_across_clones() {
        let shutdown = Shutdown::new();
        let other = shutdown.clone();
        let mut rx = shutdown.subscribe();
        assert!(!other.is_triggered());

        assert!(other.trigger());
        assert!(!shutdown.trigger());
        assert!(shutdown.is_triggered());

        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_dropped_coordinator_releases_waiters() {
        let shutdown = Shutdown::new();
        let clone = shutdown.clone();
        let rx = shutdown.subscribe();
        drop(shutdown);
        drop(clone);
        tokio::time::timeout(Duration::from_secs(1), wait(rx)).await.unwrap();
    }
}
