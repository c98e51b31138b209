//! Graceful-drain bookkeeping (spec.md §5 "server lifetime"). Adapted from
//! the teacher's `Rc<Cell<usize>>` per-worker connection counter: here a
//! single Tokio runtime serves every connection as its own task, so the
//! counter needs to be `Send`/`Sync` and is backed by an `Arc<AtomicUsize>`
//! instead of thread-local `Rc`s.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Clone, Default)]
pub(crate) struct ConnectionCounter(Arc<AtomicUsize>);

impl ConnectionCounter {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn guard(&self) -> ConnectionGuard {
        self.0.fetch_add(1, Ordering::SeqCst);
        ConnectionGuard(self.0.clone())
    }

    fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

pub(crate) struct ConnectionGuard(Arc<AtomicUsize>);

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Wait for `counter` to reach zero, polling every 100ms, up to `timeout`.
/// Connections still open past the deadline are abandoned (spec.md §5:
/// "workers still alive after the timeout are force dropped").
pub(crate) async fn drain(counter: ConnectionCounter, timeout: Duration) {
    let start = Instant::now();
    let mut interval = tokio::time::interval(Duration::from_millis(100));
    loop {
        if counter.get() == 0 {
            tracing::info!("graceful shutdown complete");
            return;
        }
        if start.elapsed() >= timeout {
            tracing::warn!(remaining = counter.get(), "shutdown timeout elapsed, force stopping with connections still active");
            return;
        }
        interval.tick().await;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn guard_increments_and_decrements() {
        let counter = ConnectionCounter::new();
        let a = counter.guard();
        let b = counter.guard();
        assert_eq!(counter.get(), 2);
        drop(b);
        assert_eq!(counter.get(), 1);
        drop(a);
        assert_eq!(counter.get(), 0);
    }

    #[tokio::test]
    async fn drain_returns_once_counter_empties() {
        let counter = ConnectionCounter::new();
        let guard = counter.guard();
        let counter_for_drain = counter.clone();
        let handle = tokio::spawn(async move { drain(counter_for_drain, Duration::from_secs(5)).await });
        tokio::time::sleep(Duration::from_millis(150)).await;
        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
    }
}
