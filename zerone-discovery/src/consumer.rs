//! Watching side of the discovery contract (spec.md §4.10): deliver the
//! current endpoint set to a caller-supplied callback whenever it changes,
//! and expose a synchronous snapshot read.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use zerone_core::Endpoint;

use crate::driver::Driver;

/// Invoked with the full, current endpoint set whenever it changes. The
/// driver's actual watch/poll protocol is out of scope (spec.md §1); this
/// crate polls [`Driver::list`] on an interval and only calls back when the
/// observed set differs from the last one delivered.
pub type OnRefresh = Box<dyn Fn(Vec<Endpoint>) + Send + Sync>;

/// `NewConsumer(service, templateEndpoint, onRefresh) -> Consumer`
/// (spec.md §4.10). `GetEndpoints()` is a synchronous read of the last
/// delivered set, guarded by a read-write lock (spec.md §3, §5: "readers
/// take a read lock and see a consistent snapshot").
pub struct Consumer {
    endpoints: Arc<RwLock<Vec<Endpoint>>>,
    stop: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl Consumer {
    pub fn spawn(driver: Arc<dyn Driver>, service: impl Into<String>, poll_interval: Duration, on_refresh: OnRefresh) -> Self {
        let service = service.into();
        let endpoints = Arc::new(RwLock::new(Vec::new()));
        let (stop_tx, mut stop_rx) = oneshot::channel();

        let store = endpoints.clone();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(poll_interval);
            let mut last: Option<Vec<Endpoint>> = None;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match driver.list(&service).await {
                            Ok(current) => {
                                if last.as_ref() != Some(&current) {
                                    *store.write().unwrap_or_else(|e| e.into_inner()) = current.clone();
                                    on_refresh(current.clone());
                                    last = Some(current);
                                }
                            }
                            Err(e) => tracing::warn!(service = %service, error = %e, "failed refreshing endpoints"),
                        }
                    }
                    _ = &mut stop_rx => break,
                }
            }
        });

        Self {
            endpoints,
            stop: Some(stop_tx),
            task: Some(task),
        }
    }

    /// Current endpoint set as of the last refresh (spec.md §4.10
    /// "exposes GetEndpoints() for synchronous reads").
    pub fn get_endpoints(&self) -> Vec<Endpoint> {
        self.endpoints.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub async fn close(mut self) {
        if let Some(tx) = self.stop.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::driver::test_support::MemoryDriver;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn delivers_refresh_only_on_change() {
        let driver: Arc<dyn Driver> = Arc::new(MemoryDriver::default());
        let endpoint = Endpoint::new("c1", "tcp", "127.0.0.1:9001");
        driver.publish("svc", &endpoint, Duration::from_secs(30)).await.unwrap();

        let refreshes = Arc::new(AtomicUsize::new(0));
        let counter = refreshes.clone();
        let consumer = Consumer::spawn(
            driver.clone(),
            "svc",
            Duration::from_millis(10),
            Box::new(move |_eps| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(consumer.get_endpoints(), vec![endpoint]);
        assert_eq!(refreshes.load(Ordering::SeqCst), 1);

        consumer.close().await;
    }
}
