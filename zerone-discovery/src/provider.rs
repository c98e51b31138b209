//! Publishing side of the discovery contract (spec.md §4.10): periodically
//! publish this server's endpoint under a TTL, unpublish on close.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use zerone_core::Endpoint;

use crate::driver::Driver;
use crate::error::DiscoveryError;

/// `NewProvider(service, interval, endpointSupplier) -> Provider` (spec.md
/// §4.10). TTL is `3 × interval`; `Close` unpublishes and stops the
/// background loop.
pub struct Provider {
    driver: Arc<dyn Driver>,
    service: String,
    endpoint: Endpoint,
    stop: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl Provider {
    pub fn spawn(driver: Arc<dyn Driver>, service: impl Into<String>, interval: Duration, endpoint: Endpoint) -> Self {
        let service = service.into();
        let ttl = interval * 3;
        let (stop_tx, mut stop_rx) = oneshot::channel();

        let loop_driver = driver.clone();
        let loop_service = service.clone();
        let loop_endpoint = endpoint.clone();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = loop_driver.publish(&loop_service, &loop_endpoint, ttl).await {
                            tracing::warn!(service = %loop_service, error = %e, "failed publishing endpoint");
                        }
                    }
                    _ = &mut stop_rx => break,
                }
            }
        });

        Self {
            driver,
            service,
            endpoint,
            stop: Some(stop_tx),
            task: Some(task),
        }
    }

    /// Stop the publish loop and unpublish the endpoint.
    pub async fn close(mut self) -> Result<(), DiscoveryError> {
        if let Some(tx) = self.stop.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        self.driver.unpublish(&self.service, &self.endpoint).await
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::driver::test_support::MemoryDriver;

    #[tokio::test]
    async fn publishes_periodically_and_unpublishes_on_close() {
        let driver: Arc<dyn Driver> = Arc::new(MemoryDriver::default());
        let endpoint = Endpoint::new("p1", "tcp", "127.0.0.1:9000");
        let provider = Provider::spawn(driver.clone(), "svc", Duration::from_millis(10), endpoint.clone());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(driver.list("svc").await.unwrap(), vec![endpoint]);

        provider.close().await.unwrap();
        assert!(driver.list("svc").await.unwrap().is_empty());
    }
}
