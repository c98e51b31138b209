//! The capability a discovery driver (e.g. an etcd backend) exposes to the
//! core, grounded on `original_source/govern/govern.go`'s `Driver` interface
//! minus its `Endpoint` marshal methods — [`zerone_core::Endpoint`] already
//! carries a `serde` round trip (spec.md §6 registry layout).
//!
//! Concrete drivers are collaborators (spec.md §1): this crate owns the
//! periodic publish loop and the change-polling consumer loop (spec.md
//! §4.10) generically, and only asks a [`Driver`] to do the three
//! store-specific operations — publish, list, unpublish — that actually
//! differ between e.g. etcd and an in-memory test double.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use zerone_core::Endpoint;

use crate::error::DiscoveryError;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One named discovery backend. `namespace` scopes every `service` key the
/// way `original_source`'s `govern.Driver.Namespace()` does (spec.md §6:
/// "a directory `/ns/service/` holds one child per endpoint").
pub trait Driver: Send + Sync {
    fn name(&self) -> &str;

    /// Publish `endpoint` under `service` with the given TTL. Called
    /// repeatedly by [`crate::Provider`]'s periodic loop (spec.md §4.10:
    /// "TTL is 3 × interval").
    fn publish(&self, service: &str, endpoint: &Endpoint, ttl: Duration) -> BoxFuture<'_, Result<(), DiscoveryError>>;

    /// Remove a previously published endpoint.
    fn unpublish(&self, service: &str, endpoint: &Endpoint) -> BoxFuture<'_, Result<(), DiscoveryError>>;

    /// Current endpoint set for `service`. Polled repeatedly by
    /// [`crate::Consumer`]'s refresh loop; a driver with a genuine
    /// server-push watch protocol can implement this by returning the
    /// latest snapshot its own watch stream already maintains.
    fn list(&self, service: &str) -> BoxFuture<'_, Result<Vec<Endpoint>, DiscoveryError>>;
}

/// Explicit, dependency-injected registry of discovery drivers (spec.md §9
/// Design Notes: "express it as an explicit registry passed into the
/// discovery layer rather than as ambient global state"), replacing
/// `original_source`'s process-wide `govern.Register`/`govern.Open`
/// package-level map.
#[derive(Default)]
pub struct DriverRegistry {
    drivers: HashMap<String, Arc<dyn Driver>>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, driver: Arc<dyn Driver>) {
        self.drivers.insert(driver.name().to_string(), driver);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Driver>> {
        self.drivers.get(name).cloned()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::Mutex;

    /// In-memory driver used by this crate's own tests and by
    /// `zerone-client`'s integration tests — stands in for an etcd driver
    /// without pulling a network dependency into test code.
    #[derive(Default)]
    pub struct MemoryDriver {
        services: Mutex<HashMap<String, Vec<Endpoint>>>,
    }

    impl Driver for MemoryDriver {
        fn name(&self) -> &str {
            "memory"
        }

        fn publish(&self, service: &str, endpoint: &Endpoint, _ttl: Duration) -> BoxFuture<'_, Result<(), DiscoveryError>> {
            let service = service.to_string();
            let endpoint = endpoint.clone();
            Box::pin(async move {
                let mut services = self.services.lock().unwrap();
                let list = services.entry(service).or_default();
                list.retain(|e| e.name != endpoint.name);
                list.push(endpoint);
                Ok(())
            })
        }

        fn unpublish(&self, service: &str, endpoint: &Endpoint) -> BoxFuture<'_, Result<(), DiscoveryError>> {
            let service = service.to_string();
            let name = endpoint.name.clone();
            Box::pin(async move {
                if let Some(list) = self.services.lock().unwrap().get_mut(&service) {
                    list.retain(|e| e.name != name);
                }
                Ok(())
            })
        }

        fn list(&self, service: &str) -> BoxFuture<'_, Result<Vec<Endpoint>, DiscoveryError>> {
            let service = service.to_string();
            Box::pin(async move { Ok(self.services.lock().unwrap().get(&service).cloned().unwrap_or_default()) })
        }
    }
}
