//! A [`RoutingTable`] kept current by a [`Consumer`] (spec.md §4.10): "a
//! dynamic routing table is built over a consumer; on each refresh it
//! replaces its internal endpoint vector under a write lock", grounded on
//! `original_source/pkg/route/dtable/table.go`'s `Table`.

use std::sync::Arc;
use std::time::Duration;

use zerone_balance::RoutingTable;
use zerone_core::Endpoint;

use crate::consumer::Consumer;
use crate::driver::Driver;

pub struct DynamicTable {
    consumer: Consumer,
}

impl DynamicTable {
    /// Build a table over a fresh consumer for `service`. `template` is
    /// unused by the in-memory contract here (spec.md §4.10 names it only
    /// because some drivers need a concrete `Endpoint` shape to unmarshal
    /// into); kept as a parameter for interface fidelity.
    pub fn new(driver: Arc<dyn Driver>, service: impl Into<String>, _template: Endpoint, poll_interval: Duration) -> Self {
        let consumer = Consumer::spawn(driver, service, poll_interval, Box::new(|_eps| {}));
        Self { consumer }
    }

    pub async fn close(self) {
        self.consumer.close().await;
    }
}

impl RoutingTable for DynamicTable {
    fn list_endpoints(&self) -> Vec<Endpoint> {
        self.consumer.get_endpoints()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::driver::test_support::MemoryDriver;

    #[tokio::test]
    async fn table_reflects_published_endpoints() {
        let driver: Arc<dyn Driver> = Arc::new(MemoryDriver::default());
        let ep = Endpoint::new("d1", "tcp", "127.0.0.1:9100");
        driver.publish("svc", &ep, Duration::from_secs(30)).await.unwrap();

        let table = DynamicTable::new(driver, "svc", Endpoint::new("", "", ""), Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(table.list_endpoints(), vec![ep]);
        table.close().await;
    }
}
