//! The contract load balancers consume (spec.md §3 "RoutingTable"):
//! `{ListEndpoints() -> [Endpoint]}`. Implementations are either static
//! (built from a fixed list, immutable) or dynamic (kept current by a
//! discovery adapter, see `zerone-discovery`).

use zerone_core::Endpoint;

/// Capability a balancer needs from whatever is tracking a logical
/// service's live endpoints.
pub trait RoutingTable: Send + Sync {
    /// Current endpoint set. Balancers must re-read this every call — the
    /// table may change between calls (spec.md §4.7).
    fn list_endpoints(&self) -> Vec<Endpoint>;
}

/// An immutable table constructed once from a fixed list (spec.md §3).
#[derive(Debug, Clone)]
pub struct StaticTable {
    endpoints: Vec<Endpoint>,
}

impl StaticTable {
    pub fn new(endpoints: Vec<Endpoint>) -> Self {
        Self { endpoints }
    }
}

impl RoutingTable for StaticTable {
    fn list_endpoints(&self) -> Vec<Endpoint> {
        self.endpoints.clone()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn static_table_lists_its_fixed_endpoints() {
        let table = StaticTable::new(vec![Endpoint::new("a", "tcp", "127.0.0.1:1")]);
        assert_eq!(table.list_endpoints().len(), 1);
    }
}
