//! Load balancers (spec.md §4.7): pick one endpoint per call from a
//! [`RoutingTable`]. All four policies re-read `list_endpoints()` on every
//! call — the table may change between calls.

use std::sync::atomic::{AtomicUsize, Ordering};

use rand::Rng;
use zerone_core::Endpoint;

use crate::error::NoEndpoint;
use crate::table::RoutingTable;

/// Chooses one endpoint per call given an opaque routing `key` (spec.md
/// §9: the `by-name` balancer's undocumented interpretation of `key` as an
/// endpoint name is adopted here, so all balancers share this signature).
pub trait Balancer: Send + Sync {
    fn get_endpoint(&self, table: &dyn RoutingTable, key: &str) -> Result<Endpoint, NoEndpoint>;
}

/// Uniform random choice over `ListEndpoints()`.
#[derive(Debug, Default)]
pub struct Random;

impl Balancer for Random {
    fn get_endpoint(&self, table: &dyn RoutingTable, _key: &str) -> Result<Endpoint, NoEndpoint> {
        let endpoints = table.list_endpoints();
        if endpoints.is_empty() {
            return Err(NoEndpoint);
        }
        let idx = rand::thread_rng().gen_range(0..endpoints.len());
        Ok(endpoints.into_iter().nth(idx).unwrap())
    }
}

/// `endpoints[i % n]` where `i` is an internal counter incremented on each
/// call (spec.md §4.7). Wrap-around is by modulus; no fairness guarantee
/// is made across table reconfigurations.
#[derive(Debug, Default)]
pub struct RoundRobin {
    counter: AtomicUsize,
}

impl Balancer for RoundRobin {
    fn get_endpoint(&self, table: &dyn RoutingTable, _key: &str) -> Result<Endpoint, NoEndpoint> {
        let endpoints = table.list_endpoints();
        if endpoints.is_empty() {
            return Err(NoEndpoint);
        }
        let i = self.counter.fetch_add(1, Ordering::Relaxed);
        Ok(endpoints.into_iter().nth(i % endpoints.len()).unwrap())
    }
}

/// `endpoints[hash(key) % n]`; hash defaults to CRC32-IEEE (spec.md §4.7).
/// For a stable table and a stable key, selection is deterministic.
#[derive(Debug, Default)]
pub struct Hash;

impl Balancer for Hash {
    fn get_endpoint(&self, table: &dyn RoutingTable, key: &str) -> Result<Endpoint, NoEndpoint> {
        let endpoints = table.list_endpoints();
        if endpoints.is_empty() {
            return Err(NoEndpoint);
        }
        let h = crc32fast::hash(key.as_bytes());
        let i = (h as usize) % endpoints.len();
        Ok(endpoints.into_iter().nth(i).unwrap())
    }
}

/// Linear scan for the endpoint whose `name` equals `key`; `NoEndpoint` if
/// absent (spec.md §4.7, §9 open question).
#[derive(Debug, Default)]
pub struct ByName;

impl Balancer for ByName {
    fn get_endpoint(&self, table: &dyn RoutingTable, key: &str) -> Result<Endpoint, NoEndpoint> {
        table.list_endpoints().into_iter().find(|e| e.name == key).ok_or(NoEndpoint)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::table::StaticTable;

    fn table(n: usize) -> StaticTable {
        StaticTable::new((0..n).map(|i| Endpoint::new(format!("e{i}"), "tcp", format!("127.0.0.1:{i}"))).collect())
    }

    #[test]
    fn empty_table_yields_no_endpoint() {
        let t = StaticTable::new(vec![]);
        assert_eq!(Random.get_endpoint(&t, "k"), Err(NoEndpoint));
        assert_eq!(RoundRobin::default().get_endpoint(&t, "k"), Err(NoEndpoint));
        assert_eq!(Hash.get_endpoint(&t, "k"), Err(NoEndpoint));
        assert_eq!(ByName.get_endpoint(&t, "k"), Err(NoEndpoint));
    }

    #[test]
    fn round_robin_visits_every_endpoint_within_n_calls() {
        let t = table(3);
        let rr = RoundRobin::default();
        let mut seen = std::collections::HashSet::new();
        for _ in 0..3 {
            seen.insert(rr.get_endpoint(&t, "").unwrap().name);
        }
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn hash_is_stable_for_a_stable_table_and_key() {
        let t = table(5);
        let h = Hash;
        let first = h.get_endpoint(&t, "call-key").unwrap();
        for _ in 0..10 {
            assert_eq!(h.get_endpoint(&t, "call-key").unwrap(), first);
        }
    }

    #[test]
    fn by_name_finds_exact_match() {
        let t = table(3);
        assert_eq!(ByName.get_endpoint(&t, "e1").unwrap().name, "e1");
        assert_eq!(ByName.get_endpoint(&t, "missing"), Err(NoEndpoint));
    }
}
