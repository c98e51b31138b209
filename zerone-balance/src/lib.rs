//! Routing tables and load balancers (spec.md §3 "RoutingTable", §4.7).

mod balancer;
mod error;
mod table;

pub use balancer::{Balancer, ByName, Hash, Random, RoundRobin};
pub use error::NoEndpoint;
pub use table::{RoutingTable, StaticTable};
