//! Service discovery contract (spec.md §4.10): the driver-agnostic publish
//! loop, change-polling consumer loop, and the dynamic routing table built
//! over a consumer. Concrete drivers (etcd and friends) are collaborators
//! outside this crate's scope (spec.md §1); [`driver::Driver`] is the seam.

pub mod consumer;
pub mod driver;
pub mod error;
pub mod provider;
pub mod table;

pub use consumer::{Consumer, OnRefresh};
pub use driver::{Driver, DriverRegistry};
pub use error::DiscoveryError;
pub use provider::Provider;
pub use table::DynamicTable;
