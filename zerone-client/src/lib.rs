//! High-level RPC client (spec.md §4.6, §4.8, §4.9): connection pool, fail
//! policies and the `Client` that composes them with a routing table and a
//! balance policy.

pub mod client;
pub mod connect;
pub mod fail;
pub mod pool;

pub use client::{BroadcastResult, Client};
pub use connect::{dial_tcp, TcpClientCodec, TcpWireClient};
pub use fail::FailPolicy;
pub use pool::ConnectionPool;
