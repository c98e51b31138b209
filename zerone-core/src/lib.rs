//! Wire types, error model and trace hooks shared by the zerone rpc stack.
//!
//! This crate has no networking or codec logic of its own; it is the
//! vocabulary [`zerone_codec`], [`zerone_rpc`], [`zerone_balance`] and
//! friends build on, the way `xitca-http`'s `http` re-export underlies the
//! rest of its teacher workspace.

pub mod code;
pub mod context;
pub mod endpoint;
pub mod error;
pub mod header;
pub mod trace;

pub use context::Context;
pub use endpoint::Endpoint;
pub use error::{Error, StructuredError, TransportError};
pub use header::{RequestHeader, ResponseHeader};
