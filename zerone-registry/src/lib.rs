//! Explicit method registration replacing `net/rpc`-style reflection
//! (spec.md §4.3, §9 Design Notes), grounded on
//! `original_source/rpc/parser.go` and `rpc/server.go`.

mod descriptor;
mod error;
mod registry;

pub use descriptor::{BoxFuture, MethodDescriptor};
pub use error::RegistryError;
pub use registry::{Class, ClassBuilder, Registry};
