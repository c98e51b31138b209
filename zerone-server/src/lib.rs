//! High-level server (spec.md §4.10 crate mapping: "compose wire engine +
//! listener + registry registration"). A thin TCP accept loop over
//! [`zerone_rpc::serve_codec`], with OS-signal-driven or handle-driven
//! graceful shutdown in the teacher's `Builder`/`ServerHandle` style.

#![forbid(unsafe_code)]

mod server;
mod shutdown;
mod signals;

pub use server::{Server, ServerBuilder, ServerHandle};
