//! Sequence-multiplexed wire engine (spec.md §4.4, §4.5): a codec-agnostic
//! client half and server dispatch half sharing nothing but the
//! [`zerone_codec`] contract and [`zerone_registry`] lookup.

pub mod client;
pub mod server;

pub use client::{Call, WireClient, DEFAULT_DONE_CAPACITY};
pub use server::serve_codec;
