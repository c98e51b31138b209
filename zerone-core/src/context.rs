//! Per-invocation context handed to a server method (spec.md §4.5: "the
//! handler receives a fresh context carrying the request's `traceID` and
//! `verbose`"). Stands in for the `context.Context` argument every
//! registered method takes in the source; since this core has no
//! cross-process cancellation (spec.md §1 Non-goals), the only things
//! worth propagating are these two wire-carried scalars.

/// Built fresh by the server half for every dispatched request (spec.md
/// §4.5) and passed to the handler closure a [`crate::error::StructuredError`]-returning
/// method was registered with.
#[derive(Debug, Clone, Default)]
pub struct Context {
    pub trace_id: String,
    pub verbose: i32,
}

impl Context {
    pub fn new(trace_id: impl Into<String>, verbose: i32) -> Self {
        Self { trace_id: trace_id.into(), verbose }
    }
}
