//! Structured request/response tracing gated by the `verbose` scalar carried
//! on the wire (spec.md §2 "Trace logger", §4.1). The core only owns the
//! invocation contract; the concrete output formatter is a collaborator the
//! binary wires up (spec.md §1 scope) — here that collaborator is the
//! `tracing` crate's own subscriber machinery, not a bespoke writer.

use std::time::Instant;

/// What the wire engine reports for one in-flight call, on both the client
/// and server halves.
pub trait TraceSink: Send + Sync {
    fn on_request(&self, trace_id: &str, peer: &str, class_method: &str, verbose: i32);
    fn on_response(&self, trace_id: &str, peer: &str, class_method: &str, verbose: i32, elapsed: std::time::Duration, error: Option<&str>);
}

/// Default sink: emits `tracing` events at a level selected by `verbose`.
/// `verbose <= 0` logs only errors (mirrors the source's `errorTrace`,
/// which stays silent unless `PrintResponse` observes a non-nil error);
/// `verbose > 0` logs every request/response pair (mirrors `verboseTrace`).
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl TraceSink for TracingSink {
    fn on_request(&self, trace_id: &str, peer: &str, class_method: &str, verbose: i32) {
        if verbose > 0 {
            tracing::debug!(trace_id, peer, class_method, "request");
        }
    }

    fn on_response(
        &self,
        trace_id: &str,
        peer: &str,
        class_method: &str,
        verbose: i32,
        elapsed: std::time::Duration,
        error: Option<&str>,
    ) {
        match error {
            Some(err) => tracing::warn!(trace_id, peer, class_method, elapsed_ms = elapsed.as_millis() as u64, error = err, "response error"),
            None if verbose > 0 => {
                tracing::debug!(trace_id, peer, class_method, elapsed_ms = elapsed.as_millis() as u64, "response")
            }
            None => {}
        }
    }
}

/// Sink that drops everything; used in tests and by callers that never
/// enable verbose logging.
#[derive(Debug, Default, Clone, Copy)]
pub struct NopSink;

impl TraceSink for NopSink {
    fn on_request(&self, _trace_id: &str, _peer: &str, _class_method: &str, _verbose: i32) {}
    fn on_response(
        &self,
        _trace_id: &str,
        _peer: &str,
        _class_method: &str,
        _verbose: i32,
        _elapsed: std::time::Duration,
        _error: Option<&str>,
    ) {
    }
}

/// Convenience guard pairing a request start with its eventual response,
/// so callers don't have to thread an `Instant` through manually.
pub struct TraceScope<'a> {
    sink: &'a dyn TraceSink,
    trace_id: String,
    peer: String,
    class_method: String,
    verbose: i32,
    start: Instant,
}

impl<'a> TraceScope<'a> {
    pub fn start(sink: &'a dyn TraceSink, trace_id: &str, peer: &str, class_method: &str, verbose: i32) -> Self {
        sink.on_request(trace_id, peer, class_method, verbose);
        Self {
            sink,
            trace_id: trace_id.to_string(),
            peer: peer.to_string(),
            class_method: class_method.to_string(),
            verbose,
            start: Instant::now(),
        }
    }

    pub fn finish(self, error: Option<&str>) {
        self.sink.on_response(
            &self.trace_id,
            &self.peer,
            &self.class_method,
            self.verbose,
            self.start.elapsed(),
            error,
        );
    }
}
