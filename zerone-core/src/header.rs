//! Request/response header types (spec.md §3, §6).

use crate::error::StructuredError;

/// `{classMethod: "Class.Method", sequence, clientName, traceID, verbose}`.
#[derive(Debug, Clone, Default)]
pub struct RequestHeader {
    pub class_method: String,
    pub sequence: u64,
    pub client_name: String,
    pub trace_id: String,
    pub verbose: i32,
}

/// `{classMethod, sequence, error}`. When the request succeeded every field
/// of `error` is zero/empty.
#[derive(Debug, Clone, Default)]
pub struct ResponseHeader {
    pub class_method: String,
    pub sequence: u64,
    pub error: StructuredError,
}

/// Split `"Class.Method"` on the **last** `.` (spec.md §4.3). Both halves
/// may be empty strings; that is syntactically permitted but will never
/// match a registration.
pub fn split_class_method(class_method: &str) -> (&str, &str) {
    match class_method.rfind('.') {
        Some(idx) => (&class_method[..idx], &class_method[idx + 1..]),
        None => ("", class_method),
    }
}

/// Synthesize a fresh trace id the way the client does when a caller enters
/// a call without one already propagating (spec.md §3, §9 open question:
/// the feature-complete client draft uses a UUID trace id).
pub fn new_trace_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn splits_on_last_dot() {
        assert_eq!(split_class_method("Echo.Echo"), ("Echo", "Echo"));
        assert_eq!(split_class_method("A.B.C"), ("A.B", "C"));
    }

    #[test]
    fn missing_dot_is_syntactically_permitted() {
        assert_eq!(split_class_method("Arith"), ("", "Arith"));
    }

    #[test]
    fn empty_halves_are_permitted() {
        assert_eq!(split_class_method("."), ("", ""));
    }

    #[test]
    fn trace_ids_are_unique() {
        assert_ne!(new_trace_id(), new_trace_id());
    }
}
