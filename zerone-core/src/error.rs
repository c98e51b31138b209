//! Structured error model (spec.md §4.2, §7).

use std::error;
use std::fmt;
use std::io;

use crate::code;

/// An error carrying `{code, description, cause, origin}` that can cross the
/// wire (spec.md §3 `ResponseHeader.error`, §4.2).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StructuredError {
    pub code: i32,
    pub description: String,
    pub cause: String,
    pub origin: String,
}

impl StructuredError {
    /// An error with every field zero/empty, meaning "no error" on the wire.
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn is_ok(&self) -> bool {
        self.code == code::OK
    }

    pub fn new(code: i32, cause: impl Into<String>) -> Self {
        let cause = cause.into();
        Self {
            code,
            description: code::describe(code),
            cause,
            origin: String::new(),
        }
    }

    /// Fill `origin` unless it is already set, matching the server-side
    /// normalization rule in spec.md §4.5 and §7: nested services keep the
    /// origin closest to where the error actually occurred.
    pub fn with_origin_if_empty(mut self, origin: &str) -> Self {
        if self.origin.is_empty() {
            self.origin = origin.to_string();
        }
        self
    }
}

impl fmt::Display for StructuredError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", code::describe(self.code), self.cause)?;
        if !self.origin.is_empty() {
            write!(f, " (origin: {})", self.origin)?;
        }
        Ok(())
    }
}

impl error::Error for StructuredError {}

impl From<&dyn error::Error> for StructuredError {
    fn from(e: &dyn error::Error) -> Self {
        StructuredError::new(code::UNKNOWN, e.to_string())
    }
}

/// Transport-level errors (spec.md §7): local shutdown, peer unavailability
/// and per-call timeout. These are distinguished from [`StructuredError`]
/// because fail policies (zerone-client) must match on them directly rather
/// than by inspecting a numeric code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// The local wire-client or connection pool has been closed.
    Shutdown,
    /// The peer closed the connection; the wire-client is no longer usable.
    Unavailable,
    /// A per-call timeout fired before a response arrived.
    Timeout,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Shutdown => "shutdown",
            Self::Unavailable => "unavailable",
            Self::Timeout => "timeout",
        };
        f.write_str(s)
    }
}

impl error::Error for TransportError {}

/// Top level error type returned by the wire engine and its callers.
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    Transport(TransportError),
    Protocol(StructuredError),
    Io(io::Error),
    /// The pending registry already held a `Call` for a freshly-allocated
    /// sequence number (spec.md §4.4 step 4) — an internal invariant
    /// violation, not something callers can trigger under normal use.
    DuplicateSequence(u64),
    /// A codec-level decode/encode failure that isn't otherwise classified.
    Codec(Box<dyn error::Error + Send + Sync>),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(e) => fmt::Display::fmt(e, f),
            Self::Protocol(e) => fmt::Display::fmt(e, f),
            Self::Io(e) => fmt::Display::fmt(e, f),
            Self::DuplicateSequence(seq) => write!(f, "duplicate pending sequence: {seq}"),
            Self::Codec(e) => fmt::Display::fmt(e, f),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::Transport(e) => Some(e),
            Self::Protocol(e) => Some(e),
            Self::Io(e) => Some(e),
            Self::DuplicateSequence(_) => None,
            Self::Codec(e) => Some(e.as_ref()),
        }
    }
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

impl From<StructuredError> for Error {
    fn from(e: StructuredError) -> Self {
        Self::Protocol(e)
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl Error {
    /// `true` for the one error that must abort a fail-policy retry loop
    /// immediately (spec.md §4.8, §9: Failtry/Failover never re-pick after
    /// `Shutdown`, the client is irrecoverably gone).
    pub fn is_shutdown(&self) -> bool {
        matches!(self, Self::Transport(TransportError::Shutdown))
    }

    /// Turn any error into the wire `StructuredError` shape, used when a
    /// server normalizes a handler's return value (spec.md §4.5, §7).
    pub fn into_structured(self, default_origin: &str) -> StructuredError {
        match self {
            Self::Protocol(e) => e.with_origin_if_empty(default_origin),
            other => StructuredError::new(code::UNKNOWN, other.to_string()).with_origin_if_empty(default_origin),
        }
    }
}
