use std::fmt;
use std::io;

/// Codec-level failure. The wire engine (zerone-rpc) classifies [`Eof`] and
/// [`UnexpectedEof`] as fatal for the connection (spec.md §4.4 step 1,
/// §4.5 "fatal for this connection"); other variants are recoverable on the
/// server half and simply surfaced as the call's error on the client half.
///
/// [`Eof`]: CodecError::Eof
/// [`UnexpectedEof`]: CodecError::UnexpectedEof
#[derive(Debug)]
pub enum CodecError {
    /// Clean end of stream observed exactly at a frame boundary.
    Eof,
    /// The stream ended mid-frame: a partial, undecodable record was
    /// observed (spec.md §4.1: "a decoder reading past an incomplete frame
    /// returns UnexpectedEOF").
    UnexpectedEof,
    Io(io::Error),
    Encode(serde_json::Error),
    Decode(serde_json::Error),
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eof => f.write_str("clean end of stream"),
            Self::UnexpectedEof => f.write_str("unexpected end of stream mid-frame"),
            Self::Io(e) => write!(f, "io error: {e}"),
            Self::Encode(e) => write!(f, "encode error: {e}"),
            Self::Decode(e) => write!(f, "decode error: {e}"),
        }
    }
}

impl std::error::Error for CodecError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Eof | Self::UnexpectedEof => None,
            Self::Io(e) => Some(e),
            Self::Encode(e) | Self::Decode(e) => Some(e),
        }
    }
}

impl From<io::Error> for CodecError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl CodecError {
    /// Whether this terminates the connection outright.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Eof | Self::UnexpectedEof | Self::Io(_))
    }
}

impl From<CodecError> for zerone_core::Error {
    fn from(e: CodecError) -> Self {
        zerone_core::Error::Codec(Box::new(e))
    }
}
