//! Wire codec contract (spec.md §4.1) and a reference newline-delimited
//! JSON implementation (spec.md §6).
//!
//! Concrete codec implementations beyond this contract are explicitly out
//! of scope for the core (spec.md §1); the JSON codec under [`json`] exists
//! because spec.md §6 defines its wire format as part of the external
//! interface, the same way the source ships exactly one reference codec
//! (`rpc/codec/json_codec`) alongside the transport-agnostic contract.

mod error;
pub mod json;

pub use error::CodecError;

use serde::{de::DeserializeOwned, Serialize};
use zerone_core::{RequestHeader, ResponseHeader};

/// Codec half used by the wire engine's client side (spec.md §4.1).
///
/// Every method takes `&self`: the reference JSON codec guards its encoder
/// and its reader each behind their own `tokio::sync::Mutex`, matching the
/// source's `sync.Mutex`-guarded `json.Encoder`. "Header reads are strictly
/// sequential" (spec.md §4.1 point 2) is an engine-level discipline — only
/// the wire-client's single reader task ever calls
/// [`read_response_header`](ClientCodec::read_response_header) — not
/// something the type system enforces here.
pub trait ClientCodec: Send + Sync {
    /// Encode and flush one complete, self-describing request frame. A
    /// `None` body encodes as an absent body.
    fn write_request<T>(
        &self,
        header: &RequestHeader,
        body: Option<&T>,
    ) -> impl Future<Output = Result<(), CodecError>> + Send
    where
        T: Serialize + Sync;

    /// Read the next response header. Header reads are strictly
    /// sequential — callers must not call this concurrently with itself or
    /// with [`read_response_body`](ClientCodec::read_response_body).
    fn read_response_header(&self, header: &mut ResponseHeader) -> impl Future<Output = Result<(), CodecError>> + Send;

    /// Consume the body staged by the most recent
    /// [`read_response_header`](ClientCodec::read_response_header) call. A
    /// `None` target skips decoding but the bytes are consumed regardless.
    fn read_response_body<T>(&self, body: Option<&mut T>) -> impl Future<Output = Result<(), CodecError>> + Send
    where
        T: DeserializeOwned;

    fn close(&self) -> impl Future<Output = Result<(), CodecError>> + Send;
}

/// Codec half used by the wire engine's server side (spec.md §4.1).
pub trait ServerCodec: Send + Sync {
    /// The undecoded request body staged by
    /// [`read_request_header`](ServerCodec::read_request_header); the
    /// method registry decodes it into the concrete `args` type once the
    /// target method is known (spec.md §4.5 "args are decoded into a newly
    /// allocated value of the method's argsType").
    type RequestBody: Send;

    fn read_request_header(&self, header: &mut RequestHeader) -> impl Future<Output = Result<(), CodecError>> + Send;

    /// Take the raw body staged by the most recent header read. Always
    /// consumes the bytes, whether or not the caller goes on to decode them
    /// (spec.md §4.1: "a nil body pointer on read skips the body but still
    /// consumes its bytes").
    fn take_request_body(&self) -> impl Future<Output = Result<Self::RequestBody, CodecError>> + Send;

    /// Decode a previously-taken raw body into a concrete type.
    fn decode_body<T>(raw: Self::RequestBody) -> Result<T, CodecError>
    where
        T: DeserializeOwned;

    /// Write one complete response frame. Safe under concurrent callers —
    /// in-flight invocations may complete out of order and write directly
    /// (spec.md §4.5).
    fn write_response<T>(
        &self,
        header: &ResponseHeader,
        body: Option<&T>,
    ) -> impl Future<Output = Result<(), CodecError>> + Send
    where
        T: Serialize + Sync;

    fn close(&self) -> impl Future<Output = Result<(), CodecError>> + Send;
}
