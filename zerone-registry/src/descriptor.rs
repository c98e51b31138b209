//! Method descriptors: the reflection-free replacement for `net/rpc`'s
//! `reflect.Method` introspection (spec.md §9 Design Notes, grounded on
//! `original_source/rpc/parser.go`'s `checkIns`/`checkOuts`/`parseMethod`).
//!
//! Where the source walks a receiver's method set with `reflect` and
//! validates each method's four-argument shape at registration time, here a
//! caller builds one [`MethodDescriptor`] per method explicitly through
//! [`crate::ClassBuilder::method`], which the type system checks instead of
//! a runtime reflect walk.

use std::any::Any;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use zerone_codec::CodecError;
use zerone_core::code;
use zerone_core::context::Context;
use zerone_core::error::StructuredError;

pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// Closures standing in for what the source's `method` struct derived from
/// `reflect.Method`: how to decode wire bytes into `args`, how to allocate
/// a fresh `reply`, how to run the handler against both, and — since Rust
/// has no runtime-reflective equivalent of encoding an arbitrary
/// `interface{}` — how to encode the mutated reply back out once the
/// handler returns. The first three map 1:1 onto spec.md §9's three
/// closures; `encode_reply` exists only because type erasure is opaque in
/// both directions here, not just on the way in.
pub struct MethodDescriptor {
    pub(crate) decode_args: Box<dyn Fn(Value) -> Result<Box<dyn Any + Send>, CodecError> + Send + Sync>,
    pub(crate) alloc_reply: Box<dyn Fn() -> Box<dyn Any + Send> + Send + Sync>,
    pub(crate) invoke: Box<dyn Fn(Context, Box<dyn Any + Send>, &mut (dyn Any + Send)) -> BoxFuture<Result<(), StructuredError>> + Send + Sync>,
    pub(crate) encode_reply: Box<dyn Fn(&(dyn Any + Send)) -> Result<Value, CodecError> + Send + Sync>,
}

impl MethodDescriptor {
    pub fn decode_args(&self, raw: Value) -> Result<Box<dyn Any + Send>, CodecError> {
        (self.decode_args)(raw)
    }

    pub fn alloc_reply(&self) -> Box<dyn Any + Send> {
        (self.alloc_reply)()
    }

    pub fn invoke(&self, ctx: Context, args: Box<dyn Any + Send>, reply: &mut (dyn Any + Send)) -> BoxFuture<Result<(), StructuredError>> {
        (self.invoke)(ctx, args, reply)
    }

    pub fn encode_reply(&self, reply: &(dyn Any + Send)) -> Result<Value, CodecError> {
        (self.encode_reply)(reply)
    }

    /// Build a descriptor from a concrete handler. `A`/`R` stand in for the
    /// source's `args`/`reply` reflect types; `handler` plays the role of
    /// the receiver method itself, taking the [`Context`] the wire engine
    /// builds from the request's `traceID`/`verbose` in place of the
    /// source's `context.Context` parameter (spec.md §4.5).
    pub fn new<A, R, F, Fut>(handler: F) -> Self
    where
        A: DeserializeOwned + Send + 'static,
        R: Serialize + Send + Default + 'static,
        F: Fn(Context, A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, StructuredError>> + Send + 'static,
    {
        let handler = Arc::new(handler);
        Self {
            decode_args: Box::new(|raw: Value| {
                let args: A = serde_json::from_value(raw).map_err(CodecError::Decode)?;
                Ok(Box::new(args) as Box<dyn Any + Send>)
            }),
            alloc_reply: Box::new(|| Box::new(R::default()) as Box<dyn Any + Send>),
            invoke: Box::new(move |ctx, args, reply| {
                let handler = handler.clone();
                Box::pin(async move {
                    let args = *args
                        .downcast::<A>()
                        .map_err(|_| StructuredError::new(code::INTERNAL, "registry: args type mismatch"))?;
                    let result = handler(ctx, args).await?;
                    let slot = reply
                        .downcast_mut::<R>()
                        .ok_or_else(|| StructuredError::new(code::INTERNAL, "registry: reply type mismatch"))?;
                    *slot = result;
                    Ok(())
                })
            }),
            encode_reply: Box::new(|reply: &(dyn Any + Send)| {
                let reply = reply.downcast_ref::<R>().expect("registry: reply type mismatch on encode is an internal invariant violation");
                serde_json::to_value(reply).map_err(CodecError::Encode)
            }),
        }
    }
}
