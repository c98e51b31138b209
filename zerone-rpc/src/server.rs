//! Wire engine — server half (spec.md §4.5).
//!
//! `original_source/rpc/server.go` only ever grew as far as `Register`; the
//! per-connection dispatch loop (`ServeCodec` in the upstream `net/rpc`
//! lineage this package imitates) was never committed. This module builds
//! that loop against [`zerone_registry::Registry`] instead of a
//! `reflect`-walked `serviceMap`, following spec.md §4.5 end to end: one
//! reader per connection, one spawned task per request so slow handlers
//! can't head-of-line block faster ones, and responses written as each
//! invocation completes rather than in request order.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;

use zerone_codec::ServerCodec;
use zerone_core::code;
use zerone_core::error::StructuredError;
use zerone_core::trace::TraceSink;
use zerone_core::{RequestHeader, ResponseHeader};
use zerone_registry::{MethodDescriptor, Registry};

/// Serve one already-connected codec against `registry` until the
/// connection closes or a fatal codec error is hit (spec.md §4.5). Returns
/// once the read loop exits; callers typically spawn this per accepted
/// connection.
pub async fn serve_codec<C>(codec: C, registry: Arc<Registry>, server_name: String, trace: Arc<dyn TraceSink>)
where
    C: ServerCodec<RequestBody = serde_json::Value> + 'static,
{
    let codec = Arc::new(codec);
    loop {
        let mut header = RequestHeader::default();
        if let Err(e) = codec.read_request_header(&mut header).await {
            tracing::debug!(error = %e, "wire server reader exiting");
            break;
        }

        let raw_body = match codec.take_request_body().await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(error = %e, "fatal codec error taking request body, closing connection");
                break;
            }
        };

        let method = registry.lookup(&header.class_method);
        tokio::spawn(dispatch_one(codec.clone(), header, raw_body, method, server_name.clone(), trace.clone()));
    }
}

async fn dispatch_one<C>(
    codec: Arc<C>,
    header: RequestHeader,
    raw_body: serde_json::Value,
    method: Option<Arc<MethodDescriptor>>,
    server_name: String,
    trace: Arc<dyn TraceSink>,
) where
    C: ServerCodec<RequestBody = serde_json::Value> + 'static,
{
    trace.on_request(&header.trace_id, "", &header.class_method, header.verbose);
    let start = std::time::Instant::now();

    let Some(method) = method else {
        let err = StructuredError::new(code::INVALID_HEADER, format!("can't find method {}", header.class_method)).with_origin_if_empty(&server_name);
        respond(&codec, &header, Err(err), &trace, start).await;
        return;
    };

    let args = match method.decode_args(raw_body) {
        Ok(args) => args,
        Err(e) => {
            let err = StructuredError::new(code::INVALID_REQUEST, e.to_string()).with_origin_if_empty(&server_name);
            respond(&codec, &header, Err(err), &trace, start).await;
            return;
        }
    };

    let mut reply = method.alloc_reply();
    let ctx = zerone_core::Context::new(header.trace_id.clone(), header.verbose);
    let outcome = AssertUnwindSafe(method.invoke(ctx, args, &mut *reply)).catch_unwind().await;

    let result = match outcome {
        Ok(Ok(())) => method.encode_reply(&*reply).map_err(|e| StructuredError::new(code::INTERNAL, e.to_string())),
        Ok(Err(structured)) => Err(structured),
        Err(panic) => {
            let msg = panic_message(&panic);
            tracing::error!(class_method = %header.class_method, panic = %msg, "handler panicked");
            Err(StructuredError::new(code::INTERNAL, format!("handler panicked: {msg}")))
        }
    }
    .map_err(|e| e.with_origin_if_empty(&server_name));

    match result {
        Ok(body) => respond_body(&codec, &header, body, &trace, start).await,
        Err(err) => respond(&codec, &header, Err(err), &trace, start).await,
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

async fn respond<C>(codec: &C, request: &RequestHeader, result: Result<(), StructuredError>, trace: &Arc<dyn TraceSink>, start: std::time::Instant)
where
    C: ServerCodec<RequestBody = serde_json::Value>,
{
    match result {
        Ok(()) => respond_body(codec, request, serde_json::Value::Null, trace, start).await,
        Err(err) => {
            trace.on_response(&request.trace_id, "", &request.class_method, request.verbose, start.elapsed(), Some(&err.to_string()));
            let header = ResponseHeader {
                class_method: request.class_method.clone(),
                sequence: request.sequence,
                error: err,
            };
            if let Err(e) = codec.write_response::<()>(&header, None).await {
                tracing::warn!(error = %e, "failed writing error response");
            }
        }
    }
}

async fn respond_body<C>(codec: &C, request: &RequestHeader, body: serde_json::Value, trace: &Arc<dyn TraceSink>, start: std::time::Instant)
where
    C: ServerCodec<RequestBody = serde_json::Value>,
{
    trace.on_response(&request.trace_id, "", &request.class_method, request.verbose, start.elapsed(), None);
    let header = ResponseHeader {
        class_method: request.class_method.clone(),
        sequence: request.sequence,
        error: StructuredError::ok(),
    };
    if let Err(e) = codec.write_response(&header, Some(&body)).await {
        tracing::warn!(error = %e, "failed writing response");
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde::{Deserialize, Serialize};
    use tokio::io::duplex;
    use zerone_codec::json::{JsonClientCodec, JsonServerCodec};
    use zerone_codec::ClientCodec;
    use zerone_core::trace::NopSink;
    use zerone_registry::ClassBuilder;

    #[derive(Serialize, Deserialize, Default)]
    struct Args {
        text: String,
    }

    #[derive(Serialize, Deserialize, Default, PartialEq, Debug)]
    struct Reply {
        text: String,
    }

    async fn echo(_ctx: zerone_core::Context, args: Args) -> Result<Reply, StructuredError> {
        Ok(Reply { text: args.text })
    }

    async fn boom(_ctx: zerone_core::Context, _args: Args) -> Result<Reply, StructuredError> {
        panic!("boom");
    }

    fn registry() -> Arc<Registry> {
        let registry = Registry::new();
        registry
            .register(ClassBuilder::new("Echo").method("Echo", MethodDescriptor::new(echo)).method("Boom", MethodDescriptor::new(boom)).build())
            .unwrap();
        Arc::new(registry)
    }

    #[tokio::test]
    async fn unknown_method_gets_invalid_header() {
        let (client_side, server_side) = duplex(8192);
        let (client_read, client_write) = tokio::io::split(client_side);
        let (server_read, server_write) = tokio::io::split(server_side);

        let client = JsonClientCodec::new(client_read, client_write);
        let server = JsonServerCodec::new(server_read, server_write);
        tokio::spawn(serve_codec(server, registry(), "test-server".to_string(), Arc::new(NopSink)));

        let request = RequestHeader {
            class_method: "Missing.Echo".to_string(),
            sequence: 1,
            ..Default::default()
        };
        client.write_request(&request, Some(&Args::default())).await.unwrap();

        let mut response = ResponseHeader::default();
        client.read_response_header(&mut response).await.unwrap();
        client.read_response_body::<()>(None).await.unwrap();
        assert_eq!(response.error.code, code::INVALID_HEADER);
        assert_eq!(response.error.origin, "test-server");
    }

    #[tokio::test]
    async fn panicking_handler_returns_internal_error_and_keeps_serving() {
        let (client_side, server_side) = duplex(8192);
        let (client_read, client_write) = tokio::io::split(client_side);
        let (server_read, server_write) = tokio::io::split(server_side);

        let client = JsonClientCodec::new(client_read, client_write);
        let server = JsonServerCodec::new(server_read, server_write);
        tokio::spawn(serve_codec(server, registry(), "test-server".to_string(), Arc::new(NopSink)));

        let request = RequestHeader {
            class_method: "Echo.Boom".to_string(),
            sequence: 1,
            ..Default::default()
        };
        client.write_request(&request, Some(&Args { text: "x".to_string() })).await.unwrap();
        let mut response = ResponseHeader::default();
        client.read_response_header(&mut response).await.unwrap();
        client.read_response_body::<()>(None).await.unwrap();
        assert_eq!(response.error.code, code::INTERNAL);

        let request2 = RequestHeader {
            class_method: "Echo.Echo".to_string(),
            sequence: 2,
            ..Default::default()
        };
        client.write_request(&request2, Some(&Args { text: "still alive".to_string() })).await.unwrap();
        let mut response2 = ResponseHeader::default();
        client.read_response_header(&mut response2).await.unwrap();
        let mut reply = Reply::default();
        client.read_response_body(Some(&mut reply)).await.unwrap();
        assert!(response2.error.is_ok());
        assert_eq!(reply.text, "still alive");
    }

    #[tokio::test]
    async fn handler_observes_trace_id_and_verbose_from_the_request() {
        let (client_side, server_side) = duplex(8192);
        let (client_read, client_write) = tokio::io::split(client_side);
        let (server_read, server_write) = tokio::io::split(server_side);

        let client = JsonClientCodec::new(client_read, client_write);
        let server = JsonServerCodec::new(server_read, server_write);

        let registry = Registry::new();
        registry
            .register(
                ClassBuilder::new("Probe")
                    .method(
                        "Context",
                        MethodDescriptor::new(|ctx: zerone_core::Context, _args: Args| async move {
                            Ok::<_, StructuredError>(Reply { text: format!("{}/{}", ctx.trace_id, ctx.verbose) })
                        }),
                    )
                    .build(),
            )
            .unwrap();
        tokio::spawn(serve_codec(server, Arc::new(registry), "test-server".to_string(), Arc::new(NopSink)));

        let request = RequestHeader {
            class_method: "Probe.Context".to_string(),
            sequence: 1,
            trace_id: "trace-xyz".to_string(),
            verbose: 3,
            ..Default::default()
        };
        client.write_request(&request, Some(&Args::default())).await.unwrap();

        let mut response = ResponseHeader::default();
        client.read_response_header(&mut response).await.unwrap();
        let mut reply = Reply::default();
        client.read_response_body(Some(&mut reply)).await.unwrap();
        assert_eq!(reply.text, "trace-xyz/3");
    }
}
