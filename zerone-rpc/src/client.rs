//! Wire engine — client half (spec.md §4.4).
//!
//! The source's client-side multiplexer (`rpc/client.go`) is an unfinished
//! draft — `Go`/`Call`/`reading` are stubs with empty bodies. This module
//! builds the engine the stub was reaching for: sequence allocation, a
//! pending-call registry, a background reader, and the shutdown/unavailable
//! sweep, following the fully-specified behavior in spec.md §4.4 and the
//! pending-map-plus-background-reader shape demonstrated end-to-end by
//! `examples/spookyvision-postcard-rpc`'s `HostClient`.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;
use tokio::sync::Mutex as AsyncMutex;

use zerone_codec::{ClientCodec, CodecError};
use zerone_core::code;
use zerone_core::error::StructuredError;
use zerone_core::header::new_trace_id;
use zerone_core::trace::{NopSink, TraceSink};
use zerone_core::{Error, RequestHeader, ResponseHeader, TransportError};

/// Completion channels default to this capacity when a caller doesn't
/// supply one (spec.md §3: "10 by default if caller passes nothing").
pub const DEFAULT_DONE_CAPACITY: usize = 10;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One in-flight or completed call (spec.md §3 `Call`). Shared between the
/// caller and the reader task via `Arc`; `reply` and `error` are filled in
/// place by the reader before the completion is posted to `done`.
///
/// `reply` is a `tokio::sync::Mutex` rather than a `std::sync::Mutex`: the
/// reader task decodes the response body straight into it while holding the
/// guard across `ClientCodec::read_response_body`'s await point, and only a
/// guard from an async mutex is `Send` across that await.
pub struct Call<R> {
    pub class_method: String,
    pub sequence: u64,
    reply: AsyncMutex<R>,
    error: StdMutex<Option<Error>>,
    done: mpsc::Sender<Arc<Call<R>>>,
    trace: Arc<dyn TraceSink>,
    trace_id: String,
    peer: String,
    verbose: i32,
    start: Instant,
}

impl<R> Call<R> {
    /// Access the reply value. Only meaningful after the call has
    /// completed without error.
    pub async fn reply(&self) -> tokio::sync::MutexGuard<'_, R> {
        self.reply.lock().await
    }

    /// Take the completion error, if any. `None` means the call succeeded.
    pub fn take_error(&self) -> Option<Error> {
        self.error.lock().unwrap_or_else(|e| e.into_inner()).take()
    }

    fn finish(self: &Arc<Self>, err: Option<Error>) {
        let err_text = err.as_ref().map(|e| e.to_string());
        self.trace
            .on_response(&self.trace_id, &self.peer, &self.class_method, self.verbose, self.start.elapsed(), err_text.as_deref());
        *self.error.lock().unwrap_or_else(|e| e.into_inner()) = err;
        if let Err(e) = self.done.try_send(self.clone()) {
            tracing::warn!(sequence = self.sequence, class_method = %self.class_method, error = %e, "dropping call completion: done channel unavailable");
        }
    }
}

/// Type-erased handle the pending registry stores, so calls for different
/// `R` can share one map (spec.md §3 "Pending registry": `sequence -> Call`).
trait PendingEntry<C>: Send + Sync
where
    C: ClientCodec,
{
    fn abandon(self: Arc<Self>, err: Error);
    fn complete<'a>(self: Arc<Self>, codec: &'a C, proto_error: Option<StructuredError>) -> BoxFuture<'a, Result<(), CodecError>>;
}

impl<R, C> PendingEntry<C> for Call<R>
where
    R: DeserializeOwned + Send + Sync + 'static,
    C: ClientCodec,
{
    fn abandon(self: Arc<Self>, err: Error) {
        self.finish(Some(err));
    }

    fn complete<'a>(self: Arc<Self>, codec: &'a C, proto_error: Option<StructuredError>) -> BoxFuture<'a, Result<(), CodecError>> {
        Box::pin(async move {
            match proto_error {
                Some(structured) => {
                    codec.read_response_body::<()>(None).await?;
                    self.finish(Some(Error::Protocol(structured)));
                }
                None => {
                    let result = {
                        let mut reply = self.reply.lock().await;
                        codec.read_response_body(Some(&mut *reply)).await
                    };
                    match result {
                        Ok(()) => self.finish(None),
                        Err(e) => self.finish(Some(Error::Protocol(StructuredError::new(code::INVALID_RESPONSE, e.to_string())))),
                    }
                }
            }
            Ok(())
        })
    }
}

/// One multiplexed connection's client half (spec.md §4.4). `shutdown` and
/// `unavailable` are one-way latches; a client is *callable* iff neither is
/// set.
pub struct WireClient<C> {
    codec: C,
    pending: StdMutex<HashMap<u64, Arc<dyn PendingEntry<C>>>>,
    sequence: AtomicU64,
    shutdown: AtomicBool,
    unavailable: AtomicBool,
    client_name: String,
    peer: String,
    trace: StdMutex<Arc<dyn TraceSink>>,
}

impl<C> WireClient<C>
where
    C: ClientCodec + 'static,
{
    /// Wrap an already-connected codec and start its background reader.
    /// Dialing itself belongs to the connection pool (zerone-client), not
    /// here.
    pub fn spawn(codec: C, client_name: impl Into<String>, peer: impl Into<String>, trace: Arc<dyn TraceSink>) -> Arc<Self> {
        let client = Arc::new(Self {
            codec,
            pending: StdMutex::new(HashMap::new()),
            sequence: AtomicU64::new(0),
            shutdown: AtomicBool::new(false),
            unavailable: AtomicBool::new(false),
            client_name: client_name.into(),
            peer: peer.into(),
            trace: StdMutex::new(trace),
        });
        tokio::spawn(run_reader(client.clone()));
        client
    }

    pub fn spawn_silent(codec: C, client_name: impl Into<String>, peer: impl Into<String>) -> Arc<Self> {
        Self::spawn(codec, client_name, peer, Arc::new(NopSink))
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    pub fn is_unavailable(&self) -> bool {
        self.unavailable.load(Ordering::SeqCst)
    }

    /// Callable iff neither latch has tripped (spec.md §4.4).
    pub fn is_callable(&self) -> bool {
        !self.is_shutdown() && !self.is_unavailable()
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Swap the trace sink used by calls dispatched from now on (spec.md
    /// §4.6: pool-level trace setters "propagate to each live
    /// wire-client").
    pub fn set_trace(&self, trace: Arc<dyn TraceSink>) {
        *self.trace.lock().unwrap_or_else(|e| e.into_inner()) = trace;
    }

    /// Close the client. Idempotent: a second call returns `Shutdown`.
    pub async fn close(&self) -> Result<(), Error> {
        if self.shutdown.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst).is_ok() {
            self.codec.close().await?;
            Ok(())
        } else {
            Err(Error::Transport(TransportError::Shutdown))
        }
    }

    /// Non-blocking dispatch (spec.md §4.4 "send path"). Returns the `Call`
    /// immediately; the reader completes it asynchronously.
    #[allow(clippy::too_many_arguments)]
    pub async fn go<A, R>(
        self: &Arc<Self>,
        class_method: impl Into<String>,
        args: &A,
        reply: R,
        done: Option<mpsc::Sender<Arc<Call<R>>>>,
        verbose: i32,
        trace_id: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<Arc<Call<R>>, Error>
    where
        A: Serialize + Sync,
        R: DeserializeOwned + Send + Sync + 'static,
    {
        if !self.is_callable() {
            return Err(if self.is_shutdown() {
                Error::Transport(TransportError::Shutdown)
            } else {
                Error::Transport(TransportError::Unavailable)
            });
        }

        let class_method = class_method.into();
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let trace_id = trace_id.unwrap_or_else(new_trace_id);
        let header = RequestHeader {
            class_method: class_method.clone(),
            sequence,
            client_name: self.client_name.clone(),
            trace_id: trace_id.clone(),
            verbose,
        };
        let done = done.unwrap_or_else(|| mpsc::channel(DEFAULT_DONE_CAPACITY).0);
        let trace = self.trace.lock().unwrap_or_else(|e| e.into_inner()).clone();
        let call = Arc::new(Call {
            class_method,
            sequence,
            reply: AsyncMutex::new(reply),
            error: StdMutex::new(None),
            done,
            trace: trace.clone(),
            trace_id: trace_id.clone(),
            peer: self.peer.clone(),
            verbose,
            start: Instant::now(),
        });

        {
            let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
            if pending.insert(sequence, call.clone() as Arc<dyn PendingEntry<C>>).is_some() {
                return Err(Error::DuplicateSequence(sequence));
            }
        }

        trace.on_request(&trace_id, &self.peer, &header.class_method, verbose);

        if let Err(e) = self.codec.write_request(&header, Some(args)).await {
            self.pending.lock().unwrap_or_else(|e| e.into_inner()).remove(&sequence);
            return Err(Error::from(e));
        }

        if let Some(d) = timeout {
            let client = self.clone();
            tokio::spawn(async move {
                tokio::time::sleep(d).await;
                let entry = client.pending.lock().unwrap_or_else(|e| e.into_inner()).remove(&sequence);
                if let Some(entry) = entry {
                    entry.abandon(Error::Transport(TransportError::Timeout));
                }
            });
        }

        Ok(call)
    }

    /// Blocking convenience wrapper: `Go` then wait on `done` (spec.md
    /// §4.4 "`Call` wraps `Go` and waits on `done`").
    pub async fn call<A, R>(
        self: &Arc<Self>,
        class_method: impl Into<String>,
        args: &A,
        reply: R,
        verbose: i32,
        trace_id: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<R, Error>
    where
        A: Serialize + Sync,
        R: DeserializeOwned + Send + Sync + Clone + 'static,
    {
        let (tx, mut rx) = mpsc::channel(1);
        let call = self.go(class_method, args, reply, Some(tx), verbose, trace_id, timeout).await?;
        let completed = rx.recv().await.unwrap_or(call);
        match completed.take_error() {
            Some(e) => Err(e),
            None => Ok(completed.reply().await.clone()),
        }
    }
}

async fn run_reader<C>(client: Arc<WireClient<C>>)
where
    C: ClientCodec + 'static,
{
    loop {
        let mut header = ResponseHeader::default();
        if let Err(e) = client.codec.read_response_header(&mut header).await {
            tracing::debug!(error = %e, "wire client reader exiting");
            break;
        }

        let entry = client.pending.lock().unwrap_or_else(|e| e.into_inner()).remove(&header.sequence);
        let Some(entry) = entry else {
            let _ = client.codec.read_response_body::<()>(None).await;
            continue;
        };

        let proto_error = if header.error.is_ok() { None } else { Some(header.error) };
        if let Err(e) = entry.complete(&client.codec, proto_error).await {
            tracing::warn!(error = %e, "fatal codec error completing call, closing connection");
            break;
        }
    }

    client.unavailable.store(true, Ordering::SeqCst);
    let was_shutdown = client.shutdown.load(Ordering::SeqCst);
    let remaining: Vec<_> = client.pending.lock().unwrap_or_else(|e| e.into_inner()).drain().map(|(_, v)| v).collect();
    for entry in remaining {
        let err = if was_shutdown {
            Error::Transport(TransportError::Shutdown)
        } else {
            Error::Transport(TransportError::Unavailable)
        };
        entry.abandon(err);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde::Deserialize;
    use tokio::io::duplex;
    use zerone_codec::json::{JsonClientCodec, JsonServerCodec};
    use zerone_registry::{ClassBuilder, MethodDescriptor, Registry};

    #[derive(Serialize, Deserialize, Default, Clone, Debug, PartialEq)]
    struct Args {
        text: String,
    }

    #[derive(Serialize, Deserialize, Default, Clone, Debug, PartialEq)]
    struct Reply {
        text: String,
    }

    async fn echo(_ctx: zerone_core::Context, args: Args) -> Result<Reply, StructuredError> {
        Ok(Reply { text: args.text })
    }

    #[tokio::test]
    async fn echo_round_trip_and_double_close() {
        let (client_side, server_side) = duplex(8192);
        let (client_read, client_write) = tokio::io::split(client_side);
        let (server_read, server_write) = tokio::io::split(server_side);

        let client_codec = JsonClientCodec::new(client_read, client_write);
        let client = WireClient::spawn_silent(client_codec, "tester", "inproc");

        let server_codec = JsonServerCodec::new(server_read, server_write);
        let registry = Arc::new(Registry::new());
        registry
            .register(ClassBuilder::new("Echo").method("Echo", MethodDescriptor::new(echo)).build())
            .unwrap();
        tokio::spawn(crate::server::serve_codec(server_codec, registry, "test-server".to_string(), Arc::new(NopSink)));

        let reply = client
            .call(
                "Echo.Echo",
                &Args { text: "hello".to_string() },
                Reply::default(),
                0,
                None,
                Some(Duration::from_secs(2)),
            )
            .await
            .unwrap();
        assert_eq!(reply.text, "hello");

        client.close().await.unwrap();
        let err = client.close().await.unwrap_err();
        assert!(err.is_shutdown());
    }
}
