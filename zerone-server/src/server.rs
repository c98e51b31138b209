//! High-level server (spec.md §2 "compose wire engine + listener + registry
//! registration"). Single-runtime accept loop: one task per listener, one
//! task per accepted connection, OS-signal-driven or handle-driven graceful
//! shutdown bounded by a timeout, grounded on the teacher's
//! `Builder`/`Server`/`ServerHandle` shape with the OS-thread-per-worker
//! layer collapsed into plain `tokio::spawn` tasks.

use std::io;
use std::net::ToSocketAddrs;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info};

use zerone_codec::json::JsonServerCodec;
use zerone_core::trace::{NopSink, TraceSink};
use zerone_registry::Registry;
use zerone_rpc::serve_codec;

use crate::shutdown::{self, ConnectionCounter};
use crate::signals::Signals;

/// Builds and runs a [`Server`]. Mirrors the teacher's fluent `Builder`,
/// collapsed to the single listener a zerone server needs (spec.md §6:
/// one TCP listener per server process).
pub struct ServerBuilder {
    listener: std::net::TcpListener,
    registry: Arc<Registry>,
    server_name: String,
    trace: Arc<dyn TraceSink>,
    shutdown_timeout: Duration,
    enable_signal: bool,
}

impl ServerBuilder {
    pub fn bind(addr: impl ToSocketAddrs, registry: Arc<Registry>) -> io::Result<Self> {
        let addr = addr
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| io::Error::new(io::ErrorKind::AddrNotAvailable, "could not resolve a socket address"))?;
        let listener = std::net::TcpListener::bind(addr)?;
        listener.set_nonblocking(true)?;
        Ok(Self {
            listener,
            registry,
            server_name: String::from("zerone"),
            trace: Arc::new(NopSink),
            shutdown_timeout: Duration::from_secs(30),
            enable_signal: true,
        })
    }

    pub fn server_name(mut self, name: impl Into<String>) -> Self {
        self.server_name = name.into();
        self
    }

    pub fn trace(mut self, trace: Arc<dyn TraceSink>) -> Self {
        self.trace = trace;
        self
    }

    /// Time the server waits for in-flight connections to drain after a
    /// graceful stop before abandoning them (spec.md §5). Default 30s.
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Disable OS signal handling; the server then only stops via
    /// [`ServerHandle::stop`].
    pub fn disable_signal(mut self) -> Self {
        self.enable_signal = false;
        self
    }

    pub fn build(self) -> Server {
        Server {
            listener: self.listener,
            registry: self.registry,
            server_name: self.server_name,
            trace: self.trace,
            shutdown_timeout: self.shutdown_timeout,
            enable_signal: self.enable_signal,
        }
    }
}

pub struct Server {
    listener: std::net::TcpListener,
    registry: Arc<Registry>,
    server_name: String,
    trace: Arc<dyn TraceSink>,
    shutdown_timeout: Duration,
    enable_signal: bool,
}

impl Server {
    pub fn bind(addr: impl ToSocketAddrs, registry: Arc<Registry>) -> io::Result<ServerBuilder> {
        ServerBuilder::bind(addr, registry)
    }

    pub fn local_addr(&self) -> io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    /// Start accepting connections. Returns a [`ServerHandle`] for an
    /// explicit stop; the server also reacts to OS signals unless
    /// `disable_signal` was used on the builder.
    pub fn run(self) -> io::Result<ServerHandle> {
        let listener = TcpListener::from_std(self.listener)?;
        info!(address = ?listener.local_addr().ok(), server_name = %self.server_name, "zerone server listening");

        let (stop_tx, stop_rx) = oneshot::channel::<bool>();
        let counter = ConnectionCounter::new();
        let registry = self.registry;
        let server_name = self.server_name;
        let trace = self.trace;
        let shutdown_timeout = self.shutdown_timeout;
        let enable_signal = self.enable_signal;

        let join = tokio::spawn(async move {
            let accept_loop = accept_loop(listener, registry, server_name, trace, counter.clone());
            let graceful = if enable_signal {
                tokio::select! {
                    result = stop_rx => result.unwrap_or(true),
                    signal = Signals::start() => { info!(?signal, "received signal, shutting down"); true }
                    () = accept_loop => unreachable!("accept loop never returns"),
                }
            } else {
                tokio::select! {
                    result = stop_rx => result.unwrap_or(true),
                    () = accept_loop => unreachable!("accept loop never returns"),
                }
            };

            if graceful {
                shutdown::drain(counter, shutdown_timeout).await;
            }
        });

        Ok(ServerHandle { stop_tx: Some(stop_tx), join: Some(join) })
    }
}

async fn accept_loop(listener: TcpListener, registry: Arc<Registry>, server_name: String, trace: Arc<dyn TraceSink>, counter: ConnectionCounter) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                let _ = stream.set_nodelay(true);
                let registry = registry.clone();
                let server_name = server_name.clone();
                let trace = trace.clone();
                let guard = counter.guard();
                tokio::spawn(async move {
                    let _guard = guard;
                    let (r, w) = stream.into_split();
                    let codec = JsonServerCodec::new(r, w);
                    serve_codec(codec, registry, server_name, trace).await;
                    tracing::debug!(%peer, "connection closed");
                });
            }
            Err(e) if connection_error(&e) => continue,
            Err(e) => {
                error!(error = %e, "error accepting connection");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
}

/// Per-connection errors that don't warrant backing off before the next
/// `accept()` (adapted from the teacher's worker accept loop).
fn connection_error(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::ConnectionRefused | io::ErrorKind::ConnectionAborted | io::ErrorKind::ConnectionReset)
}

/// Handle returned by [`Server::run`]; stopping is idempotent past the
/// first call (spec.md §5, mirrors the teacher's `ServerHandle`).
pub struct ServerHandle {
    stop_tx: Option<oneshot::Sender<bool>>,
    join: Option<JoinHandle<()>>,
}

impl ServerHandle {
    /// Request a stop. `graceful = true` drains in-flight connections up to
    /// the configured timeout before returning from [`Self::wait`].
    pub fn stop(&mut self, graceful: bool) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(graceful);
        }
    }

    /// Wait for the server task to finish (after a stop, graceful or not).
    pub async fn wait(mut self) {
        if let Some(join) = self.join.take() {
            let _ = join.await;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde::{Deserialize, Serialize};
    use tokio::net::TcpStream;
    use zerone_codec::json::JsonClientCodec;
    use zerone_codec::ClientCodec;
    use zerone_core::{RequestHeader, ResponseHeader};
    use zerone_registry::{ClassBuilder, MethodDescriptor};

    #[derive(Serialize, Deserialize, Default)]
    struct Args {
        text: String,
    }

    #[derive(Serialize, Deserialize, Default)]
    struct Reply {
        text: String,
    }

    #[tokio::test]
    async fn serves_one_request_then_stops_gracefully() {
        let registry = Arc::new(Registry::new());
        registry
            .register(
                ClassBuilder::new("Echo")
                    .method(
                        "Echo",
                        MethodDescriptor::new(|_ctx: zerone_core::Context, args: Args| async move { Ok::<_, zerone_core::StructuredError>(Reply { text: args.text }) }),
                    )
                    .build(),
            )
            .unwrap();

        let mut server = Server::bind("127.0.0.1:0", registry).unwrap().disable_signal().build();
        let addr = server.local_addr().unwrap();
        let mut handle = server.run().unwrap();

        let stream = TcpStream::connect(addr).await.unwrap();
        let (r, w) = stream.into_split();
        let codec = JsonClientCodec::new(r, w);
        let header = RequestHeader { class_method: "Echo.Echo".into(), sequence: 1, client_name: "t".into(), trace_id: "t".into(), verbose: 0 };
        codec.write_request(&header, Some(&Args { text: "ping".into() })).await.unwrap();
        let mut response_header = ResponseHeader::default();
        codec.read_response_header(&mut response_header).await.unwrap();
        let mut reply = Reply::default();
        codec.read_response_body(Some(&mut reply)).await.unwrap();
        assert_eq!(reply.text, "ping");
        assert!(response_header.error.is_ok());

        handle.stop(true);
        handle.wait().await;
    }
}
