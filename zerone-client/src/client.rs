//! High-level client (spec.md §4.9): composes a connection pool, a
//! routing table, a balance policy and a fail policy; exposes unary call,
//! async call (`go`) and broadcast.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::mpsc;

use zerone_balance::{Balancer, RoutingTable};
use zerone_core::error::{Error, TransportError};
use zerone_core::Endpoint;
use zerone_rpc::Call;

use crate::connect::{dial_tcp, TcpClientCodec};
use crate::fail::{no_endpoint_error, FailPolicy};
use crate::pool::ConnectionPool;

/// One endpoint's outcome from a [`Client::broadcast`] (spec.md §4.9).
pub struct BroadcastResult<R> {
    pub endpoint: Endpoint,
    pub result: Result<R, Error>,
}

/// Composes pool + table + balancer + fail policy (spec.md §4.9).
/// `with_balance_policy`/`with_fail_policy` return a shallow clone sharing
/// the pool, the table and the shutdown latch.
pub struct Client {
    pool: Arc<ConnectionPool<TcpClientCodec>>,
    table: Arc<dyn RoutingTable>,
    balancer: Arc<dyn Balancer>,
    fail_policy: FailPolicy,
    shutdown: Arc<AtomicBool>,
    client_name: String,
}

impl Client {
    pub fn new(client_name: impl Into<String>, table: Arc<dyn RoutingTable>, balancer: Arc<dyn Balancer>, fail_policy: FailPolicy) -> Self {
        let client_name = client_name.into();
        Self {
            pool: Arc::new(ConnectionPool::new(client_name.clone())),
            table,
            balancer,
            fail_policy,
            shutdown: Arc::new(AtomicBool::new(false)),
            client_name,
        }
    }

    /// Shallow clone with a different balance policy, sharing pool, table
    /// and shutdown latch (spec.md §4.9).
    pub fn with_balance_policy(&self, balancer: Arc<dyn Balancer>) -> Self {
        Self {
            pool: self.pool.clone(),
            table: self.table.clone(),
            balancer,
            fail_policy: self.fail_policy.clone(),
            shutdown: self.shutdown.clone(),
            client_name: self.client_name.clone(),
        }
    }

    /// Shallow clone with a different fail policy (spec.md §4.9).
    pub fn with_fail_policy(&self, fail_policy: FailPolicy) -> Self {
        Self {
            pool: self.pool.clone(),
            table: self.table.clone(),
            balancer: self.balancer.clone(),
            fail_policy,
            shutdown: self.shutdown.clone(),
            client_name: self.client_name.clone(),
        }
    }

    pub fn pool(&self) -> &Arc<ConnectionPool<TcpClientCodec>> {
        &self.pool
    }

    async fn dispatch_once<A, R>(&self, endpoint: &Endpoint, class_method: &str, args: &A, verbose: i32, timeout: Option<Duration>) -> Result<R, Error>
    where
        A: Serialize + Sync,
        R: DeserializeOwned + Send + Sync + Clone + Default + 'static,
    {
        let key = endpoint.pool_key();
        let address = endpoint.address.clone();
        let client_name = self.client_name.clone();
        let wire = self
            .pool
            .dial(&key, move |_pool_name, trace| async move { dial_tcp(&address, &client_name, trace).await })
            .await?;
        wire.call(class_method, args, R::default(), verbose, None, timeout).await
    }

    /// Blocking unary call, retried per the current fail policy (spec.md
    /// §4.9, §2 data flow: `Call -> FailPolicy.execute -> Balancer.pick ->
    /// Pool.dial -> WireClient.Go -> ... -> caller`).
    pub async fn call<A, R>(&self, class_method: &str, key: &str, args: &A, verbose: i32, timeout: Option<Duration>) -> Result<R, Error>
    where
        A: Serialize + Sync,
        R: DeserializeOwned + Send + Sync + Clone + Default + 'static,
    {
        if self.shutdown.load(Ordering::SeqCst) {
            return Err(Error::Transport(TransportError::Shutdown));
        }
        self.fail_policy
            .execute(self.balancer.as_ref(), self.table.as_ref(), key, |endpoint| async move {
                self.dispatch_once(&endpoint, class_method, args, verbose, timeout).await
            })
            .await
    }

    /// Non-blocking dispatch: the balancer picks one endpoint (no retry),
    /// the call is handed to the wire-client's `Go` and the resulting
    /// `Call` handle is returned immediately (spec.md §4.9's "async
    /// call").
    pub async fn go<A, R>(&self, class_method: &str, key: &str, args: &A, verbose: i32, timeout: Option<Duration>) -> Result<Arc<Call<R>>, Error>
    where
        A: Serialize + Sync,
        R: DeserializeOwned + Send + Sync + Default + 'static,
    {
        if self.shutdown.load(Ordering::SeqCst) {
            return Err(Error::Transport(TransportError::Shutdown));
        }
        let endpoint = self.balancer.get_endpoint(self.table.as_ref(), key).map_err(|_| no_endpoint_error())?;
        let pool_key = endpoint.pool_key();
        let address = endpoint.address.clone();
        let client_name = self.client_name.clone();
        let wire = self.pool.dial(&pool_key, move |_name, trace| async move { dial_tcp(&address, &client_name, trace).await }).await?;
        wire.go(class_method, args, R::default(), None, verbose, None, timeout).await
    }

    /// Fan one call to every known endpoint (spec.md §4.9). Dial failures
    /// and call errors are reported as [`BroadcastResult`] entries rather
    /// than short-circuiting the whole broadcast. Each concurrent call
    /// gets a freshly allocated reply from `reply_factory` so replies
    /// never alias between endpoints.
    pub async fn broadcast<A, R, F>(&self, class_method: &str, args: &A, reply_factory: F, verbose: i32, timeout: Option<Duration>) -> Vec<BroadcastResult<R>>
    where
        A: Serialize + Sync + Clone + Send + 'static,
        R: DeserializeOwned + Send + Sync + Clone + Default + 'static,
        F: Fn() -> R,
    {
        let endpoints = self.table.list_endpoints();
        let (tx, mut rx) = mpsc::channel(endpoints.len().max(1));

        for endpoint in endpoints {
            let tx = tx.clone();
            let pool = self.pool.clone();
            let client_name = self.client_name.clone();
            let class_method = class_method.to_string();
            let args = args.clone();
            let reply = reply_factory();
            tokio::spawn(async move {
                let key = endpoint.pool_key();
                let address = endpoint.address.clone();
                let result = dial_and_call(&pool, &key, &address, &client_name, &class_method, &args, reply, verbose, timeout).await;
                let _ = tx.send(BroadcastResult { endpoint, result }).await;
            });
        }
        drop(tx);

        let mut results = Vec::new();
        while let Some(r) = rx.recv().await {
            results.push(r);
        }
        results
    }

    /// Idempotent close (spec.md §4.9): a single-shot CAS on the shared
    /// shutdown latch; after success the pool is closed too. Subsequent
    /// calls to `close` return `Shutdown`.
    pub async fn close(&self) -> Result<(), Error> {
        if self.shutdown.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst).is_ok() {
            self.pool.close().await;
            Ok(())
        } else {
            Err(Error::Transport(TransportError::Shutdown))
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn dial_and_call<A, R>(
    pool: &ConnectionPool<TcpClientCodec>,
    key: &str,
    address: &str,
    client_name: &str,
    class_method: &str,
    args: &A,
    reply: R,
    verbose: i32,
    timeout: Option<Duration>,
) -> Result<R, Error>
where
    A: Serialize + Sync,
    R: DeserializeOwned + Send + Sync + Clone + 'static,
{
    let address = address.to_string();
    let client_name = client_name.to_string();
    let wire = pool.dial(key, move |_name, trace| async move { dial_tcp(&address, &client_name, trace).await }).await?;
    wire.call(class_method, args, reply, verbose, None, timeout).await
}

#[cfg(test)]
mod test {
    use super::*;
    use serde::Deserialize;
    use tokio::net::TcpListener;
    use zerone_balance::{RoundRobin, StaticTable};
    use zerone_core::error::StructuredError;
    use zerone_registry::{ClassBuilder, MethodDescriptor, Registry};

    #[derive(Serialize, Deserialize, Default, Clone, Debug, PartialEq)]
    struct Args {
        text: String,
    }

    #[derive(Serialize, Deserialize, Default, Clone, Debug, PartialEq)]
    struct Reply {
        text: String,
        served_by: u32,
    }

    async fn spawn_echo_server(id: u32) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let registry = Arc::new(Registry::new());
        registry
            .register(
                ClassBuilder::new("Echo")
                    .method(
                        "Echo",
                        MethodDescriptor::new(move |_ctx: zerone_core::Context, args: Args| async move { Ok::<_, StructuredError>(Reply { text: args.text, served_by: id }) }),
                    )
                    .build(),
            )
            .unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else { break };
                let registry = registry.clone();
                tokio::spawn(async move {
                    stream.set_nodelay(true).ok();
                    let (r, w) = stream.into_split();
                    let codec = zerone_codec::json::JsonServerCodec::new(r, w);
                    zerone_rpc::server::serve_codec(codec, registry, format!("server-{id}"), Arc::new(zerone_core::trace::NopSink)).await;
                });
            }
        });
        address
    }

    #[tokio::test]
    async fn call_round_trips_through_pool_and_balancer() {
        let addr = spawn_echo_server(1).await;
        let table: Arc<dyn RoutingTable> = Arc::new(StaticTable::new(vec![Endpoint::new("e0", "tcp", addr)]));
        let client = Client::new("tester", table, Arc::new(RoundRobin::default()), FailPolicy::failfast());

        let reply: Reply = client.call("Echo.Echo", "", &Args { text: "hi".to_string() }, 0, None).await.unwrap();
        assert_eq!(reply.text, "hi");

        client.close().await.unwrap();
        assert!(client.close().await.unwrap_err().is_shutdown());
    }

    #[tokio::test]
    async fn broadcast_hits_every_endpoint_with_independent_replies() {
        let a0 = spawn_echo_server(0).await;
        let a1 = spawn_echo_server(1).await;
        let a2 = spawn_echo_server(2).await;
        let table: Arc<dyn RoutingTable> = Arc::new(StaticTable::new(vec![
            Endpoint::new("e0", "tcp", a0),
            Endpoint::new("e1", "tcp", a1),
            Endpoint::new("e2", "tcp", a2),
        ]));
        let client = Client::new("tester", table, Arc::new(RoundRobin::default()), FailPolicy::failfast());

        let results = client
            .broadcast("Echo.Echo", &Args { text: "hey".to_string() }, Reply::default, 0, Some(Duration::from_secs(2)))
            .await;
        assert_eq!(results.len(), 3);
        let mut served_by: Vec<u32> = results.into_iter().map(|r| r.result.unwrap().served_by).collect();
        served_by.sort();
        assert_eq!(served_by, vec![0, 1, 2]);
    }
}
