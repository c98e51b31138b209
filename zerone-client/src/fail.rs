//! Fail policy (spec.md §4.8): wraps a per-call dispatch with retry
//! semantics. A fail policy is "a function `(balancer, key, attempt) ->
//! (Call, error)`" in the source; here it's a small `enum` so the
//! high-level client can hold and swap a policy by value (`WithFailPolicy`
//! returns a shallow clone, spec.md §4.9) without paying for a trait
//! object whose `execute` would otherwise need a generic method — not
//! object-safe.

use std::future::Future;
use std::time::Duration;

use zerone_balance::{Balancer, RoutingTable};
use zerone_core::code;
use zerone_core::error::StructuredError;
use zerone_core::{Endpoint, Error, TransportError};

/// The code a "no endpoint in the routing table" failure carries onto the
/// wire-shaped [`StructuredError`] the high-level client returns (spec.md
/// §4.2: an open, registerable namespace).
pub const NO_ENDPOINT: i32 = -201;

pub(crate) fn no_endpoint_error() -> Error {
    static ONCE: std::sync::Once = std::sync::Once::new();
    ONCE.call_once(|| code::register(NO_ENDPOINT, "no endpoint available"));
    Error::Protocol(StructuredError::new(NO_ENDPOINT, "no endpoint available"))
}

pub fn default_min_delay() -> Duration {
    Duration::from_millis(100)
}

pub fn default_max_delay() -> Duration {
    Duration::from_secs(1)
}

fn normalize_try(n: u32) -> u32 {
    if n == 0 { 1 } else { n }
}

fn normalize_delays(min_delay: Duration, max_delay: Duration) -> (Duration, Duration) {
    let min_delay = if min_delay.is_zero() { default_min_delay() } else { min_delay };
    let max_delay = if max_delay.is_zero() { default_max_delay() } else { max_delay };
    if min_delay > max_delay { (max_delay, max_delay) } else { (min_delay, max_delay) }
}

/// `sleep(k) = min(maxDelay, minDelay * 2^(k-1))` for `k >= 1` (spec.md §8
/// Retry laws). `k` is the number of attempts already made.
fn backoff_delay(k: u32, min_delay: Duration, max_delay: Duration) -> Duration {
    let shift = k.saturating_sub(1);
    let factor = 1u64.checked_shl(shift).unwrap_or(u64::MAX);
    let scaled_nanos = (min_delay.as_nanos() as u64).saturating_mul(factor);
    Duration::from_nanos(scaled_nanos).min(max_delay)
}

/// Retry strategy for one logical call (spec.md §4.8).
#[derive(Debug, Clone)]
pub enum FailPolicy {
    /// Attempt once; surface any error.
    Failfast,
    /// Pick an endpoint once; attempt up to `try_count` times against that
    /// same endpoint with exponential backoff between tries.
    Failtry { try_count: u32, min_delay: Duration, max_delay: Duration },
    /// Up to `try_count` attempts, each re-picking the endpoint.
    Failover { try_count: u32 },
}

impl Default for FailPolicy {
    fn default() -> Self {
        Self::Failfast
    }
}

impl FailPolicy {
    pub fn failfast() -> Self {
        Self::Failfast
    }

    pub fn failtry(try_count: u32, min_delay: Duration, max_delay: Duration) -> Self {
        let try_count = normalize_try(try_count);
        let (min_delay, max_delay) = normalize_delays(min_delay, max_delay);
        Self::Failtry { try_count, min_delay, max_delay }
    }

    pub fn failover(try_count: u32) -> Self {
        Self::Failover { try_count: normalize_try(try_count) }
    }

    /// Run `attempt` against one or more endpoints chosen by `balancer`
    /// from `table`, applying this policy's retry semantics. `Shutdown`
    /// from `attempt` aborts retries immediately (spec.md §9: "the client
    /// is irrecoverably gone").
    pub async fn execute<F, Fut, T>(&self, balancer: &dyn Balancer, table: &dyn RoutingTable, key: &str, attempt: F) -> Result<T, Error>
    where
        F: Fn(Endpoint) -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        match self {
            Self::Failfast => {
                let endpoint = balancer.get_endpoint(table, key).map_err(|_| no_endpoint_error())?;
                attempt(endpoint).await
            }
            Self::Failtry { try_count, min_delay, max_delay } => {
                let endpoint = balancer.get_endpoint(table, key).map_err(|_| no_endpoint_error())?;
                for k in 1..=*try_count {
                    match attempt(endpoint.clone()).await {
                        Ok(v) => return Ok(v),
                        Err(e) if e.is_shutdown() => return Err(e),
                        Err(_) if k < *try_count => {
                            tokio::time::sleep(backoff_delay(k, *min_delay, *max_delay)).await;
                        }
                        Err(_) => {}
                    }
                }
                Err(Error::Transport(TransportError::Unavailable))
            }
            Self::Failover { try_count } => {
                for _ in 0..*try_count {
                    let endpoint = balancer.get_endpoint(table, key).map_err(|_| no_endpoint_error())?;
                    match attempt(endpoint).await {
                        Ok(v) => return Ok(v),
                        Err(e) if e.is_shutdown() => return Err(e),
                        Err(_) => continue,
                    }
                }
                Err(Error::Transport(TransportError::Unavailable))
            }
        }
    }
}
