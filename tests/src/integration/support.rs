//! Shared fixtures for the cross-process scenarios.

use shared_net::LoopbackNetwork;
use std::future::Future;
use std::time::{Duration, Instant};
use transport_node::{TransportConfig, TransportContext};

/// How long any scenario waits for the graph to converge.
pub const DEADLINE: Duration = Duration::from_secs(3);

/// A simulated process on `host` with fast heartbeats.
pub fn context(hub: &LoopbackNetwork, host: &str) -> TransportContext {
    TransportContext::loopback(hub, host, TransportConfig::for_testing())
        .expect("loopback context")
}

/// Poll `condition` until it holds, panicking with `what` after
/// [`DEADLINE`].
pub async fn eventually<F>(what: &str, mut condition: F)
where
    F: FnMut() -> bool,
{
    let started = Instant::now();
    while !condition() {
        assert!(started.elapsed() < DEADLINE, "timed out waiting for {what}");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Let background tasks run for `millis` without asserting anything.
pub async fn settle(millis: u64) {
    tokio::time::sleep(Duration::from_millis(millis)).await;
}

/// Await `future`, failing the test after [`DEADLINE`].
pub async fn within<T>(what: &str, future: impl Future<Output = T>) -> T {
    tokio::time::timeout(DEADLINE, future)
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {what}"))
}
