//! In-memory datagram hub.
//!
//! Each [`LoopbackNetwork::bind`] creates one simulated process on a named
//! host. Broadcasts honor scope against host names, and individual
//! endpoints can be cut off with [`LoopbackNetwork::set_reachable`] to
//! simulate a partition or a crashed peer.

use crate::transport::{NetworkError, NetworkHandle, NetworkTransport, MAX_DATAGRAM_SIZE};
use parking_lot::RwLock;
use shared_types::Scope;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::trace;

struct Peer {
    host: String,
    tx: mpsc::UnboundedSender<Vec<u8>>,
    reachable: bool,
}

#[derive(Default)]
struct HubInner {
    peers: RwLock<HashMap<String, Peer>>,
    next_id: AtomicU64,
}

/// Shared hub. Clones refer to the same simulated network.
#[derive(Clone, Default)]
pub struct LoopbackNetwork {
    inner: Arc<HubInner>,
}

impl LoopbackNetwork {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a new endpoint on `host`.
    #[must_use]
    pub fn bind(&self, host: &str) -> NetworkHandle {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let addr = format!("mem://{host}/{id}");
        let (tx, rx) = mpsc::unbounded_channel();

        self.inner.peers.write().insert(
            addr.clone(),
            Peer {
                host: host.to_string(),
                tx,
                reachable: true,
            },
        );
        trace!("[loopback] bound {}", addr);

        NetworkHandle {
            transport: Arc::new(LoopbackEndpoint {
                hub: Arc::clone(&self.inner),
                addr,
                host: host.to_string(),
            }),
            inbound: rx,
        }
    }

    /// Cut an endpoint off from (or reconnect it to) the hub.
    ///
    /// An unreachable endpoint neither sends nor receives.
    pub fn set_reachable(&self, addr: &str, reachable: bool) -> bool {
        match self.inner.peers.write().get_mut(addr) {
            Some(peer) => {
                peer.reachable = reachable;
                true
            }
            None => false,
        }
    }

    /// Endpoints currently attached.
    #[must_use]
    pub fn endpoint_count(&self) -> usize {
        self.inner.peers.read().len()
    }
}

impl std::fmt::Debug for LoopbackNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopbackNetwork")
            .field("endpoints", &self.endpoint_count())
            .finish()
    }
}

/// One process's view of the hub. Detaches on drop.
pub struct LoopbackEndpoint {
    hub: Arc<HubInner>,
    addr: String,
    host: String,
}

impl LoopbackEndpoint {
    fn sender_reachable(&self, peers: &HashMap<String, Peer>) -> bool {
        peers.get(&self.addr).is_some_and(|p| p.reachable)
    }
}

impl NetworkTransport for LoopbackEndpoint {
    fn local_addr(&self) -> &str {
        &self.addr
    }

    fn host(&self) -> &str {
        &self.host
    }

    fn broadcast(&self, scope: Scope, bytes: &[u8]) -> Result<(), NetworkError> {
        if bytes.len() > MAX_DATAGRAM_SIZE {
            return Err(NetworkError::MessageTooLarge {
                size: bytes.len(),
                max: MAX_DATAGRAM_SIZE,
            });
        }
        if scope == Scope::Process {
            return Ok(());
        }

        let peers = self.hub.peers.read();
        if !self.sender_reachable(&peers) {
            return Ok(());
        }
        for (addr, peer) in peers.iter() {
            if *addr == self.addr || !peer.reachable {
                continue;
            }
            if scope == Scope::Host && peer.host != self.host {
                continue;
            }
            // A receiver that already went away is just a lost datagram.
            let _ = peer.tx.send(bytes.to_vec());
        }
        Ok(())
    }

    fn send_to(&self, addr: &str, bytes: &[u8]) -> Result<(), NetworkError> {
        if bytes.len() > MAX_DATAGRAM_SIZE {
            return Err(NetworkError::MessageTooLarge {
                size: bytes.len(),
                max: MAX_DATAGRAM_SIZE,
            });
        }

        let peers = self.hub.peers.read();
        if !self.sender_reachable(&peers) {
            return Err(NetworkError::Unreachable(addr.to_string()));
        }
        match peers.get(addr) {
            Some(peer) if peer.reachable => peer
                .tx
                .send(bytes.to_vec())
                .map_err(|_| NetworkError::Unreachable(addr.to_string())),
            _ => Err(NetworkError::Unreachable(addr.to_string())),
        }
    }
}

impl Drop for LoopbackEndpoint {
    fn drop(&mut self) {
        self.hub.peers.write().remove(&self.addr);
        trace!("[loopback] released {}", self.addr);
    }
}
