//! Known remote processes and their liveness.

use dashmap::DashMap;
use shared_types::ProcessUuid;
use std::time::{Duration, Instant};

/// A remote process seen on the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerInfo {
    /// Data address of the process.
    pub addr: String,
    pub host: String,
    pub last_seen: Instant,
}

#[derive(Default)]
pub struct PeerTable {
    peers: DashMap<ProcessUuid, PeerInfo>,
}

impl PeerTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record traffic from `puuid`. Returns true for a new peer.
    pub fn touch(&self, puuid: ProcessUuid, addr: &str, host: &str, now: Instant) -> bool {
        match self.peers.get_mut(&puuid) {
            Some(mut peer) => {
                peer.last_seen = now;
                if peer.addr != addr {
                    peer.addr = addr.to_string();
                }
                false
            }
            None => {
                self.peers.insert(
                    puuid,
                    PeerInfo {
                        addr: addr.to_string(),
                        host: host.to_string(),
                        last_seen: now,
                    },
                );
                true
            }
        }
    }

    pub fn remove(&self, puuid: ProcessUuid) -> Option<PeerInfo> {
        self.peers.remove(&puuid).map(|(_, peer)| peer)
    }

    /// Remove and return peers silent for longer than `timeout`.
    pub fn take_silent(&self, now: Instant, timeout: Duration) -> Vec<ProcessUuid> {
        let mut silent = Vec::new();
        self.peers.retain(|puuid, peer| {
            let alive = now.saturating_duration_since(peer.last_seen) <= timeout;
            if !alive {
                silent.push(*puuid);
            }
            alive
        });
        silent
    }

    #[must_use]
    pub fn get(&self, puuid: ProcessUuid) -> Option<PeerInfo> {
        self.peers.get(&puuid).map(|p| p.clone())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}
