//! Connection table.
//!
//! Two directions per topic:
//! - **downstream**: remote subscriber processes that sent us `Connect`;
//!   the publish path sends to these
//! - **upstream**: remote publisher processes we sent `Connect` to; they
//!   get `Disconnect` after our last local unsubscribe

use dashmap::DashMap;
use shared_types::ProcessUuid;
use std::collections::BTreeMap;

type Links<V> = DashMap<String, BTreeMap<ProcessUuid, V>>;

/// A remote subscriber process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSubscriber {
    pub addr: String,
    pub host: String,
}

#[derive(Default)]
pub struct ConnectionTable {
    downstream: Links<RemoteSubscriber>,
    upstream: Links<String>,
}

fn insert<V>(map: &Links<V>, topic: &str, puuid: ProcessUuid, value: V) -> bool {
    map.entry(topic.to_string())
        .or_default()
        .insert(puuid, value)
        .is_none()
}

fn remove<V>(map: &Links<V>, topic: &str, puuid: ProcessUuid) -> bool {
    let removed = map
        .get_mut(topic)
        .is_some_and(|mut peers| peers.remove(&puuid).is_some());
    map.remove_if(topic, |_, peers| peers.is_empty());
    removed
}

impl ConnectionTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a remote subscriber. Returns true if it is new.
    pub fn add_subscriber(&self, topic: &str, puuid: ProcessUuid, addr: &str, host: &str) -> bool {
        insert(
            &self.downstream,
            topic,
            puuid,
            RemoteSubscriber {
                addr: addr.to_string(),
                host: host.to_string(),
            },
        )
    }

    pub fn remove_subscriber(&self, topic: &str, puuid: ProcessUuid) -> bool {
        remove(&self.downstream, topic, puuid)
    }

    /// Remote subscribers of `topic`.
    #[must_use]
    pub fn subscribers(&self, topic: &str) -> Vec<RemoteSubscriber> {
        self.downstream
            .get(topic)
            .map(|peers| peers.values().cloned().collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn has_subscribers(&self, topic: &str) -> bool {
        self.downstream.get(topic).is_some_and(|peers| !peers.is_empty())
    }

    /// Record a publisher we connected to.
    pub fn add_upstream(&self, topic: &str, puuid: ProcessUuid, ctrl: &str) -> bool {
        insert(&self.upstream, topic, puuid, ctrl.to_string())
    }

    pub fn remove_upstream(&self, topic: &str, puuid: ProcessUuid) -> bool {
        remove(&self.upstream, topic, puuid)
    }

    /// Forget and return every publisher we connected to for `topic`.
    pub fn take_upstream(&self, topic: &str) -> Vec<(ProcessUuid, String)> {
        self.upstream
            .remove(topic)
            .map(|(_, peers)| peers.into_iter().collect())
            .unwrap_or_default()
    }

    /// Drop every connection involving `puuid`.
    pub fn remove_process(&self, puuid: ProcessUuid) {
        self.downstream.retain(|_, peers| {
            peers.remove(&puuid);
            !peers.is_empty()
        });
        self.upstream.retain(|_, peers| {
            peers.remove(&puuid);
            !peers.is_empty()
        });
    }
}
