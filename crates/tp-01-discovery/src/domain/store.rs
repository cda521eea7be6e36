//! Per-topic publisher store.
//!
//! Each fully qualified name maps to the publishers known for it, keyed by
//! `(puuid, nuuid)`. The outer map is a `DashMap`, so readers and writers
//! on different topics never contend on one lock.

use dashmap::DashMap;
use shared_types::{Endpoint, NodeUuid, ProcessUuid, TransportError};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

type Key = (ProcessUuid, NodeUuid);

/// One known publisher.
#[derive(Debug, Clone)]
pub struct StoreEntry<P> {
    pub publisher: P,
    /// Host of the advertising process.
    pub host: String,
    /// Last advertisement or heartbeat from the owning process.
    pub last_seen: Instant,
    /// Advertised by this process.
    pub local: bool,
}

/// Publishers of one endpoint kind, grouped by topic.
pub struct DiscoveryStore<P: Endpoint> {
    topics: DashMap<String, BTreeMap<Key, StoreEntry<P>>>,
}

impl<P: Endpoint> Default for DiscoveryStore<P> {
    fn default() -> Self {
        Self {
            topics: DashMap::new(),
        }
    }
}

impl<P: Endpoint> DiscoveryStore<P> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a local publisher. Fails if `(topic, puuid, nuuid)` exists.
    pub fn insert_local(
        &self,
        publisher: P,
        host: &str,
        now: Instant,
    ) -> Result<(), TransportError> {
        let key = publisher.key();
        let mut record = self.topics.entry(publisher.topic().to_string()).or_default();
        if record.contains_key(&key) {
            return Err(TransportError::DuplicateRegistration {
                topic: publisher.topic().to_string(),
                puuid: key.0,
                nuuid: key.1,
            });
        }
        record.insert(
            key,
            StoreEntry {
                publisher,
                host: host.to_string(),
                last_seen: now,
                local: true,
            },
        );
        Ok(())
    }

    /// Insert or refresh a remote publisher. Returns true if it was new.
    pub fn upsert_remote(&self, publisher: P, host: &str, now: Instant) -> bool {
        let key = publisher.key();
        let mut record = self.topics.entry(publisher.topic().to_string()).or_default();
        match record.get_mut(&key) {
            Some(entry) => {
                entry.publisher = publisher;
                entry.host = host.to_string();
                entry.last_seen = now;
                false
            }
            None => {
                record.insert(
                    key,
                    StoreEntry {
                        publisher,
                        host: host.to_string(),
                        last_seen: now,
                        local: false,
                    },
                );
                true
            }
        }
    }

    /// Remove one publisher.
    pub fn remove(
        &self,
        topic: &str,
        puuid: ProcessUuid,
        nuuid: NodeUuid,
    ) -> Option<StoreEntry<P>> {
        let removed = self
            .topics
            .get_mut(topic)
            .and_then(|mut record| record.remove(&(puuid, nuuid)));
        self.topics.remove_if(topic, |_, record| record.is_empty());
        removed
    }

    fn remove_where(&self, pred: impl Fn(&StoreEntry<P>) -> bool) -> Vec<StoreEntry<P>> {
        let mut removed = Vec::new();
        self.topics.retain(|_, record| {
            record.retain(|_, entry| {
                if pred(entry) {
                    removed.push(entry.clone());
                    false
                } else {
                    true
                }
            });
            !record.is_empty()
        });
        removed
    }

    /// Drop every remote record owned by `puuid`.
    pub fn remove_process(&self, puuid: ProcessUuid) -> Vec<StoreEntry<P>> {
        self.remove_where(|e| !e.local && e.publisher.key().0 == puuid)
    }

    /// Drop remote records silent for longer than `timeout`.
    pub fn expire(&self, now: Instant, timeout: Duration) -> Vec<StoreEntry<P>> {
        self.remove_where(|e| !e.local && now.saturating_duration_since(e.last_seen) > timeout)
    }

    /// Drop every local record.
    pub fn clear_local(&self) -> Vec<StoreEntry<P>> {
        self.remove_where(|e| e.local)
    }

    /// Refresh the liveness of every record owned by `puuid`.
    pub fn touch_process(&self, puuid: ProcessUuid, now: Instant) -> usize {
        let mut touched = 0;
        for mut record in self.topics.iter_mut() {
            for ((owner, _), entry) in record.iter_mut() {
                if *owner == puuid {
                    entry.last_seen = now;
                    touched += 1;
                }
            }
        }
        touched
    }

    /// Publishers known for `topic`, local and remote.
    #[must_use]
    pub fn publishers(&self, topic: &str) -> Vec<P> {
        self.topics
            .get(topic)
            .map(|record| record.values().map(|e| e.publisher.clone()).collect())
            .unwrap_or_default()
    }

    /// Full entries for `topic`.
    #[must_use]
    pub fn entries(&self, topic: &str) -> Vec<StoreEntry<P>> {
        self.topics
            .get(topic)
            .map(|record| record.values().cloned().collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn get(&self, topic: &str, puuid: ProcessUuid, nuuid: NodeUuid) -> Option<P> {
        self.topics
            .get(topic)
            .and_then(|record| record.get(&(puuid, nuuid)).map(|e| e.publisher.clone()))
    }

    #[must_use]
    pub fn contains(&self, topic: &str, puuid: ProcessUuid, nuuid: NodeUuid) -> bool {
        self.topics
            .get(topic)
            .is_some_and(|record| record.contains_key(&(puuid, nuuid)))
    }

    /// Topics with at least one publisher, sorted.
    #[must_use]
    pub fn topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.topics.iter().map(|r| r.key().clone()).collect();
        topics.sort();
        topics
    }

    /// Every local publisher.
    #[must_use]
    pub fn local_publishers(&self) -> Vec<P> {
        self.topics
            .iter()
            .flat_map(|record| {
                record
                    .values()
                    .filter(|e| e.local)
                    .map(|e| e.publisher.clone())
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// Local publishers for one topic.
    #[must_use]
    pub fn local_in_topic(&self, topic: &str) -> Vec<P> {
        self.topics
            .get(topic)
            .map(|record| {
                record
                    .values()
                    .filter(|e| e.local)
                    .map(|e| e.publisher.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of remote records.
    #[must_use]
    pub fn remote_count(&self) -> usize {
        self.topics
            .iter()
            .map(|record| record.values().filter(|e| !e.local).count())
            .sum()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.topics.iter().map(|record| record.len()).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }
}
