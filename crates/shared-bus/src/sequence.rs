//! # Sequence Tracker
//!
//! Drops stale and duplicate remote payloads.
//!
//! Every `Publish` frame carries a per-(publisher node, topic) sequence
//! number that only grows. A frame whose number is not above the last one
//! accepted for its key was reordered or duplicated by the network and is
//! discarded, which keeps per-edge delivery in publish order.

use dashmap::DashMap;
use shared_types::{NodeUuid, ProcessUuid};
use thiserror::Error;

/// Errors from sequence checks.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SequenceError {
    /// The frame is older than (or equal to) the last accepted one.
    #[error("Stale frame: received {received}, last accepted {last}")]
    Stale { received: u64, last: u64 },
}

/// Last accepted sequence per (publisher node, topic).
#[derive(Default)]
pub struct SequenceTracker {
    /// (nuuid, topic) -> (owning process, last accepted seq)
    last: DashMap<(NodeUuid, String), (ProcessUuid, u64)>,
}

impl SequenceTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `seq` if it advances the key, and record it.
    ///
    /// # Errors
    ///
    /// - `SequenceError::Stale` - `seq` is not above the last accepted value
    pub fn check_and_record(
        &self,
        puuid: ProcessUuid,
        nuuid: NodeUuid,
        topic: &str,
        seq: u64,
    ) -> Result<(), SequenceError> {
        let mut entry = self
            .last
            .entry((nuuid, topic.to_string()))
            .or_insert((puuid, 0));
        let (_, last) = *entry;
        if seq <= last {
            return Err(SequenceError::Stale {
                received: seq,
                last,
            });
        }
        *entry = (puuid, seq);
        Ok(())
    }

    /// Forget one publisher's history.
    pub fn forget(&self, nuuid: NodeUuid, topic: &str) {
        self.last.remove(&(nuuid, topic.to_string()));
    }

    /// Forget every publisher of a lost process.
    pub fn forget_process(&self, puuid: ProcessUuid) {
        self.last.retain(|_, (owner, _)| *owner != puuid);
    }

    /// Tracked keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.last.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.last.is_empty()
    }
}
