//! # Message Publisher
//!
//! The bus itself and its publish path.
//!
//! A publish goes two ways:
//! - **local**: queued as a frame onto the process dispatcher, so callbacks
//!   run on the dispatcher thread and keep publish order per edge
//! - **remote**: sent point to point to every connected subscriber process
//!   the publisher's scope allows

use crate::connections::ConnectionTable;
use crate::handlers::HandlerTable;
use crate::sequence::SequenceTracker;
use dashmap::DashMap;
use shared_net::NetworkTransport;
use shared_types::{DataMessage, Endpoint, Frame, MessagePublisher, NodeUuid, ProcessUuid};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use transport_telemetry::metric_inc;
use transport_telemetry::metrics::{MESSAGES_PUBLISHED, SEND_FAILURES};

/// Queue feeding the process dispatcher with locally produced frames.
pub type LocalSender = mpsc::UnboundedSender<Frame>;

#[derive(Default)]
pub(crate) struct BusCounters {
    pub(crate) published: AtomicU64,
    pub(crate) delivered_local: AtomicU64,
    pub(crate) delivered_remote: AtomicU64,
    pub(crate) throttle_drops: AtomicU64,
    pub(crate) decode_failures: AtomicU64,
    pub(crate) stale_frames: AtomicU64,
    pub(crate) send_failures: AtomicU64,
}

/// Point-in-time bus statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BusStats {
    pub published: u64,
    pub delivered_local: u64,
    pub delivered_remote: u64,
    /// Payloads skipped by subscriber-side throttles.
    pub throttle_drops: u64,
    pub decode_failures: u64,
    pub stale_frames: u64,
    pub send_failures: u64,
}

/// Process-wide message bus.
///
/// Shared behind an `Arc` by every node of a transport context.
pub struct MessageBus {
    pub(crate) puuid: ProcessUuid,
    pub(crate) transport: Arc<dyn NetworkTransport>,
    pub(crate) local: LocalSender,
    pub(crate) handlers: HandlerTable,
    pub(crate) connections: ConnectionTable,
    /// Next sequence number per (publisher node, topic).
    pub(crate) sequences: DashMap<(NodeUuid, String), u64>,
    pub(crate) tracker: SequenceTracker,
    pub(crate) counters: BusCounters,
}

impl MessageBus {
    /// Create a bus sending through `transport` and queueing local
    /// deliveries onto `local`.
    pub fn new(
        puuid: ProcessUuid,
        transport: Arc<dyn NetworkTransport>,
        local: LocalSender,
    ) -> Self {
        Self {
            puuid,
            transport,
            local,
            handlers: HandlerTable::new(),
            connections: ConnectionTable::new(),
            sequences: DashMap::new(),
            tracker: SequenceTracker::new(),
            counters: BusCounters::default(),
        }
    }

    /// Forward `payload` to every matched subscriber of `publisher`.
    ///
    /// Best-effort: send failures are logged and counted. Returns the number
    /// of destinations reached (the local dispatcher counts as one).
    pub fn publish(&self, publisher: &MessagePublisher, payload: Vec<u8>) -> usize {
        let topic = publisher.topic();
        let nuuid = publisher.publisher().nuuid();

        // The entry guard serializes sequence assignment and enqueueing, so
        // sequence order matches queue order for every edge.
        let mut next = self.sequences.entry((nuuid, topic.to_string())).or_insert(0);
        *next += 1;
        let msg = DataMessage::Publish {
            topic: topic.to_string(),
            msg_type_name: publisher.msg_type_name().to_string(),
            nuuid,
            seq: *next,
            payload,
        };

        let mut reached = 0;
        let remote: Vec<_> = self
            .connections
            .subscribers(topic)
            .into_iter()
            .filter(|s| publisher.scope().permits(false, s.host == self.transport.host()))
            .collect();
        if !remote.is_empty() {
            match Frame::data(self.puuid, self.transport.host(), msg.clone()).encode() {
                Ok(bytes) => {
                    for subscriber in remote {
                        match self.transport.send_to(&subscriber.addr, &bytes) {
                            Ok(()) => reached += 1,
                            Err(e) => {
                                warn!(
                                    topic = %topic,
                                    addr = %subscriber.addr,
                                    error = %e,
                                    "[bus] publish send failed"
                                );
                                self.counters.send_failures.fetch_add(1, Ordering::Relaxed);
                                metric_inc!(SEND_FAILURES);
                            }
                        }
                    }
                }
                Err(e) => warn!(topic = %topic, error = %e, "[bus] publish encode failed"),
            }
        }

        if self.handlers.has_active(topic) {
            if self
                .local
                .send(Frame::data(self.puuid, self.transport.host(), msg))
                .is_ok()
            {
                reached += 1;
            } else {
                debug!(topic = %topic, "[bus] dispatcher stopped, local delivery skipped");
            }
        }
        drop(next);

        self.counters.published.fetch_add(1, Ordering::Relaxed);
        metric_inc!(MESSAGES_PUBLISHED);
        reached
    }

    /// True iff a local handler or an in-scope remote subscriber exists.
    #[must_use]
    pub fn has_connections(&self, publisher: &MessagePublisher) -> bool {
        let topic = publisher.topic();
        self.handlers.has_active(topic)
            || self
                .connections
                .subscribers(topic)
                .iter()
                .any(|s| publisher.scope().permits(false, s.host == self.transport.host()))
    }

    /// Release the sequence counters of a destroyed node.
    ///
    /// Counters survive unadvertise: a node that re-advertises a topic keeps
    /// counting, so remote trackers never see its numbers go backwards.
    pub fn forget_node(&self, nuuid: NodeUuid) {
        self.sequences.retain(|(owner, _), _| *owner != nuuid);
    }

    #[must_use]
    pub fn puuid(&self) -> ProcessUuid {
        self.puuid
    }

    #[must_use]
    pub fn stats(&self) -> BusStats {
        BusStats {
            published: self.counters.published.load(Ordering::Relaxed),
            delivered_local: self.counters.delivered_local.load(Ordering::Relaxed),
            delivered_remote: self.counters.delivered_remote.load(Ordering::Relaxed),
            throttle_drops: self.counters.throttle_drops.load(Ordering::Relaxed),
            decode_failures: self.counters.decode_failures.load(Ordering::Relaxed),
            stale_frames: self.counters.stale_frames.load(Ordering::Relaxed),
            send_failures: self.counters.send_failures.load(Ordering::Relaxed),
        }
    }
}
