use crate::domain::{DiscoveryConfig, DiscoveryStore, PeerInfo, PeerTable};
use crate::ports::{DiscoveryEvent, DiscoveryListener, DiscoverySink, TimeSource};
use parking_lot::RwLock;
use shared_types::{
    DiscoveryMessage, Endpoint, MessagePublisher, NodeUuid, ProcessUuid, Scope, ServicePublisher,
    TransportError,
};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};
use transport_telemetry::metric_inc;
use transport_telemetry::metrics::{DISCOVERY_MESSAGES_SENT, DISCOVERY_SEND_FAILURES};

/// Endpoint variants discovery keeps a store for.
pub trait Tracked: Endpoint {
    fn store(service: &DiscoveryService) -> &DiscoveryStore<Self>;

    fn seen(self, first: bool) -> DiscoveryEvent;

    fn removed(self) -> DiscoveryEvent;
}

impl Tracked for MessagePublisher {
    fn store(service: &DiscoveryService) -> &DiscoveryStore<Self> {
        &service.messages
    }

    fn seen(self, first: bool) -> DiscoveryEvent {
        DiscoveryEvent::MessagePublisherSeen {
            publisher: self,
            first,
        }
    }

    fn removed(self) -> DiscoveryEvent {
        DiscoveryEvent::MessagePublisherRemoved { publisher: self }
    }
}

impl Tracked for ServicePublisher {
    fn store(service: &DiscoveryService) -> &DiscoveryStore<Self> {
        &service.services
    }

    fn seen(self, first: bool) -> DiscoveryEvent {
        DiscoveryEvent::ServicePublisherSeen {
            publisher: self,
            first,
        }
    }

    fn removed(self) -> DiscoveryEvent {
        DiscoveryEvent::ServicePublisherRemoved { publisher: self }
    }
}

#[derive(Default)]
pub(crate) struct Counters {
    pub(crate) advertisements_sent: AtomicU64,
    pub(crate) advertisements_received: AtomicU64,
    pub(crate) expirations: AtomicU64,
    pub(crate) send_failures: AtomicU64,
}

/// Point-in-time discovery statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryStats {
    pub advertisements_sent: u64,
    pub advertisements_received: u64,
    pub expirations: u64,
    pub send_failures: u64,
    pub consecutive_failures: u32,
    pub known_peers: usize,
    pub message_publishers: usize,
    pub service_publishers: usize,
}

/// Process-wide discovery engine.
///
/// All methods take `&self`; stores are sharded per topic and counters are
/// atomic, so the service is shared behind an `Arc` by the node layer, the
/// dispatcher and the sweep task.
///
/// # Example
///
/// ```rust,ignore
/// let discovery = DiscoveryService::new(puuid, host, addr, config, sink, clock);
/// discovery.set_listener(router);
/// discovery.advertise_message(publisher)?;
/// ```
pub struct DiscoveryService {
    pub(crate) puuid: ProcessUuid,
    pub(crate) host: String,
    pub(crate) addr: String,
    pub(crate) config: DiscoveryConfig,
    pub(crate) messages: DiscoveryStore<MessagePublisher>,
    pub(crate) services: DiscoveryStore<ServicePublisher>,
    pub(crate) peers: PeerTable,
    pub(crate) sink: Arc<dyn DiscoverySink>,
    pub(crate) time_source: Arc<dyn TimeSource>,
    pub(crate) listener: RwLock<Option<Arc<dyn DiscoveryListener>>>,
    pub(crate) counters: Counters,
    pub(crate) consecutive_failures: AtomicU32,
}

impl DiscoveryService {
    /// Create a discovery service.
    ///
    /// # Arguments
    ///
    /// * `puuid` - This process
    /// * `host` - Host name used for scope checks
    /// * `addr` - Data address announced in heartbeats
    /// * `sink` - Outlet for discovery broadcasts
    /// * `time_source` - Clock for liveness timestamps
    pub fn new(
        puuid: ProcessUuid,
        host: impl Into<String>,
        addr: impl Into<String>,
        config: DiscoveryConfig,
        sink: Arc<dyn DiscoverySink>,
        time_source: Arc<dyn TimeSource>,
    ) -> Self {
        Self {
            puuid,
            host: host.into(),
            addr: addr.into(),
            config,
            messages: DiscoveryStore::new(),
            services: DiscoveryStore::new(),
            peers: PeerTable::new(),
            sink,
            time_source,
            listener: RwLock::new(None),
            counters: Counters::default(),
            consecutive_failures: AtomicU32::new(0),
        }
    }

    /// Install the receiver of discovery events, replacing any previous one.
    pub fn set_listener(&self, listener: Arc<dyn DiscoveryListener>) {
        *self.listener.write() = Some(listener);
    }

    pub(crate) fn now(&self) -> Instant {
        self.time_source.now()
    }

    pub(crate) fn notify(&self, event: DiscoveryEvent) {
        let listener = self.listener.read().clone();
        if let Some(listener) = listener {
            listener.on_event(event);
        }
    }

    /// Broadcast one message. Failures are logged and counted, never raised.
    pub(crate) fn send(&self, scope: Scope, msg: &DiscoveryMessage) -> bool {
        let kind = message_kind(msg);
        match self.sink.broadcast(scope, msg) {
            Ok(()) => {
                metric_inc!(DISCOVERY_MESSAGES_SENT, &[kind]);
                if matches!(msg, DiscoveryMessage::Advertise(_)) {
                    self.counters.advertisements_sent.fetch_add(1, Ordering::Relaxed);
                }
                true
            }
            Err(e) => {
                warn!(kind, error = %e, "[discovery] broadcast failed");
                self.counters.send_failures.fetch_add(1, Ordering::Relaxed);
                metric_inc!(DISCOVERY_SEND_FAILURES);
                false
            }
        }
    }

    pub(crate) fn advertise_local<P: Tracked>(&self, publisher: P) -> Result<(), TransportError> {
        if publisher.publisher().puuid() != self.puuid {
            return Err(TransportError::MalformedInput(format!(
                "publisher of {} belongs to another process",
                publisher.topic()
            )));
        }

        let scope = publisher.scope();
        let announcement = publisher.discovery();
        let topic = publisher.topic().to_string();
        let nuuid = publisher.publisher().nuuid();
        P::store(self).insert_local(publisher, &self.host, self.now())?;
        debug!(topic = %topic, nuuid = %nuuid, ?scope, "[discovery] advertised");

        if scope != Scope::Process {
            self.send(scope, &announcement);
        }
        Ok(())
    }

    pub(crate) fn unadvertise_local<P: Tracked>(&self, topic: &str, nuuid: NodeUuid) -> Option<P> {
        let entry = P::store(self).remove(topic, self.puuid, nuuid)?;
        let scope = entry.publisher.scope();
        debug!(topic = %topic, nuuid = %nuuid, "[discovery] unadvertised");

        if scope != Scope::Process {
            self.send(
                scope,
                &DiscoveryMessage::Unadvertise {
                    kind: P::KIND,
                    topic: topic.to_string(),
                    puuid: self.puuid,
                    nuuid,
                },
            );
        }
        Some(entry.publisher)
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    #[must_use]
    pub fn puuid(&self) -> ProcessUuid {
        self.puuid
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[must_use]
    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    #[must_use]
    pub fn peer(&self, puuid: ProcessUuid) -> Option<PeerInfo> {
        self.peers.get(puuid)
    }

    #[must_use]
    pub fn known_peers(&self) -> usize {
        self.peers.len()
    }

    #[must_use]
    pub fn stats(&self) -> DiscoveryStats {
        DiscoveryStats {
            advertisements_sent: self.counters.advertisements_sent.load(Ordering::Relaxed),
            advertisements_received: self.counters.advertisements_received.load(Ordering::Relaxed),
            expirations: self.counters.expirations.load(Ordering::Relaxed),
            send_failures: self.counters.send_failures.load(Ordering::Relaxed),
            consecutive_failures: self.consecutive_failures.load(Ordering::Relaxed),
            known_peers: self.peers.len(),
            message_publishers: self.messages.len(),
            service_publishers: self.services.len(),
        }
    }
}

pub(crate) fn message_kind(msg: &DiscoveryMessage) -> &'static str {
    match msg {
        DiscoveryMessage::Advertise(_) => "advertise",
        DiscoveryMessage::Unadvertise { .. } => "unadvertise",
        DiscoveryMessage::Subscribe { .. } => "subscribe",
        DiscoveryMessage::Heartbeat { .. } => "heartbeat",
        DiscoveryMessage::Bye => "bye",
    }
}
