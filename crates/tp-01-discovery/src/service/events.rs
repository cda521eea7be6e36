use super::core::{message_kind, Tracked};
use crate::domain::is_visible;
use crate::service::DiscoveryService;
use shared_types::{
    DiscoveryMessage, Endpoint, EndpointKind, MessagePublisher, NodeUuid, ProcessUuid,
    PublisherRecord,
    ServicePublisher,
};
use std::sync::atomic::Ordering;
use tracing::{debug, info, trace};
use transport_telemetry::metric_inc;
use transport_telemetry::metrics::{DISCOVERY_KNOWN_PUBLISHERS, DISCOVERY_MESSAGES_RECEIVED};

use crate::ports::DiscoveryEvent;

impl DiscoveryService {
    /// Apply one discovery message received from `sender` on `host`.
    ///
    /// Messages from this process are ignored.
    pub fn handle(&self, sender: ProcessUuid, host: &str, msg: DiscoveryMessage) {
        if sender == self.puuid {
            return;
        }
        metric_inc!(DISCOVERY_MESSAGES_RECEIVED, &[message_kind(&msg)]);

        match msg {
            DiscoveryMessage::Advertise(PublisherRecord::Message(publisher)) => {
                self.on_remote_advertisement(sender, host, publisher);
            }
            DiscoveryMessage::Advertise(PublisherRecord::Service(publisher)) => {
                self.on_remote_advertisement(sender, host, publisher);
            }
            DiscoveryMessage::Unadvertise {
                kind,
                topic,
                puuid,
                nuuid,
            } => {
                if puuid != sender {
                    trace!(topic = %topic, "[discovery] ignoring relayed unadvertise");
                    return;
                }
                match kind {
                    EndpointKind::Message => {
                        self.on_remote_unadvertisement::<MessagePublisher>(&topic, puuid, nuuid);
                    }
                    EndpointKind::Service => {
                        self.on_remote_unadvertisement::<ServicePublisher>(&topic, puuid, nuuid);
                    }
                }
            }
            DiscoveryMessage::Subscribe { kind, topic } => {
                self.on_subscribe_query(host, kind, &topic);
            }
            DiscoveryMessage::Heartbeat { addr } => self.on_heartbeat(sender, host, &addr),
            DiscoveryMessage::Bye => {
                info!(puuid = %sender, "[discovery] peer said bye");
                self.drop_process(sender);
            }
        }
    }

    /// Upsert a remote publisher copy and notify the listener.
    ///
    /// Returns false if the advertisement was rejected by the scope rule or
    /// did not come from the publisher's own process.
    pub fn on_remote_advertisement<P: Tracked>(
        &self,
        sender: ProcessUuid,
        host: &str,
        publisher: P,
    ) -> bool {
        if publisher.publisher().puuid() != sender || sender == self.puuid {
            trace!(topic = %publisher.topic(), "[discovery] ignoring relayed advertisement");
            return false;
        }
        if !is_visible(publisher.scope(), false, host == self.host) {
            trace!(topic = %publisher.topic(), "[discovery] advertisement out of scope");
            return false;
        }

        let now = self.now();
        self.peers.touch(sender, publisher.publisher().addr(), host, now);
        let first = P::store(self).upsert_remote(publisher.clone(), host, now);
        self.counters
            .advertisements_received
            .fetch_add(1, Ordering::Relaxed);

        if first {
            DISCOVERY_KNOWN_PUBLISHERS.inc();
            debug!(
                topic = %publisher.topic(),
                puuid = %sender,
                host = %host,
                "[discovery] new remote publisher"
            );
        }
        self.notify(publisher.seen(first));
        true
    }

    /// Remove a remote publisher copy immediately.
    pub fn on_remote_unadvertisement<P: Tracked>(
        &self,
        topic: &str,
        puuid: ProcessUuid,
        nuuid: NodeUuid,
    ) -> bool {
        if puuid == self.puuid {
            return false;
        }
        match P::store(self).remove(topic, puuid, nuuid) {
            Some(entry) => {
                DISCOVERY_KNOWN_PUBLISHERS.dec();
                debug!(topic = %topic, puuid = %puuid, "[discovery] remote publisher withdrawn");
                self.notify(entry.publisher.removed());
                true
            }
            None => false,
        }
    }

    /// Re-advertise local publishers of `topic` that the querying host may see.
    pub fn on_subscribe_query(&self, host: &str, kind: EndpointKind, topic: &str) -> usize {
        let same_host = host == self.host;
        let announcements: Vec<_> = match kind {
            EndpointKind::Message => self
                .messages
                .local_in_topic(topic)
                .into_iter()
                .filter(|p| is_visible(p.scope(), false, same_host))
                .map(|p| (p.scope(), p.discovery()))
                .collect(),
            EndpointKind::Service => self
                .services
                .local_in_topic(topic)
                .into_iter()
                .filter(|p| is_visible(p.scope(), false, same_host))
                .map(|p| (p.scope(), p.discovery()))
                .collect(),
        };

        announcements
            .iter()
            .filter(|(scope, msg)| self.send(*scope, msg))
            .count()
    }

    /// Refresh a peer and every record it owns.
    pub fn on_heartbeat(&self, sender: ProcessUuid, host: &str, addr: &str) {
        let now = self.now();
        if self.peers.touch(sender, addr, host, now) {
            debug!(puuid = %sender, addr = %addr, "[discovery] new peer");
        }
        self.messages.touch_process(sender, now);
        self.services.touch_process(sender, now);
    }

    /// Forget a remote process and everything it advertised.
    ///
    /// Returns the number of publisher records removed.
    pub(crate) fn drop_process(&self, puuid: ProcessUuid) -> usize {
        self.peers.remove(puuid);

        let messages = self.messages.remove_process(puuid);
        let services = self.services.remove_process(puuid);
        let removed = messages.len() + services.len();
        DISCOVERY_KNOWN_PUBLISHERS.sub(removed as f64);

        for entry in messages {
            self.notify(entry.publisher.removed());
        }
        for entry in services {
            self.notify(entry.publisher.removed());
        }
        self.notify(DiscoveryEvent::ProcessLost { puuid });
        removed
    }
}
