//! # Message Subscriber
//!
//! The receiving side of the bus: handler registration, connection
//! management towards remote publishers, and inbound payload delivery.

use crate::handlers::{MessageInfo, RawHandler, SubscriptionId};
use crate::publisher::MessageBus;
use shared_types::{
    DataMessage, Endpoint, Frame, MessagePublisher, NodeUuid, ProcessUuid, SubscribeOptions,
    TransportError,
};
use std::sync::atomic::Ordering;
use tracing::{debug, trace, warn};
use transport_telemetry::metric_inc;
use transport_telemetry::metrics::{
    DECODE_FAILURES, MESSAGES_DELIVERED, SEND_FAILURES, STALE_FRAMES, THROTTLE_DROPS,
};

impl MessageBus {
    /// Register a handler for `topic` owned by `nuuid`.
    ///
    /// Returns the handler id and whether it is the first handler on the
    /// topic in this process.
    pub fn subscribe(
        &self,
        topic: &str,
        nuuid: NodeUuid,
        handler: RawHandler,
        options: &SubscribeOptions,
    ) -> (SubscriptionId, bool) {
        let (id, first) = self.handlers.insert(topic, nuuid, handler, options);
        debug!(topic = %topic, nuuid = %nuuid, first, "[bus] subscribed");
        (id, first)
    }

    /// Remove every handler `nuuid` registered on `topic`.
    ///
    /// Returns false if there were none. When this was the process's last
    /// handler on the topic, connected publishers receive `Disconnect`.
    /// No invocation of a removed handler starts after this returns.
    pub fn unsubscribe(&self, topic: &str, nuuid: NodeUuid) -> bool {
        let (removed, emptied) = self.handlers.remove_node_topic(topic, nuuid);
        if emptied {
            self.disconnect_upstream(topic);
        }
        removed > 0
    }

    /// Remove one handler by id.
    pub fn unsubscribe_id(&self, topic: &str, id: SubscriptionId) -> bool {
        let (removed, emptied) = self.handlers.remove_id(topic, id);
        if emptied {
            self.disconnect_upstream(topic);
        }
        removed > 0
    }

    /// Remove every handler of a node that is going away.
    pub fn remove_node(&self, nuuid: NodeUuid) {
        for topic in self.handlers.remove_node(nuuid) {
            self.disconnect_upstream(&topic);
        }
        self.forget_node(nuuid);
    }

    /// Topics `nuuid` subscribes to (fully qualified).
    #[must_use]
    pub fn subscribed_topics(&self, nuuid: NodeUuid) -> Vec<String> {
        self.handlers.topics_for_node(nuuid)
    }

    /// True if any local handler listens on `topic`.
    #[must_use]
    pub fn has_subscribers(&self, topic: &str) -> bool {
        self.handlers.has_active(topic)
    }

    // =========================================================================
    // CONNECTIONS
    // =========================================================================

    fn send_data(&self, addr: &str, msg: DataMessage) -> Result<(), TransportError> {
        let bytes = Frame::data(self.puuid, self.transport.host(), msg)
            .encode()
            .map_err(|e| TransportError::MalformedInput(e.to_string()))?;
        self.transport.send_to(addr, &bytes)?;
        Ok(())
    }

    /// Ask a remote publisher to send us its payloads.
    ///
    /// Does nothing for local publishers or topics without local handlers.
    /// Safe to repeat: publishers treat a repeated `Connect` as a refresh.
    pub fn connect(&self, publisher: &MessagePublisher) -> bool {
        let topic = publisher.topic();
        let owner = publisher.publisher().puuid();
        if owner == self.puuid || !self.handlers.has_active(topic) {
            return false;
        }

        let msg = DataMessage::Connect {
            topic: topic.to_string(),
            subscriber_addr: self.transport.local_addr().to_string(),
        };
        match self.send_data(publisher.ctrl(), msg) {
            Ok(()) => {
                if self.connections.add_upstream(topic, owner, publisher.ctrl()) {
                    debug!(topic = %topic, publisher = %owner, "[bus] connected to publisher");
                }
                true
            }
            Err(e) => {
                warn!(topic = %topic, ctrl = %publisher.ctrl(), error = %e, "[bus] connect failed");
                self.counters.send_failures.fetch_add(1, Ordering::Relaxed);
                metric_inc!(SEND_FAILURES);
                false
            }
        }
    }

    fn disconnect_upstream(&self, topic: &str) {
        for (owner, ctrl) in self.connections.take_upstream(topic) {
            let msg = DataMessage::Disconnect {
                topic: topic.to_string(),
            };
            if let Err(e) = self.send_data(&ctrl, msg) {
                debug!(
                    topic = %topic,
                    publisher = %owner,
                    error = %e,
                    "[bus] disconnect not delivered"
                );
            }
        }
    }

    /// A remote publisher was withdrawn or expired.
    pub fn on_publisher_removed(&self, publisher: &MessagePublisher) {
        let topic = publisher.topic();
        self.connections
            .remove_upstream(topic, publisher.publisher().puuid());
        self.tracker.forget(publisher.publisher().nuuid(), topic);
    }

    /// A remote process is gone: drop its connections and sequence history.
    pub fn on_process_lost(&self, puuid: ProcessUuid) {
        self.connections.remove_process(puuid);
        self.tracker.forget_process(puuid);
    }

    // =========================================================================
    // INBOUND
    // =========================================================================

    /// A remote subscriber process wants our payloads for `topic`.
    pub fn on_connect(&self, sender: ProcessUuid, host: &str, topic: &str, subscriber_addr: &str) {
        if self
            .connections
            .add_subscriber(topic, sender, subscriber_addr, host)
        {
            debug!(topic = %topic, subscriber = %sender, "[bus] remote subscriber connected");
        }
    }

    pub fn on_disconnect(&self, sender: ProcessUuid, topic: &str) {
        if self.connections.remove_subscriber(topic, sender) {
            debug!(topic = %topic, subscriber = %sender, "[bus] remote subscriber disconnected");
        }
    }

    /// Deliver one published payload to the local handlers of `topic`.
    ///
    /// Remote payloads pass the sequence check first. Returns the number of
    /// handlers invoked successfully.
    pub fn on_publish(
        &self,
        sender: ProcessUuid,
        topic: &str,
        msg_type_name: &str,
        nuuid: NodeUuid,
        seq: u64,
        payload: &[u8],
    ) -> usize {
        let intra_process = sender == self.puuid;
        if !intra_process {
            if let Err(e) = self.tracker.check_and_record(sender, nuuid, topic, seq) {
                trace!(topic = %topic, error = %e, "[bus] dropping stale frame");
                self.counters.stale_frames.fetch_add(1, Ordering::Relaxed);
                metric_inc!(STALE_FRAMES);
                return 0;
            }
        }

        let info = MessageInfo::new(topic, msg_type_name, nuuid, intra_process);
        let outcome = self.handlers.dispatch(topic, payload, &info);

        if outcome.delivered > 0 {
            let (counter, path) = if intra_process {
                (&self.counters.delivered_local, "local")
            } else {
                (&self.counters.delivered_remote, "remote")
            };
            counter.fetch_add(outcome.delivered as u64, Ordering::Relaxed);
            MESSAGES_DELIVERED
                .with_label_values(&[path])
                .inc_by(outcome.delivered as f64);
        }
        if outcome.throttled > 0 {
            self.counters
                .throttle_drops
                .fetch_add(outcome.throttled as u64, Ordering::Relaxed);
            THROTTLE_DROPS
                .with_label_values(&["subscriber"])
                .inc_by(outcome.throttled as f64);
        }
        for failure in &outcome.failures {
            warn!(topic = %topic, error = %failure, "[bus] payload dropped");
            self.counters.decode_failures.fetch_add(1, Ordering::Relaxed);
            metric_inc!(DECODE_FAILURES);
        }
        outcome.delivered
    }
}
