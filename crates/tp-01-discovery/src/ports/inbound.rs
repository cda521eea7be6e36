//! # Driving Port (Inbound API)
//!
//! Operations the node layer invokes on discovery.

use shared_types::{
    EndpointKind, MessagePublisher, NodeUuid, ServicePublisher, TransportError,
};

use crate::service::DiscoveryStats;

/// Primary discovery API.
pub trait DiscoveryApi: Send + Sync {
    /// Register a local topic publisher and broadcast it within its scope.
    ///
    /// # Errors
    ///
    /// `DuplicateRegistration` if `(topic, puuid, nuuid)` is already known.
    fn advertise_message(&self, publisher: MessagePublisher) -> Result<(), TransportError>;

    /// Register a local service responder and broadcast it within its scope.
    fn advertise_service(&self, publisher: ServicePublisher) -> Result<(), TransportError>;

    /// Withdraw a local topic publisher. Returns it if it existed.
    fn unadvertise_message(&self, topic: &str, nuuid: NodeUuid) -> Option<MessagePublisher>;

    /// Withdraw a local service responder. Returns it if it existed.
    fn unadvertise_service(&self, service: &str, nuuid: NodeUuid) -> Option<ServicePublisher>;

    /// Ask peers to re-advertise publishers of `topic`.
    fn announce_subscription(&self, kind: EndpointKind, topic: &str);

    /// Fully qualified topics with at least one known publisher.
    fn message_topics(&self) -> Vec<String>;

    /// Known publishers of `topic`, local and remote.
    fn message_publishers(&self, topic: &str) -> Vec<MessagePublisher>;

    fn service_topics(&self) -> Vec<String>;

    fn service_publishers(&self, service: &str) -> Vec<ServicePublisher>;

    fn stats(&self) -> DiscoveryStats;
}
