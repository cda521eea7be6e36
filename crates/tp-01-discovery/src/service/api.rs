use crate::ports::DiscoveryApi;
use crate::service::{DiscoveryService, DiscoveryStats};
use shared_types::{
    DiscoveryMessage, EndpointKind, MessagePublisher, NodeUuid, Scope, ServicePublisher,
    TransportError,
};

impl DiscoveryApi for DiscoveryService {
    fn advertise_message(&self, publisher: MessagePublisher) -> Result<(), TransportError> {
        self.advertise_local(publisher)
    }

    fn advertise_service(&self, publisher: ServicePublisher) -> Result<(), TransportError> {
        self.advertise_local(publisher)
    }

    fn unadvertise_message(&self, topic: &str, nuuid: NodeUuid) -> Option<MessagePublisher> {
        self.unadvertise_local(topic, nuuid)
    }

    fn unadvertise_service(&self, service: &str, nuuid: NodeUuid) -> Option<ServicePublisher> {
        self.unadvertise_local(service, nuuid)
    }

    fn announce_subscription(&self, kind: EndpointKind, topic: &str) {
        self.send(
            Scope::All,
            &DiscoveryMessage::Subscribe {
                kind,
                topic: topic.to_string(),
            },
        );
    }

    fn message_topics(&self) -> Vec<String> {
        self.messages.topics()
    }

    fn message_publishers(&self, topic: &str) -> Vec<MessagePublisher> {
        self.messages.publishers(topic)
    }

    fn service_topics(&self) -> Vec<String> {
        self.services.topics()
    }

    fn service_publishers(&self, service: &str) -> Vec<ServicePublisher> {
        self.services.publishers(service)
    }

    fn stats(&self) -> DiscoveryStats {
        DiscoveryService::stats(self)
    }
}
