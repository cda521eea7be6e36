//! # Event Routing
//!
//! Turns discovery events into bus actions.
//!
//! ```text
//! DISCOVERY
//!     │
//!     ├──MessagePublisherSeen─────▶ MessageBus::connect
//!     ├──MessagePublisherRemoved──▶ MessageBus::on_publisher_removed
//!     ├──ServicePublisher*────────▶ (nothing: responders are picked per request)
//!     └──ProcessLost──────────────▶ MessageBus::on_process_lost
//!                                   ServiceBus::on_process_lost
//! ```
//!
//! Discovery holds the router; the router holds the buses. The buses never
//! hold discovery, so there is no reference cycle.

use shared_bus::MessageBus;
use shared_types::Endpoint;
use std::sync::Arc;
use tp_01_discovery::{DiscoveryEvent, DiscoveryListener};
use tp_02_service_bus::ServiceBus;
use tracing::{debug, trace};

/// Discovery listener forwarding to both buses.
pub struct EventRouter {
    messages: Arc<MessageBus>,
    services: Arc<ServiceBus>,
}

impl EventRouter {
    pub fn new(messages: Arc<MessageBus>, services: Arc<ServiceBus>) -> Self {
        Self { messages, services }
    }
}

impl DiscoveryListener for EventRouter {
    fn on_event(&self, event: DiscoveryEvent) {
        match event {
            DiscoveryEvent::MessagePublisherSeen { publisher, first } => {
                if self.messages.connect(&publisher) && first {
                    debug!(topic = %publisher.topic(), "[router] connected to new publisher");
                }
            }
            DiscoveryEvent::MessagePublisherRemoved { publisher } => {
                self.messages.on_publisher_removed(&publisher);
            }
            DiscoveryEvent::ServicePublisherSeen { publisher, first } => {
                trace!(service = %publisher.topic(), first, "[router] responder seen");
            }
            DiscoveryEvent::ServicePublisherRemoved { publisher } => {
                trace!(service = %publisher.topic(), "[router] responder removed");
            }
            DiscoveryEvent::ProcessLost { puuid } => {
                self.messages.on_process_lost(puuid);
                let cancelled = self.services.on_process_lost(puuid);
                debug!(puuid = %puuid, cancelled, "[router] process lost");
            }
        }
    }
}
