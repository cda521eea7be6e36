//! # Driven Ports (Outbound SPI)
//!
//! Interfaces the host application implements for the discovery service.

use shared_types::{
    DiscoveryMessage, MessagePublisher, ProcessUuid, Scope, ServicePublisher, TransportError,
};
use std::time::Instant;

/// Outlet for discovery traffic.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; the sweep task and caller threads
/// broadcast concurrently.
pub trait DiscoverySink: Send + Sync {
    /// Send `msg` to every peer `scope` allows.
    fn broadcast(&self, scope: Scope, msg: &DiscoveryMessage) -> Result<(), TransportError>;
}

/// Monotonic clock.
///
/// Enables deterministic expiry tests with a controllable clock.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> Instant;
}

/// Changes the buses react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryEvent {
    /// A remote topic publisher was advertised or refreshed.
    MessagePublisherSeen {
        publisher: MessagePublisher,
        first: bool,
    },
    /// A remote topic publisher was withdrawn or expired.
    MessagePublisherRemoved { publisher: MessagePublisher },
    /// A remote service responder was advertised or refreshed.
    ServicePublisherSeen {
        publisher: ServicePublisher,
        first: bool,
    },
    /// A remote service responder was withdrawn or expired.
    ServicePublisherRemoved { publisher: ServicePublisher },
    /// A remote process said goodbye or fell silent.
    ProcessLost { puuid: ProcessUuid },
}

/// Receives discovery events.
///
/// Called from the dispatcher and sweep tasks; must not block.
pub trait DiscoveryListener: Send + Sync {
    fn on_event(&self, event: DiscoveryEvent);
}
