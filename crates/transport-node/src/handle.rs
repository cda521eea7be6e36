//! # Publisher Handle
//!
//! What `advertise` returns. Clones share state, so unadvertising through
//! the node invalidates every copy.
//!
//! ```text
//! Unregistered ──advertise──▶ Advertised ──unadvertise──▶ Unadvertised
//!                                  └──────node dropped──▶ NodeDestroyed
//! ```

use shared_bus::MessageBus;
use shared_types::{Endpoint, Message, MessagePublisher, Throttle};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};
use transport_telemetry::metric_inc;
use transport_telemetry::metrics::THROTTLE_DROPS;

/// Lifecycle of a publisher handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PublisherState {
    /// Never registered: advertise failed.
    Unregistered = 0,
    Advertised = 1,
    Unadvertised = 2,
    NodeDestroyed = 3,
}

impl PublisherState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => PublisherState::Advertised,
            2 => PublisherState::Unadvertised,
            3 => PublisherState::NodeDestroyed,
            _ => PublisherState::Unregistered,
        }
    }
}

struct HandleInner {
    metadata: MessagePublisher,
    bus: Arc<MessageBus>,
    state: AtomicU8,
    throttle: Option<Throttle>,
}

/// Handle to one advertised topic.
#[derive(Clone, Default)]
pub struct PublisherHandle {
    inner: Option<Arc<HandleInner>>,
}

impl PublisherHandle {
    pub(crate) fn advertised(metadata: MessagePublisher, bus: Arc<MessageBus>) -> Self {
        let throttle = Throttle::from_rate(metadata.options().msgs_per_sec());
        Self {
            inner: Some(Arc::new(HandleInner {
                metadata,
                bus,
                state: AtomicU8::new(PublisherState::Advertised as u8),
                throttle,
            })),
        }
    }

    /// A handle that never registered.
    #[must_use]
    pub fn invalid() -> Self {
        Self::default()
    }

    pub(crate) fn set_state(&self, state: PublisherState) {
        if let Some(inner) = &self.inner {
            inner.state.store(state as u8, Ordering::Release);
        }
    }

    #[must_use]
    pub fn state(&self) -> PublisherState {
        self.inner.as_ref().map_or(PublisherState::Unregistered, |inner| {
            PublisherState::from_u8(inner.state.load(Ordering::Acquire))
        })
    }

    /// True only while advertised.
    #[must_use]
    pub fn valid(&self) -> bool {
        self.state() == PublisherState::Advertised
    }

    fn live(&self) -> Option<&HandleInner> {
        self.inner.as_deref().filter(|_| self.valid())
    }

    /// Publish a typed message.
    ///
    /// Returns false for an invalid handle, a message type other than the
    /// advertised one, or an encode failure. A payload dropped by the
    /// throttle still returns true.
    pub fn publish<M: Message>(&self, msg: &M) -> bool {
        let Some(inner) = self.live() else {
            return false;
        };
        if inner.metadata.msg_type_name() != M::TYPE_NAME {
            warn!(
                topic = %inner.metadata.topic(),
                advertised = %inner.metadata.msg_type_name(),
                actual = M::TYPE_NAME,
                "[publisher] type mismatch"
            );
            return false;
        }
        match msg.encode() {
            Ok(bytes) => self.publish_raw(bytes),
            Err(e) => {
                warn!(error = %e, "[publisher] encode failed");
                false
            }
        }
    }

    /// Publish an already encoded payload of the advertised type.
    pub fn publish_raw(&self, payload: Vec<u8>) -> bool {
        let Some(inner) = self.live() else {
            return false;
        };
        if let Some(throttle) = &inner.throttle {
            if !throttle.try_accept() {
                metric_inc!(THROTTLE_DROPS, &["publisher"]);
                debug!(topic = %inner.metadata.topic(), "[publisher] throttled");
                return true;
            }
        }
        inner.bus.publish(&inner.metadata, payload);
        true
    }

    /// True if a publish now would pass the throttle. Always true for
    /// unthrottled handles, false for invalid ones.
    #[must_use]
    pub fn throttled_update_ready(&self) -> bool {
        self.live()
            .is_some_and(|inner| inner.throttle.as_ref().map_or(true, Throttle::is_ready))
    }

    /// True if at least one subscriber, local or remote, would receive a
    /// publish now.
    #[must_use]
    pub fn has_connections(&self) -> bool {
        self.live()
            .is_some_and(|inner| inner.bus.has_connections(&inner.metadata))
    }

    /// Payloads dropped by this handle's throttle.
    #[must_use]
    pub fn throttle_drops(&self) -> u64 {
        self.inner
            .as_ref()
            .and_then(|inner| inner.throttle.as_ref())
            .map_or(0, Throttle::drops)
    }

    #[must_use]
    pub fn metadata(&self) -> Option<&MessagePublisher> {
        self.inner.as_ref().map(|inner| &inner.metadata)
    }
}

impl std::fmt::Debug for PublisherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublisherHandle")
            .field("state", &self.state())
            .field("metadata", &self.metadata())
            .finish()
    }
}
