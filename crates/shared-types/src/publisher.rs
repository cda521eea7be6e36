//! # Publisher Metadata
//!
//! Value objects describing an advertised endpoint.
//!
//! ## Variants
//!
//! - [`MessagePublisher`]: a topic publisher (control address, message type,
//!   optional throttle).
//! - [`ServicePublisher`]: a service responder (socket id, request and reply
//!   types).
//!
//! Both wrap the common [`Publisher`] base and implement [`Endpoint`], the
//! shared capability set used by discovery. [`PublisherRecord`] is the
//! tagged union that travels on the wire.
//!
//! `(topic, puuid, nuuid)` identifies exactly one advertised endpoint.

use crate::ids::{NodeUuid, ProcessUuid};
use crate::options::{AdvertiseMessageOptions, AdvertiseOptions, AdvertiseServiceOptions, Scope};
use crate::wire::DiscoveryMessage;
use serde::{Deserialize, Serialize};

// =============================================================================
// BASE
// =============================================================================

/// Fields common to every advertised endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Publisher {
    topic: String,
    addr: String,
    puuid: ProcessUuid,
    nuuid: NodeUuid,
    options: AdvertiseOptions,
}

impl Publisher {
    #[must_use]
    pub fn new(
        topic: impl Into<String>,
        addr: impl Into<String>,
        puuid: ProcessUuid,
        nuuid: NodeUuid,
        options: AdvertiseOptions,
    ) -> Self {
        Self {
            topic: topic.into(),
            addr: addr.into(),
            puuid,
            nuuid,
            options,
        }
    }

    /// Fully qualified topic or service name.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn set_topic(&mut self, topic: impl Into<String>) {
        self.topic = topic.into();
    }

    /// Data address of the owning process.
    #[must_use]
    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn set_addr(&mut self, addr: impl Into<String>) {
        self.addr = addr.into();
    }

    #[must_use]
    pub fn puuid(&self) -> ProcessUuid {
        self.puuid
    }

    pub fn set_puuid(&mut self, puuid: ProcessUuid) {
        self.puuid = puuid;
    }

    #[must_use]
    pub fn nuuid(&self) -> NodeUuid {
        self.nuuid
    }

    pub fn set_nuuid(&mut self, nuuid: NodeUuid) {
        self.nuuid = nuuid;
    }

    #[must_use]
    pub fn options(&self) -> AdvertiseOptions {
        self.options
    }

    pub fn set_options(&mut self, options: AdvertiseOptions) {
        self.options = options;
    }
}

// =============================================================================
// VARIANTS
// =============================================================================

/// A topic publisher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePublisher {
    publisher: Publisher,
    ctrl: String,
    msg_type_name: String,
    msgs_per_sec: Option<u64>,
}

impl MessagePublisher {
    #[must_use]
    pub fn new(
        topic: impl Into<String>,
        addr: impl Into<String>,
        ctrl: impl Into<String>,
        puuid: ProcessUuid,
        nuuid: NodeUuid,
        msg_type_name: impl Into<String>,
        options: AdvertiseMessageOptions,
    ) -> Self {
        Self {
            publisher: Publisher::new(topic, addr, puuid, nuuid, options.base()),
            ctrl: ctrl.into(),
            msg_type_name: msg_type_name.into(),
            msgs_per_sec: options.msgs_per_sec(),
        }
    }

    /// Address subscribers send `Connect`/`Disconnect` to.
    #[must_use]
    pub fn ctrl(&self) -> &str {
        &self.ctrl
    }

    pub fn set_ctrl(&mut self, ctrl: impl Into<String>) {
        self.ctrl = ctrl.into();
    }

    #[must_use]
    pub fn msg_type_name(&self) -> &str {
        &self.msg_type_name
    }

    pub fn set_msg_type_name(&mut self, name: impl Into<String>) {
        self.msg_type_name = name.into();
    }

    #[must_use]
    pub fn options(&self) -> AdvertiseMessageOptions {
        let mut options =
            AdvertiseMessageOptions::new().with_scope(self.publisher.options().scope());
        if let Some(rate) = self.msgs_per_sec {
            options.set_msgs_per_sec(rate);
        }
        options
    }

    pub fn set_options(&mut self, options: AdvertiseMessageOptions) {
        self.publisher.set_options(options.base());
        self.msgs_per_sec = options.msgs_per_sec();
    }

    #[must_use]
    pub fn publisher_mut(&mut self) -> &mut Publisher {
        &mut self.publisher
    }
}

/// A service responder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServicePublisher {
    publisher: Publisher,
    socket_id: String,
    req_type_name: String,
    rep_type_name: String,
}

impl ServicePublisher {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        service: impl Into<String>,
        addr: impl Into<String>,
        socket_id: impl Into<String>,
        puuid: ProcessUuid,
        nuuid: NodeUuid,
        req_type_name: impl Into<String>,
        rep_type_name: impl Into<String>,
        options: AdvertiseServiceOptions,
    ) -> Self {
        Self {
            publisher: Publisher::new(service, addr, puuid, nuuid, options.base()),
            socket_id: socket_id.into(),
            req_type_name: req_type_name.into(),
            rep_type_name: rep_type_name.into(),
        }
    }

    #[must_use]
    pub fn socket_id(&self) -> &str {
        &self.socket_id
    }

    pub fn set_socket_id(&mut self, socket_id: impl Into<String>) {
        self.socket_id = socket_id.into();
    }

    #[must_use]
    pub fn req_type_name(&self) -> &str {
        &self.req_type_name
    }

    pub fn set_req_type_name(&mut self, name: impl Into<String>) {
        self.req_type_name = name.into();
    }

    #[must_use]
    pub fn rep_type_name(&self) -> &str {
        &self.rep_type_name
    }

    pub fn set_rep_type_name(&mut self, name: impl Into<String>) {
        self.rep_type_name = name.into();
    }

    #[must_use]
    pub fn options(&self) -> AdvertiseServiceOptions {
        AdvertiseServiceOptions::new().with_scope(self.publisher.options().scope())
    }

    pub fn set_options(&mut self, options: AdvertiseServiceOptions) {
        self.publisher.set_options(options.base());
    }

    #[must_use]
    pub fn publisher_mut(&mut self) -> &mut Publisher {
        &mut self.publisher
    }
}

// =============================================================================
// SHARED CAPABILITY SET
// =============================================================================

/// Which table an endpoint lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EndpointKind {
    Message,
    Service,
}

/// Operations discovery needs from any endpoint variant.
pub trait Endpoint: Clone + Send + Sync + 'static {
    const KIND: EndpointKind;

    fn publisher(&self) -> &Publisher;

    fn into_record(self) -> PublisherRecord;

    fn topic(&self) -> &str {
        self.publisher().topic()
    }

    fn scope(&self) -> Scope {
        self.publisher().options().scope()
    }

    fn key(&self) -> (ProcessUuid, NodeUuid) {
        (self.publisher().puuid(), self.publisher().nuuid())
    }

    /// Build the advertisement announcing this endpoint.
    fn discovery(&self) -> DiscoveryMessage {
        DiscoveryMessage::Advertise(self.clone().into_record())
    }
}

impl Endpoint for MessagePublisher {
    const KIND: EndpointKind = EndpointKind::Message;

    fn publisher(&self) -> &Publisher {
        &self.publisher
    }

    fn into_record(self) -> PublisherRecord {
        PublisherRecord::Message(self)
    }
}

impl Endpoint for ServicePublisher {
    const KIND: EndpointKind = EndpointKind::Service;

    fn publisher(&self) -> &Publisher {
        &self.publisher
    }

    fn into_record(self) -> PublisherRecord {
        PublisherRecord::Service(self)
    }
}

/// Either endpoint variant, as carried in an `Advertise` message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PublisherRecord {
    Message(MessagePublisher),
    Service(ServicePublisher),
}

impl PublisherRecord {
    #[must_use]
    pub fn publisher(&self) -> &Publisher {
        match self {
            PublisherRecord::Message(p) => p.publisher(),
            PublisherRecord::Service(p) => p.publisher(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> EndpointKind {
        match self {
            PublisherRecord::Message(_) => EndpointKind::Message,
            PublisherRecord::Service(_) => EndpointKind::Service,
        }
    }

    #[must_use]
    pub fn discovery(&self) -> DiscoveryMessage {
        DiscoveryMessage::Advertise(self.clone())
    }
}
