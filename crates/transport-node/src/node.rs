//! # Node
//!
//! The user-facing endpoint. A node owns its advertisements, subscriptions
//! and service responders; dropping it withdraws all of them.
//!
//! ## Naming
//!
//! Every name a node accepts is relative to its namespace and partition.
//! Internally everything is keyed by the fully qualified name; listings
//! strip the prefix again and only report names in the node's partition.
//!
//! ## Failure Reporting
//!
//! No operation panics or returns an error type. Advertising yields an
//! invalid [`PublisherHandle`], subscribing returns `false`, and requests
//! return [`ServiceOutcome::NoResponder`] for malformed input.

use crate::context::TransportContext;
use crate::handle::{PublisherHandle, PublisherState};
use parking_lot::Mutex;
use shared_bus::{in_dispatch, MessageInfo, RawHandler};
use shared_types::topic::{decompose, fully_qualified_name};
use shared_types::{
    AdvertiseMessageOptions, AdvertiseServiceOptions, DynMessage, EndpointKind, Message,
    MessagePublisher, NodeOptions, NodeUuid, ServicePublisher, Snapshot, SubscribeOptions,
    TransportError,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::{Handle, RuntimeFlavor};
use tp_01_discovery::DiscoveryApi;
use tp_02_service_bus::{Responder, ServiceHandler, ServiceOutcome};
use tracing::{debug, error, info, warn};

/// A participant in the topic and service graph.
pub struct Node {
    ctx: TransportContext,
    nuuid: NodeUuid,
    namespace: String,
    partition: String,
    /// Advertised topics by fully qualified name.
    publishers: Mutex<BTreeMap<String, PublisherHandle>>,
    closed: AtomicBool,
}

impl Node {
    /// A node in the context's partition with an empty namespace.
    #[must_use]
    pub fn new(ctx: &TransportContext) -> Self {
        Self::with_options(ctx, NodeOptions::new())
    }

    #[must_use]
    pub fn with_options(ctx: &TransportContext, options: NodeOptions) -> Self {
        let partition = options
            .partition()
            .unwrap_or(ctx.config().partition.as_str())
            .trim_matches('/')
            .to_string();
        let node = Self {
            ctx: ctx.clone(),
            nuuid: NodeUuid::new(),
            namespace: options.namespace().to_string(),
            partition,
            publishers: Mutex::new(BTreeMap::new()),
            closed: AtomicBool::new(false),
        };
        ctx.attach();
        info!(
            nuuid = %node.nuuid,
            namespace = %node.namespace,
            partition = %node.partition,
            "[node] created"
        );
        node
    }

    #[must_use]
    pub fn nuuid(&self) -> NodeUuid {
        self.nuuid
    }

    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    #[must_use]
    pub fn partition(&self) -> &str {
        &self.partition
    }

    #[must_use]
    pub fn context(&self) -> &TransportContext {
        &self.ctx
    }

    fn qualify(&self, name: &str) -> Option<String> {
        let fq = fully_qualified_name(&self.partition, &self.namespace, name);
        if fq.is_none() {
            warn!(name = %name, "[node] malformed name rejected");
        }
        fq
    }

    /// Strip the partition prefix, dropping names from other partitions.
    fn localize(&self, fully_qualified: &str) -> Option<String> {
        decompose(fully_qualified)
            .filter(|(partition, _)| *partition == self.partition)
            .map(|(_, name)| name.to_string())
    }

    fn localize_all(&self, names: impl IntoIterator<Item = String>) -> Snapshot<String> {
        let mut local: Vec<String> = names
            .into_iter()
            .filter_map(|fq| self.localize(&fq))
            .collect();
        local.sort();
        local.dedup();
        local.into()
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    // =========================================================================
    // TOPICS
    // =========================================================================

    /// Advertise `topic` carrying messages of type `M`.
    pub fn advertise<M: Message>(
        &self,
        topic: &str,
        options: AdvertiseMessageOptions,
    ) -> PublisherHandle {
        self.advertise_raw(topic, M::TYPE_NAME, options)
    }

    /// Advertise `topic` by type name.
    ///
    /// The handle is invalid if the name is malformed, the type name is
    /// empty, or this node already advertises the topic.
    pub fn advertise_raw(
        &self,
        topic: &str,
        msg_type_name: &str,
        options: AdvertiseMessageOptions,
    ) -> PublisherHandle {
        if self.is_closed() {
            return PublisherHandle::invalid();
        }
        if msg_type_name.is_empty() {
            warn!(topic = %topic, "[node] advertise without a message type");
            return PublisherHandle::invalid();
        }
        let Some(fq) = self.qualify(topic) else {
            return PublisherHandle::invalid();
        };

        let mut publishers = self.publishers.lock();
        if publishers.contains_key(&fq) {
            warn!(topic = %topic, nuuid = %self.nuuid, "[node] topic already advertised");
            return PublisherHandle::invalid();
        }

        let metadata = MessagePublisher::new(
            fq.as_str(),
            self.ctx.addr(),
            self.ctx.addr(),
            self.ctx.puuid(),
            self.nuuid,
            msg_type_name,
            options,
        );
        if let Err(e) = self.ctx.discovery().advertise_message(metadata.clone()) {
            warn!(topic = %topic, error = %e, "[node] advertise failed");
            return PublisherHandle::invalid();
        }

        let handle = PublisherHandle::advertised(metadata, self.ctx.messages().clone());
        publishers.insert(fq, handle.clone());
        debug!(topic = %topic, msg_type = %msg_type_name, "[node] advertised");
        handle
    }

    /// Withdraw `topic`. Every handle for it becomes invalid.
    pub fn unadvertise(&self, topic: &str) -> bool {
        let Some(fq) = self.qualify(topic) else {
            return false;
        };
        let Some(handle) = self.publishers.lock().remove(&fq) else {
            return false;
        };
        handle.set_state(PublisherState::Unadvertised);
        self.ctx.discovery().unadvertise_message(&fq, self.nuuid);
        true
    }

    /// Subscribe with a typed callback.
    pub fn subscribe<M, F>(&self, topic: &str, callback: F) -> bool
    where
        M: Message,
        F: Fn(&M) + Send + Sync + 'static,
    {
        self.subscribe_with_info::<M, _>(
            topic,
            move |msg: &M, _: &MessageInfo| callback(msg),
            &SubscribeOptions::new(),
        )
    }

    /// Subscribe with a typed callback and subscriber-side options.
    pub fn subscribe_with_options<M, F>(
        &self,
        topic: &str,
        callback: F,
        options: &SubscribeOptions,
    ) -> bool
    where
        M: Message,
        F: Fn(&M) + Send + Sync + 'static,
    {
        self.subscribe_with_info::<M, _>(
            topic,
            move |msg: &M, _: &MessageInfo| callback(msg),
            options,
        )
    }

    /// Subscribe with a typed callback that also receives delivery
    /// metadata. Payloads of another type are dropped and counted.
    pub fn subscribe_with_info<M, F>(
        &self,
        topic: &str,
        callback: F,
        options: &SubscribeOptions,
    ) -> bool
    where
        M: Message,
        F: Fn(&M, &MessageInfo) + Send + Sync + 'static,
    {
        let handler: RawHandler = Arc::new(move |payload: &[u8], info: &MessageInfo| {
            if info.msg_type_name() != M::TYPE_NAME {
                return Err(TransportError::TypeMismatch {
                    expected: M::TYPE_NAME.to_string(),
                    actual: info.msg_type_name().to_string(),
                });
            }
            let msg = M::decode(payload)?;
            callback(&msg, info);
            Ok(())
        });
        self.subscribe_raw(topic, handler, options)
    }

    /// Subscribe without knowing the type at compile time. Payloads are
    /// decoded through the context's message factory.
    pub fn subscribe_dynamic<F>(&self, topic: &str, callback: F, options: &SubscribeOptions) -> bool
    where
        F: Fn(&dyn DynMessage, &MessageInfo) + Send + Sync + 'static,
    {
        let factory = self.ctx.factory().clone();
        let handler: RawHandler = Arc::new(move |payload: &[u8], info: &MessageInfo| {
            let msg = factory.decode(info.msg_type_name(), payload)?;
            callback(msg.as_ref(), info);
            Ok(())
        });
        self.subscribe_raw(topic, handler, options)
    }

    /// Subscribe with a raw byte handler.
    ///
    /// Returns false only for a malformed topic or a shut down node.
    /// Subscribing twice adds a second handler.
    pub fn subscribe_raw(
        &self,
        topic: &str,
        handler: RawHandler,
        options: &SubscribeOptions,
    ) -> bool {
        if self.is_closed() {
            return false;
        }
        let Some(fq) = self.qualify(topic) else {
            return false;
        };

        let messages = self.ctx.messages();
        let discovery = self.ctx.discovery();
        messages.subscribe(&fq, self.nuuid, handler, options);
        for publisher in discovery.message_publishers(&fq) {
            messages.connect(&publisher);
        }
        discovery.announce_subscription(EndpointKind::Message, &fq);
        true
    }

    /// Remove every handler this node registered on `topic`.
    ///
    /// Returns false if there were none. No removed handler runs after this
    /// returns, unless called from inside that handler.
    pub fn unsubscribe(&self, topic: &str) -> bool {
        let Some(fq) = self.qualify(topic) else {
            return false;
        };
        self.ctx.messages().unsubscribe(&fq, self.nuuid)
    }

    #[must_use]
    pub fn advertised_topics(&self) -> Snapshot<String> {
        let names: Vec<String> = self.publishers.lock().keys().cloned().collect();
        self.localize_all(names)
    }

    #[must_use]
    pub fn subscribed_topics(&self) -> Snapshot<String> {
        self.localize_all(self.ctx.messages().subscribed_topics(self.nuuid))
    }

    /// Every topic known in this node's partition, local or remote.
    #[must_use]
    pub fn topic_list(&self) -> Snapshot<String> {
        self.localize_all(self.ctx.discovery().message_topics())
    }

    /// Known publishers of `topic`. Metadata carries fully qualified names.
    #[must_use]
    pub fn topic_info(&self, topic: &str) -> Snapshot<MessagePublisher> {
        self.qualify(topic)
            .map(|fq| self.ctx.discovery().message_publishers(&fq).into())
            .unwrap_or_default()
    }

    // =========================================================================
    // SERVICES
    // =========================================================================

    /// Answer `service` with `callback`, which returns the reply and a
    /// success flag. Requests that fail to decode are answered with an
    /// empty reply and `false`.
    pub fn advertise_service<Req, Rep, F>(
        &self,
        service: &str,
        callback: F,
        options: AdvertiseServiceOptions,
    ) -> bool
    where
        Req: Message,
        Rep: Message,
        F: Fn(&Req) -> (Rep, bool) + Send + Sync + 'static,
    {
        if self.is_closed() {
            return false;
        }
        let Some(fq) = self.qualify(service) else {
            return false;
        };

        let handler: ServiceHandler = Arc::new(move |bytes: &[u8]| {
            let request = match Req::decode(bytes) {
                Ok(request) => request,
                Err(e) => {
                    warn!(error = %e, "[node] undecodable request");
                    return (Vec::new(), false);
                }
            };
            let (reply, success) = callback(&request);
            match reply.encode() {
                Ok(bytes) => (bytes, success),
                Err(e) => {
                    warn!(error = %e, "[node] reply encode failed");
                    (Vec::new(), false)
                }
            }
        });
        let responder = Responder {
            handler,
            req_type_name: Req::TYPE_NAME.to_string(),
            rep_type_name: Rep::TYPE_NAME.to_string(),
            scope: options.scope(),
        };

        let services = self.ctx.services();
        if let Err(e) = services.advertise(&fq, self.nuuid, responder) {
            warn!(service = %service, error = %e, "[node] advertise service failed");
            return false;
        }
        let publisher = ServicePublisher::new(
            fq.as_str(),
            self.ctx.addr(),
            self.nuuid.to_string(),
            self.ctx.puuid(),
            self.nuuid,
            Req::TYPE_NAME,
            Rep::TYPE_NAME,
            options,
        );
        if let Err(e) = self.ctx.discovery().advertise_service(publisher) {
            warn!(service = %service, error = %e, "[node] advertise service failed");
            services.unadvertise(&fq, self.nuuid);
            return false;
        }
        debug!(service = %service, "[node] service advertised");
        true
    }

    pub fn unadvertise_service(&self, service: &str) -> bool {
        let Some(fq) = self.qualify(service) else {
            return false;
        };
        let removed = self.ctx.services().unadvertise(&fq, self.nuuid);
        self.ctx.discovery().unadvertise_service(&fq, self.nuuid);
        removed
    }

    #[must_use]
    pub fn advertised_services(&self) -> Snapshot<String> {
        self.localize_all(self.ctx.services().advertised_services(self.nuuid))
    }

    #[must_use]
    pub fn service_list(&self) -> Snapshot<String> {
        self.localize_all(self.ctx.discovery().service_topics())
    }

    #[must_use]
    pub fn service_info(&self, service: &str) -> Snapshot<ServicePublisher> {
        self.qualify(service)
            .map(|fq| self.ctx.discovery().service_publishers(&fq).into())
            .unwrap_or_default()
    }

    // =========================================================================
    // REQUESTS
    // =========================================================================

    /// Encode the request and resolve the service name. `None` when the
    /// request cannot be sent at all.
    fn prepare<Req: Message>(&self, service: &str, request: &Req) -> Option<(String, Vec<u8>)> {
        if self.is_closed() {
            return None;
        }
        let fq = self.qualify(service)?;
        match request.encode() {
            Ok(payload) => Some((fq, payload)),
            Err(e) => {
                warn!(service = %service, error = %e, "[node] request encode failed");
                None
            }
        }
    }

    /// Call `service` and wait for the outcome.
    ///
    /// `timeout` defaults to the configured request timeout. A reply that
    /// does not decode as `Rep` is reported as a failed reply.
    pub async fn request<Req, Rep>(
        &self,
        service: &str,
        request: &Req,
        timeout: Option<Duration>,
    ) -> ServiceOutcome<Rep>
    where
        Req: Message,
        Rep: Message + Default,
    {
        let Some((fq, payload)) = self.prepare(service, request) else {
            return ServiceOutcome::NoResponder;
        };
        let timeout = timeout.unwrap_or(self.ctx.config().request_timeout);
        let outcome = call(
            &self.ctx,
            self.nuuid,
            &fq,
            Req::TYPE_NAME,
            Rep::TYPE_NAME,
            payload,
            timeout,
        )
        .await;
        decode_reply(outcome)
    }

    /// Call `service` from a thread that is not driving the runtime.
    ///
    /// Outside any runtime this blocks on the context's runtime. On a
    /// multi-thread runtime worker it blocks in place. On a current-thread
    /// runtime, or inside a subscriber callback or service handler, blocking
    /// would stall the dispatcher, so the call is refused with `NoResponder`.
    pub fn request_blocking<Req, Rep>(
        &self,
        service: &str,
        request: &Req,
        timeout: Option<Duration>,
    ) -> ServiceOutcome<Rep>
    where
        Req: Message,
        Rep: Message + Default,
    {
        if in_dispatch() {
            error!(
                service = %service,
                "[node] blocking request from a dispatcher callback refused"
            );
            return ServiceOutcome::NoResponder;
        }
        match Handle::try_current() {
            Err(_) => self
                .ctx
                .runtime()
                .block_on(self.request(service, request, timeout)),
            Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
                tokio::task::block_in_place(|| {
                    handle.block_on(self.request(service, request, timeout))
                })
            }
            Ok(_) => {
                error!(
                    service = %service,
                    "[node] blocking request on a current-thread runtime refused"
                );
                ServiceOutcome::NoResponder
            }
        }
    }

    /// Call `service` in the background and hand the outcome to `callback`.
    ///
    /// Returns false if the request could not be started.
    pub fn request_with_callback<Req, Rep, F>(
        &self,
        service: &str,
        request: &Req,
        timeout: Option<Duration>,
        callback: F,
    ) -> bool
    where
        Req: Message,
        Rep: Message + Default,
        F: FnOnce(ServiceOutcome<Rep>) + Send + 'static,
    {
        let Some((fq, payload)) = self.prepare(service, request) else {
            return false;
        };
        let ctx = self.ctx.clone();
        let nuuid = self.nuuid;
        let timeout = timeout.unwrap_or(ctx.config().request_timeout);
        self.ctx.runtime().spawn(async move {
            let outcome =
                call(&ctx, nuuid, &fq, Req::TYPE_NAME, Rep::TYPE_NAME, payload, timeout).await;
            callback(decode_reply(outcome));
        });
        true
    }

    // =========================================================================
    // TEARDOWN
    // =========================================================================

    /// Withdraw everything this node owns and detach from the context.
    ///
    /// Outstanding requests of this node complete with `NoResponder`.
    /// Idempotent; also runs on drop.
    pub fn shutdown(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        let discovery = self.ctx.discovery();
        let publishers = std::mem::take(&mut *self.publishers.lock());
        for (fq, handle) in &publishers {
            handle.set_state(PublisherState::NodeDestroyed);
            discovery.unadvertise_message(fq, self.nuuid);
        }
        for fq in self.ctx.services().remove_node(self.nuuid) {
            discovery.unadvertise_service(&fq, self.nuuid);
        }
        self.ctx.messages().remove_node(self.nuuid);
        self.ctx.detach();
        info!(nuuid = %self.nuuid, topics = publishers.len(), "[node] shut down");
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("nuuid", &self.nuuid)
            .field("namespace", &self.namespace)
            .field("partition", &self.partition)
            .finish_non_exhaustive()
    }
}

/// One service call against the current discovery snapshot.
async fn call(
    ctx: &TransportContext,
    requester: NodeUuid,
    fq: &str,
    req_type_name: &str,
    rep_type_name: &str,
    payload: Vec<u8>,
    timeout: Duration,
) -> ServiceOutcome<Vec<u8>> {
    let candidates = ctx.discovery().service_publishers(fq);
    if candidates.is_empty() {
        // Responders we have not heard of yet answer on the next call
        ctx.discovery().announce_subscription(EndpointKind::Service, fq);
    }
    ctx.services()
        .request(requester, fq, req_type_name, rep_type_name, payload, candidates, timeout)
        .await
}

fn decode_reply<Rep: Message + Default>(outcome: ServiceOutcome<Vec<u8>>) -> ServiceOutcome<Rep> {
    match outcome {
        ServiceOutcome::Replied { reply, result } => match Rep::decode(&reply) {
            Ok(reply) => ServiceOutcome::Replied { reply, result },
            Err(e) => {
                warn!(error = %e, "[node] reply decode failed");
                ServiceOutcome::Replied {
                    reply: Rep::default(),
                    result: false,
                }
            }
        },
        ServiceOutcome::TimedOut => ServiceOutcome::TimedOut,
        ServiceOutcome::NoResponder => ServiceOutcome::NoResponder,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TransportConfig;
    use shared_net::LoopbackNetwork;
    use shared_types::msgs::{Boolean, Int32, StringMsg, Time};
    use shared_types::Scope;
    use std::sync::Mutex as StdMutex;
    use tokio::sync::mpsc;

    fn context(hub: &LoopbackNetwork, host: &str) -> TransportContext {
        TransportContext::loopback(hub, host, TransportConfig::for_testing()).unwrap()
    }

    async fn recv<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for delivery")
            .expect("channel closed")
    }

    #[tokio::test]
    async fn test_advertise_lists_topic_once() {
        let hub = LoopbackNetwork::new();
        let ctx = context(&hub, "h");
        let node = Node::new(&ctx);

        let first = node.advertise::<Int32>("/chatter", AdvertiseMessageOptions::new());
        assert!(first.valid());
        let second = node.advertise::<Int32>("/chatter", AdvertiseMessageOptions::new());
        assert!(!second.valid());

        let topics = node.advertised_topics();
        assert_eq!(topics.as_slice(), ["/chatter".to_string()]);
        assert!(node.topic_list().contains_str("/chatter"));
    }

    #[tokio::test]
    async fn test_malformed_names_rejected() {
        let hub = LoopbackNetwork::new();
        let ctx = context(&hub, "h");
        let node = Node::new(&ctx);

        assert!(!node.advertise::<Int32>("", AdvertiseMessageOptions::new()).valid());
        assert!(!node.advertise_raw("/ok", "", AdvertiseMessageOptions::new()).valid());
        assert!(!node.subscribe::<Int32, _>("bad topic", |_| {}));
        assert!(!node.unsubscribe(""));
        assert!(node.topic_info("").is_empty());
        let outcome: ServiceOutcome<Int32> = node.request("", &Int32 { data: 1 }, None).await;
        assert_eq!(outcome, ServiceOutcome::NoResponder);
    }

    #[tokio::test]
    async fn test_namespace_applies_to_relative_names() {
        let hub = LoopbackNetwork::new();
        let ctx = context(&hub, "h");
        let mut options = NodeOptions::new();
        assert!(options.set_namespace("robot"));
        let node = Node::with_options(&ctx, options);

        node.advertise::<Int32>("odom", AdvertiseMessageOptions::new());
        node.advertise::<Int32>("/global", AdvertiseMessageOptions::new());
        let topics = node.advertised_topics();
        assert!(topics.contains_str("/robot/odom"));
        assert!(topics.contains_str("/global"));
    }

    #[tokio::test]
    async fn test_partitions_do_not_see_each_other() {
        let hub = LoopbackNetwork::new();
        let ctx = context(&hub, "h");
        let mut options = NodeOptions::new();
        assert!(options.set_partition("blue"));
        let blue = Node::with_options(&ctx, options);
        let default = Node::new(&ctx);

        blue.advertise::<Int32>("/status", AdvertiseMessageOptions::new());
        assert!(blue.topic_list().contains_str("/status"));
        assert!(!default.topic_list().contains_str("/status"));
        assert!(default.topic_info("/status").is_empty());
    }

    #[tokio::test]
    async fn test_local_round_trip() {
        let hub = LoopbackNetwork::new();
        let ctx = context(&hub, "h");
        let publisher = Node::new(&ctx);
        let subscriber = Node::new(&ctx);
        let (tx, mut rx) = mpsc::unbounded_channel();

        assert!(subscriber.subscribe_with_info::<Time, _>(
            "/clock",
            move |msg: &Time, info: &MessageInfo| {
                tx.send((*msg, info.clone())).unwrap();
            },
            &SubscribeOptions::new(),
        ));
        let handle = publisher.advertise::<Time>("/clock", AdvertiseMessageOptions::new());
        assert!(handle.has_connections());
        assert!(handle.publish(&Time { sec: 11, nsec: 25 }));

        let (msg, info) = recv(&mut rx).await;
        assert_eq!(msg, Time { sec: 11, nsec: 25 });
        assert_eq!(info.topic(), "/clock");
        assert_eq!(info.publisher(), publisher.nuuid());
        assert!(info.intra_process());
    }

    #[tokio::test]
    async fn test_dynamic_subscription_decodes_by_type_name() {
        let hub = LoopbackNetwork::new();
        let ctx = context(&hub, "h");
        let node = Node::new(&ctx);
        let (tx, mut rx) = mpsc::unbounded_channel();

        node.subscribe_dynamic(
            "/any",
            move |msg: &dyn DynMessage, _: &MessageInfo| {
                tx.send(msg.downcast_ref::<StringMsg>().cloned()).unwrap();
            },
            &SubscribeOptions::new(),
        );
        let handle = node.advertise::<StringMsg>("/any", AdvertiseMessageOptions::new());
        handle.publish(&StringMsg { data: "hi".into() });

        let got = recv(&mut rx).await;
        assert_eq!(got, Some(StringMsg { data: "hi".into() }));
    }

    #[tokio::test]
    async fn test_typed_subscriber_skips_other_types() {
        let hub = LoopbackNetwork::new();
        let ctx = context(&hub, "h");
        let node = Node::new(&ctx);
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let sink = seen.clone();
        let (tx, mut rx) = mpsc::unbounded_channel();

        node.subscribe::<Int32, _>("/mixed", move |msg| sink.lock().unwrap().push(msg.data));
        node.subscribe::<Boolean, _>("/mixed", move |_| tx.send(()).unwrap());
        let handle = node.advertise::<Boolean>("/mixed", AdvertiseMessageOptions::new());
        handle.publish(&Boolean { data: true });

        recv(&mut rx).await;
        assert!(seen.lock().unwrap().is_empty());
        assert!(ctx.messages().stats().decode_failures >= 1);
    }

    #[tokio::test]
    async fn test_unsubscribe_twice() {
        let hub = LoopbackNetwork::new();
        let ctx = context(&hub, "h");
        let node = Node::new(&ctx);

        node.subscribe::<Int32, _>("/t", |_| {});
        node.subscribe::<Int32, _>("/t", |_| {});
        assert!(node.subscribed_topics().contains_str("/t"));
        assert!(node.unsubscribe("/t"));
        assert!(!node.unsubscribe("/t"));
        assert!(node.subscribed_topics().is_empty());
    }

    #[tokio::test]
    async fn test_unadvertise_invalidates_handle() {
        let hub = LoopbackNetwork::new();
        let ctx = context(&hub, "h");
        let node = Node::new(&ctx);

        let handle = node.advertise::<Int32>("/gone", AdvertiseMessageOptions::new());
        assert!(node.unadvertise("/gone"));
        assert!(!node.unadvertise("/gone"));
        assert_eq!(handle.state(), PublisherState::Unadvertised);
        assert!(!handle.publish(&Int32 { data: 1 }));
        assert!(node.topic_info("/gone").is_empty());

        // The name is free again
        assert!(node.advertise::<Int32>("/gone", AdvertiseMessageOptions::new()).valid());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_service_round_trip() {
        let hub = LoopbackNetwork::new();
        let ctx = context(&hub, "h");
        let server = Node::new(&ctx);
        let client = Node::new(&ctx);

        assert!(server.advertise_service::<Int32, Int32, _>(
            "/double",
            |req: &Int32| (Int32 { data: req.data * 2 }, true),
            AdvertiseServiceOptions::new(),
        ));
        assert!(server.advertised_services().contains_str("/double"));
        assert!(client.service_list().contains_str("/double"));
        assert_eq!(client.service_info("/double").len(), 1);

        let outcome: ServiceOutcome<Int32> =
            client.request("/double", &Int32 { data: 21 }, None).await;
        assert_eq!(
            outcome,
            ServiceOutcome::Replied {
                reply: Int32 { data: 42 },
                result: true
            }
        );

        // Mismatched reply type never reaches the responder
        let outcome: ServiceOutcome<Boolean> =
            client.request("/double", &Int32 { data: 1 }, None).await;
        assert_eq!(outcome, ServiceOutcome::NoResponder);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_request_with_callback() {
        let hub = LoopbackNetwork::new();
        let ctx = context(&hub, "h");
        let server = Node::new(&ctx);
        server.advertise_service::<Int32, Boolean, _>(
            "/positive",
            |req: &Int32| (Boolean { data: req.data > 0 }, req.data != 0),
            AdvertiseServiceOptions::new().with_scope(Scope::Process),
        );

        let (tx, mut rx) = mpsc::unbounded_channel();
        assert!(server.request_with_callback::<Int32, Boolean, _>(
            "/positive",
            &Int32 { data: 0 },
            None,
            move |outcome| tx.send(outcome).unwrap(),
        ));
        let outcome = recv(&mut rx).await;
        assert!(outcome.executed());
        assert!(!outcome.result());
        assert_eq!(outcome.reply(), Some(&Boolean { data: false }));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_request_blocking_on_worker_thread() {
        let hub = LoopbackNetwork::new();
        let ctx = context(&hub, "h");
        let node = Node::new(&ctx);
        node.advertise_service::<Int32, Int32, _>(
            "/inc",
            |req: &Int32| (Int32 { data: req.data + 1 }, true),
            AdvertiseServiceOptions::new(),
        );

        let outcome: ServiceOutcome<Int32> =
            node.request_blocking("/inc", &Int32 { data: 1 }, None);
        assert_eq!(outcome.into_reply(), Some(Int32 { data: 2 }));
    }

    #[tokio::test]
    async fn test_request_blocking_refused_on_current_thread() {
        let hub = LoopbackNetwork::new();
        let ctx = context(&hub, "h");
        let node = Node::new(&ctx);
        let outcome: ServiceOutcome<Int32> =
            node.request_blocking("/inc", &Int32 { data: 1 }, None);
        assert_eq!(outcome, ServiceOutcome::NoResponder);
    }

    #[tokio::test]
    async fn test_duplicate_service_rejected() {
        let hub = LoopbackNetwork::new();
        let ctx = context(&hub, "h");
        let node = Node::new(&ctx);
        let answer = |_: &Int32| (Int32::default(), true);

        assert!(node.advertise_service::<Int32, Int32, _>(
            "/s",
            answer,
            AdvertiseServiceOptions::new()
        ));
        assert!(!node.advertise_service::<Int32, Int32, _>(
            "/s",
            answer,
            AdvertiseServiceOptions::new()
        ));
        assert!(node.unadvertise_service("/s"));
        assert!(!node.unadvertise_service("/s"));
        assert!(node.service_info("/s").is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_withdraws_everything() {
        let hub = LoopbackNetwork::new();
        let ctx = context(&hub, "h");
        let observer = Node::new(&ctx);
        let node = Node::new(&ctx);

        let handle = node.advertise::<Int32>("/a", AdvertiseMessageOptions::new());
        node.subscribe::<Int32, _>("/b", |_| {});
        node.advertise_service::<Int32, Int32, _>(
            "/c",
            |r: &Int32| (*r, true),
            AdvertiseServiceOptions::new(),
        );
        assert_eq!(ctx.node_count(), 2);

        node.shutdown();
        node.shutdown();
        assert_eq!(handle.state(), PublisherState::NodeDestroyed);
        assert!(observer.topic_info("/a").is_empty());
        assert!(observer.service_info("/c").is_empty());
        assert!(!ctx.messages().has_subscribers("@/@/b"));
        assert_eq!(ctx.node_count(), 1);
        assert!(!node.advertise::<Int32>("/d", AdvertiseMessageOptions::new()).valid());

        drop(node);
        assert_eq!(ctx.node_count(), 1);
    }
}
