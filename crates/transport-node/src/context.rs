//! # Transport Context
//!
//! The process-wide registry every [`Node`](crate::Node) attaches to.
//!
//! ## Lifecycle
//!
//! ```text
//! new() ──▶ idle ──first attach──▶ running ──last detach──▶ idle
//!                                  │                         │
//!                                  ├ dispatcher task         ├ Bye broadcast
//!                                  └ sweeper task            └ tasks stopped
//! ```
//!
//! A context can cycle between idle and running any number of times. Clones
//! share one registry; there is no global instance.

use crate::config::TransportConfig;
use crate::dispatcher::{run_sweeper, Dispatcher, Receivers, SharedReceivers};
use crate::router::EventRouter;
use parking_lot::Mutex;
use shared_bus::MessageBus;
use shared_net::{LoopbackNetwork, NetworkHandle, NetworkTransport, UdpTransport};
use shared_types::{MessageFactory, ProcessUuid, TransportError};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch, Mutex as AsyncMutex};
use tp_01_discovery::{DiscoveryService, FrameSink, SystemTimeSource};
use tp_02_service_bus::ServiceBus;
use tracing::{error, info};
use transport_telemetry::metrics::ACTIVE_NODES;

#[derive(Default)]
struct Lifecycle {
    nodes: usize,
    shutdown: Option<watch::Sender<bool>>,
}

struct ContextInner {
    puuid: ProcessUuid,
    config: TransportConfig,
    transport: Arc<dyn NetworkTransport>,
    discovery: Arc<DiscoveryService>,
    messages: Arc<MessageBus>,
    services: Arc<ServiceBus>,
    factory: Arc<MessageFactory>,
    runtime: Handle,
    receivers: SharedReceivers,
    lifecycle: Mutex<Lifecycle>,
}

/// Shared transport state for one process.
#[derive(Clone)]
pub struct TransportContext {
    inner: Arc<ContextInner>,
}

impl TransportContext {
    /// Build a context over an already bound network.
    ///
    /// # Errors
    ///
    /// - `ResourceExhausted` when called outside a tokio runtime
    /// - `MalformedInput` when `config` does not validate
    pub fn new(config: TransportConfig, network: NetworkHandle) -> Result<Self, TransportError> {
        let runtime = Handle::try_current().map_err(|e| {
            error!(error = %e, "[context] no tokio runtime");
            TransportError::ResourceExhausted(format!("no tokio runtime: {e}"))
        })?;
        config
            .validate()
            .map_err(|e| TransportError::MalformedInput(e.to_string()))?;

        let NetworkHandle { transport, inbound } = network;
        let puuid = ProcessUuid::new();
        let (local_tx, local_rx) = mpsc::unbounded_channel();

        let messages = Arc::new(MessageBus::new(puuid, transport.clone(), local_tx.clone()));
        let services = Arc::new(ServiceBus::new(puuid, transport.clone(), local_tx));
        let discovery = Arc::new(DiscoveryService::new(
            puuid,
            transport.host(),
            transport.local_addr(),
            config.discovery(),
            Arc::new(FrameSink::new(transport.clone(), puuid)),
            Arc::new(SystemTimeSource),
        ));
        discovery.set_listener(Arc::new(EventRouter::new(
            messages.clone(),
            services.clone(),
        )));

        info!(
            puuid = %puuid,
            host = %transport.host(),
            addr = %transport.local_addr(),
            partition = %config.partition,
            "[context] transport context created"
        );

        Ok(Self {
            inner: Arc::new(ContextInner {
                puuid,
                config,
                transport,
                discovery,
                messages,
                services,
                factory: Arc::new(MessageFactory::with_builtin()),
                runtime,
                receivers: Arc::new(AsyncMutex::new(Receivers {
                    network: inbound,
                    local: local_rx,
                })),
                lifecycle: Mutex::new(Lifecycle::default()),
            }),
        })
    }

    /// A context on an in-memory hub, as a simulated process on `host`.
    ///
    /// # Errors
    ///
    /// See [`TransportContext::new`].
    pub fn loopback(
        hub: &LoopbackNetwork,
        host: &str,
        config: TransportConfig,
    ) -> Result<Self, TransportError> {
        Self::new(config, hub.bind(host))
    }

    /// A context on UDP multicast. Must be called inside a tokio runtime.
    ///
    /// # Errors
    ///
    /// `ResourceExhausted` if the sockets cannot be opened, plus the errors
    /// of [`TransportContext::new`].
    pub fn udp(config: TransportConfig) -> Result<Self, TransportError> {
        let network = UdpTransport::bind(config.udp()).map_err(|e| {
            error!(error = %e, "[context] failed to open sockets");
            TransportError::ResourceExhausted(e.to_string())
        })?;
        Self::new(config, network)
    }

    // =========================================================================
    // NODE LIFECYCLE
    // =========================================================================

    /// Register a node. The first one starts the background tasks.
    pub(crate) fn attach(&self) {
        let mut lifecycle = self.inner.lifecycle.lock();
        lifecycle.nodes += 1;
        ACTIVE_NODES.inc();
        if lifecycle.nodes > 1 {
            return;
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let dispatcher = Dispatcher {
            puuid: self.inner.puuid,
            discovery: self.inner.discovery.clone(),
            messages: self.inner.messages.clone(),
            services: self.inner.services.clone(),
        };
        self.inner
            .runtime
            .spawn(dispatcher.run(self.inner.receivers.clone(), shutdown_rx.clone()));
        self.inner.runtime.spawn(run_sweeper(
            self.inner.discovery.clone(),
            self.inner.services.clone(),
            shutdown_rx,
        ));
        lifecycle.shutdown = Some(shutdown_tx);
        info!(puuid = %self.inner.puuid, "[context] started");
    }

    /// Unregister a node. The last one says goodbye and stops the tasks.
    pub(crate) fn detach(&self) {
        let mut lifecycle = self.inner.lifecycle.lock();
        lifecycle.nodes = lifecycle.nodes.saturating_sub(1);
        ACTIVE_NODES.dec();
        if lifecycle.nodes > 0 {
            return;
        }

        self.inner.discovery.shutdown();
        if let Some(shutdown) = lifecycle.shutdown.take() {
            // Receivers may already be gone if the runtime shut down first
            let _ = shutdown.send(true);
        }
        info!(puuid = %self.inner.puuid, "[context] stopped");
    }

    /// Nodes currently attached.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.inner.lifecycle.lock().nodes
    }

    /// True while background tasks are running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.inner.lifecycle.lock().shutdown.is_some()
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    #[must_use]
    pub fn puuid(&self) -> ProcessUuid {
        self.inner.puuid
    }

    #[must_use]
    pub fn host(&self) -> &str {
        self.inner.transport.host()
    }

    /// Point-to-point address of this process.
    #[must_use]
    pub fn addr(&self) -> &str {
        self.inner.transport.local_addr()
    }

    #[must_use]
    pub fn config(&self) -> &TransportConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn discovery(&self) -> &Arc<DiscoveryService> {
        &self.inner.discovery
    }

    #[must_use]
    pub fn messages(&self) -> &Arc<MessageBus> {
        &self.inner.messages
    }

    #[must_use]
    pub fn services(&self) -> &Arc<ServiceBus> {
        &self.inner.services
    }

    /// Registry used by dynamic subscriptions.
    #[must_use]
    pub fn factory(&self) -> &Arc<MessageFactory> {
        &self.inner.factory
    }

    pub(crate) fn runtime(&self) -> &Handle {
        &self.inner.runtime
    }
}

impl std::fmt::Debug for TransportContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportContext")
            .field("puuid", &self.inner.puuid)
            .field("host", &self.host())
            .field("addr", &self.addr())
            .field("nodes", &self.node_count())
            .finish()
    }
}
