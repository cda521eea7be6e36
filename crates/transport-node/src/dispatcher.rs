//! # Inbound Dispatcher
//!
//! The single task that applies every frame a process receives: discovery
//! traffic, published payloads, connection control and service calls.
//!
//! Two queues feed it:
//! - **network**: raw datagrams from the transport, decoded here
//! - **local**: frames produced by this process's own buses
//!
//! Subscriber callbacks and service handlers therefore always run on this
//! task, never on the thread that published or requested.

use shared_bus::MessageBus;
use shared_net::InboundRx;
use shared_types::{DataMessage, Frame, FrameBody, ProcessUuid};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex as AsyncMutex};
use tp_01_discovery::DiscoveryService;
use tp_02_service_bus::ServiceBus;
use tracing::{debug, info, trace, warn};

/// Both inbound queues. Owned by whichever dispatcher is running.
pub(crate) struct Receivers {
    pub(crate) network: InboundRx,
    pub(crate) local: mpsc::UnboundedReceiver<Frame>,
}

/// Receivers shared across dispatcher restarts.
pub(crate) type SharedReceivers = Arc<AsyncMutex<Receivers>>;

#[derive(Clone)]
pub(crate) struct Dispatcher {
    pub(crate) puuid: ProcessUuid,
    pub(crate) discovery: Arc<DiscoveryService>,
    pub(crate) messages: Arc<MessageBus>,
    pub(crate) services: Arc<ServiceBus>,
}

impl Dispatcher {
    /// Apply frames until `shutdown` fires or both queues close.
    pub(crate) async fn run(self, receivers: SharedReceivers, mut shutdown: watch::Receiver<bool>) {
        let mut guard = receivers.lock().await;
        let Receivers { network, local } = &mut *guard;
        info!(puuid = %self.puuid, "[dispatcher] started");

        loop {
            tokio::select! {
                // Local frames first: they were produced before anything
                // this process has not yet read off the network.
                biased;

                frame = local.recv() => match frame {
                    Some(frame) => self.dispatch(frame),
                    None => break,
                },
                bytes = network.recv() => match bytes {
                    Some(bytes) => self.on_datagram(&bytes),
                    None => break,
                },
                _ = shutdown.changed() => {
                    debug!("[dispatcher] shutdown signal received");
                    break;
                }
            }
        }

        info!(puuid = %self.puuid, "[dispatcher] stopped");
    }

    fn on_datagram(&self, bytes: &[u8]) {
        let frame = match Frame::decode(bytes) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(len = bytes.len(), error = %e, "[dispatcher] undecodable frame dropped");
                return;
            }
        };
        // Multicast loops our own broadcasts back to us
        if frame.sender == self.puuid {
            trace!("[dispatcher] own frame skipped");
            return;
        }
        self.dispatch(frame);
    }

    pub(crate) fn dispatch(&self, frame: Frame) {
        let Frame {
            sender, host, body, ..
        } = frame;
        match body {
            FrameBody::Discovery(msg) => self.discovery.handle(sender, &host, msg),
            FrameBody::Data(DataMessage::Publish {
                topic,
                msg_type_name,
                nuuid,
                seq,
                payload,
            }) => {
                self.messages
                    .on_publish(sender, &topic, &msg_type_name, nuuid, seq, &payload);
            }
            FrameBody::Data(DataMessage::Connect {
                topic,
                subscriber_addr,
            }) => self
                .messages
                .on_connect(sender, &host, &topic, &subscriber_addr),
            FrameBody::Data(DataMessage::Disconnect { topic }) => {
                self.messages.on_disconnect(sender, &topic);
            }
            FrameBody::Data(msg) => {
                self.services.handle(sender, &host, msg);
            }
        }
    }
}

/// Periodic discovery maintenance plus pending-request cleanup.
///
/// Sweeps once immediately so peers hear our heartbeat without waiting a
/// full interval.
pub(crate) async fn run_sweeper(
    discovery: Arc<DiscoveryService>,
    services: Arc<ServiceBus>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut delay = Duration::ZERO;
    loop {
        tokio::select! {
            () = tokio::time::sleep(delay) => {
                let report = discovery.sweep();
                let stale = services.sweep();
                if report.lost_peers > 0 || stale > 0 {
                    debug!(lost_peers = report.lost_peers, stale, "[sweeper] cleaned up");
                }
                delay = discovery.next_sweep_delay();
            }
            _ = shutdown.changed() => break,
        }
    }
    debug!("[sweeper] stopped");
}
