//! # Service Requester
//!
//! The bus itself and the requesting side of a call.
//!
//! ```text
//! Sent ──reply──────────▶ Replied
//!   │──timeout──────────▶ TimedOut
//!   └──cancel/no target─▶ NoResponder
//! ```
//!
//! The responder is chosen once, at send time, from the discovery snapshot
//! the caller passes in. A request is never retried against another
//! responder.

use crate::outcome::ServiceOutcome;
use crate::pending::{PendingRequestStore, ServiceReply};
use crate::responders::ResponderTable;
use crate::selection::RoundRobin;
use dashmap::DashSet;
use shared_bus::LocalSender;
use shared_net::NetworkTransport;
use shared_types::{
    DataMessage, Endpoint, Frame, NodeUuid, ProcessUuid, RequestId, ResponseStatus,
    ServicePublisher, TransportError,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, warn};
use transport_telemetry::metric_inc;
use transport_telemetry::metrics::{SERVICE_REQUESTS, SERVICE_REQUEST_DURATION};
use transport_telemetry::time_histogram;

#[derive(Default)]
pub(crate) struct ServiceCounters {
    pub(crate) requests: AtomicU64,
    pub(crate) replied: AtomicU64,
    pub(crate) timed_out: AtomicU64,
    pub(crate) no_responder: AtomicU64,
    pub(crate) served: AtomicU64,
    pub(crate) unavailable: AtomicU64,
    pub(crate) send_failures: AtomicU64,
}

/// Point-in-time service bus statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServiceStats {
    pub requests: u64,
    pub replied: u64,
    pub timed_out: u64,
    pub no_responder: u64,
    /// Requests answered by local responders.
    pub served: u64,
    /// Requests answered with `Unavailable`.
    pub unavailable: u64,
    pub send_failures: u64,
    pub pending: usize,
}

/// Process-wide service bus.
pub struct ServiceBus {
    pub(crate) puuid: ProcessUuid,
    pub(crate) transport: Arc<dyn NetworkTransport>,
    pub(crate) local: LocalSender,
    pub(crate) responders: ResponderTable,
    pub(crate) pending: PendingRequestStore,
    pub(crate) selector: RoundRobin,
    pub(crate) counters: ServiceCounters,
    /// Nodes that went through `remove_node`; they may not start requests.
    pub(crate) retired: DashSet<NodeUuid>,
}

impl ServiceBus {
    /// Create a bus sending through `transport`. Requests and responses
    /// between nodes of this process travel over `local`.
    pub fn new(
        puuid: ProcessUuid,
        transport: Arc<dyn NetworkTransport>,
        local: LocalSender,
    ) -> Self {
        Self {
            puuid,
            transport,
            local,
            responders: ResponderTable::new(),
            pending: PendingRequestStore::new(),
            selector: RoundRobin::new(),
            counters: ServiceCounters::default(),
            retired: DashSet::new(),
        }
    }

    /// Call `service` on one of `candidates` and wait for the outcome.
    ///
    /// `candidates` is the discovery snapshot for the service. An empty or
    /// type-incompatible snapshot yields `NoResponder` immediately.
    #[allow(clippy::too_many_arguments)]
    pub async fn request(
        &self,
        requester: NodeUuid,
        service: &str,
        req_type_name: &str,
        rep_type_name: &str,
        payload: Vec<u8>,
        candidates: Vec<ServicePublisher>,
        timeout: Duration,
    ) -> ServiceOutcome<Vec<u8>> {
        let _timer = time_histogram!(SERVICE_REQUEST_DURATION);
        self.counters.requests.fetch_add(1, Ordering::Relaxed);

        let outcome = match self.send_request(
            requester,
            service,
            req_type_name,
            rep_type_name,
            payload,
            candidates,
            timeout,
        ) {
            Some((id, rx)) => self.await_reply(service, id, rx, timeout).await,
            None => ServiceOutcome::NoResponder,
        };

        let counter = match outcome {
            ServiceOutcome::Replied { .. } => &self.counters.replied,
            ServiceOutcome::TimedOut => &self.counters.timed_out,
            ServiceOutcome::NoResponder => &self.counters.no_responder,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        metric_inc!(SERVICE_REQUESTS, &[outcome.label()]);
        outcome
    }

    #[allow(clippy::too_many_arguments)]
    fn send_request(
        &self,
        requester: NodeUuid,
        service: &str,
        req_type_name: &str,
        rep_type_name: &str,
        payload: Vec<u8>,
        candidates: Vec<ServicePublisher>,
        timeout: Duration,
    ) -> Option<(RequestId, oneshot::Receiver<ServiceReply>)> {
        let Some(target) = self
            .selector
            .select(service, req_type_name, rep_type_name, candidates)
        else {
            debug!(service = %service, "[service] no matching responder");
            return None;
        };

        let (target_puuid, target_nuuid) = target.key();
        let (id, rx) = self
            .pending
            .register(service, requester, target_puuid, timeout);
        // Checked after registering so a concurrent remove_node either
        // cancels this entry or is seen here
        if self.retired.contains(&requester) {
            debug!(service = %service, nuuid = %requester, "[service] requester already removed");
            self.pending.cancel(&id);
            return None;
        }
        let msg = DataMessage::Request {
            id,
            service: service.to_string(),
            req_type_name: req_type_name.to_string(),
            rep_type_name: rep_type_name.to_string(),
            responder: target_nuuid,
            reply_to: self.transport.local_addr().to_string(),
            payload,
        };

        let sent = if target_puuid == self.puuid {
            self.local
                .send(Frame::data(self.puuid, self.transport.host(), msg))
                .map_err(|_| TransportError::NetworkUnreachable("dispatcher stopped".into()))
        } else {
            self.send_data(target.publisher().addr(), msg)
        };

        match sent {
            Ok(()) => {
                debug!(
                    service = %service,
                    request_id = %id,
                    responder = %target_nuuid,
                    "[service] request sent"
                );
                Some((id, rx))
            }
            Err(e) => {
                warn!(
                    service = %service,
                    addr = %target.publisher().addr(),
                    error = %e,
                    "[service] request send failed"
                );
                self.counters.send_failures.fetch_add(1, Ordering::Relaxed);
                self.pending.cancel(&id);
                None
            }
        }
    }

    async fn await_reply(
        &self,
        service: &str,
        id: RequestId,
        rx: oneshot::Receiver<ServiceReply>,
        timeout: Duration,
    ) -> ServiceOutcome<Vec<u8>> {
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(reply)) => match reply.status {
                ResponseStatus::Handled { success } => ServiceOutcome::Replied {
                    reply: reply.payload,
                    result: success,
                },
                ResponseStatus::Unavailable => {
                    debug!(service = %service, request_id = %id, "[service] responder unavailable");
                    ServiceOutcome::NoResponder
                }
            },
            // Cancelled: requesting node destroyed or responder process lost
            Ok(Err(_)) => ServiceOutcome::NoResponder,
            Err(_) => {
                self.pending.expire(&id);
                debug!(service = %service, request_id = %id, "[service] request timed out");
                ServiceOutcome::TimedOut
            }
        }
    }

    pub(crate) fn send_data(&self, addr: &str, msg: DataMessage) -> Result<(), TransportError> {
        let bytes = Frame::data(self.puuid, self.transport.host(), msg)
            .encode()
            .map_err(|e| TransportError::MalformedInput(e.to_string()))?;
        self.transport.send_to(addr, &bytes)?;
        Ok(())
    }

    /// Drop stale pending entries left by callers that stopped waiting.
    pub fn sweep(&self) -> usize {
        self.pending.remove_expired()
    }

    pub fn puuid(&self) -> ProcessUuid {
        self.puuid
    }

    pub fn pending(&self) -> &PendingRequestStore {
        &self.pending
    }

    pub fn stats(&self) -> ServiceStats {
        ServiceStats {
            requests: self.counters.requests.load(Ordering::Relaxed),
            replied: self.counters.replied.load(Ordering::Relaxed),
            timed_out: self.counters.timed_out.load(Ordering::Relaxed),
            no_responder: self.counters.no_responder.load(Ordering::Relaxed),
            served: self.counters.served.load(Ordering::Relaxed),
            unavailable: self.counters.unavailable.load(Ordering::Relaxed),
            send_failures: self.counters.send_failures.load(Ordering::Relaxed),
            pending: self.pending.pending_count(),
        }
    }
}
