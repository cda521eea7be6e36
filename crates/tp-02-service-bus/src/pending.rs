//! Pending Request Store - correlates service responses with waiting callers.
//!
//! Flow:
//! 1. The requester calls `register()` and gets a `RequestId` plus a oneshot receiver
//! 2. The request frame carries the id to the responder
//! 3. The inbound dispatcher receives the response and calls `complete()`
//! 4. The requester awaits the receiver or times out
//!
//! Dropping an entry without completing it closes the receiver; the
//! requester reads that as "no responder".

use dashmap::DashMap;
use shared_types::{NodeUuid, ProcessUuid, RequestId, ResponseStatus};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// What a responder sent back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceReply {
    pub status: ResponseStatus,
    pub payload: Vec<u8>,
    /// Time between registration and completion.
    pub elapsed: Duration,
}

/// A request waiting for its response.
struct PendingRequest {
    /// Channel to hand the response to the requester
    sender: oneshot::Sender<ServiceReply>,
    /// Node that issued the request
    requester: NodeUuid,
    /// Process hosting the chosen responder
    target: ProcessUuid,
    /// Service name (for logging)
    service: String,
    created_at: Instant,
    timeout: Duration,
}

/// Statistics for the pending request store
#[derive(Debug, Default)]
pub struct PendingStats {
    /// Total requests registered
    pub total_registered: AtomicU64,
    /// Total requests completed
    pub total_completed: AtomicU64,
    /// Total requests timed out or swept as stale
    pub total_timeouts: AtomicU64,
    /// Total requests cancelled (node gone, process lost, caller gave up)
    pub total_cancelled: AtomicU64,
}

/// Outstanding service requests of one process.
#[derive(Default)]
pub struct PendingRequestStore {
    pending: DashMap<RequestId, PendingRequest>,
    stats: PendingStats,
}

impl PendingRequestStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pending request and get a receiver for the response.
    pub fn register(
        &self,
        service: &str,
        requester: NodeUuid,
        target: ProcessUuid,
        timeout: Duration,
    ) -> (RequestId, oneshot::Receiver<ServiceReply>) {
        let id = RequestId::new();
        let (tx, rx) = oneshot::channel();

        self.pending.insert(
            id,
            PendingRequest {
                sender: tx,
                requester,
                target,
                service: service.to_string(),
                created_at: Instant::now(),
                timeout,
            },
        );
        self.stats.total_registered.fetch_add(1, Ordering::Relaxed);

        debug!(
            request_id = %id,
            service = %service,
            target = %target,
            "Registered pending request"
        );

        (id, rx)
    }

    /// Complete a pending request with a response.
    ///
    /// Returns true if the request was found and its requester still waits.
    pub fn complete(&self, id: RequestId, status: ResponseStatus, payload: Vec<u8>) -> bool {
        let Some((_, pending)) = self.pending.remove(&id) else {
            warn!(request_id = %id, "Response for unknown or expired request");
            return false;
        };

        let elapsed = pending.created_at.elapsed();
        let reply = ServiceReply {
            status,
            payload,
            elapsed,
        };

        match pending.sender.send(reply) {
            Ok(()) => {
                self.stats.total_completed.fetch_add(1, Ordering::Relaxed);
                debug!(
                    request_id = %id,
                    service = %pending.service,
                    response_time_ms = elapsed.as_millis(),
                    "Completed pending request"
                );
                true
            }
            Err(_) => {
                // Requester stopped waiting
                self.stats.total_cancelled.fetch_add(1, Ordering::Relaxed);
                debug!(
                    request_id = %id,
                    service = %pending.service,
                    "Pending request receiver dropped"
                );
                false
            }
        }
    }

    /// Forget a request whose requester timed out.
    pub fn expire(&self, id: &RequestId) -> bool {
        if self.pending.remove(id).is_some() {
            self.stats.total_timeouts.fetch_add(1, Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    /// Cancel a pending request. The requester observes no responder.
    pub fn cancel(&self, id: &RequestId) -> bool {
        if self.pending.remove(id).is_some() {
            self.stats.total_cancelled.fetch_add(1, Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    /// Cancel every request issued by a node that is being destroyed.
    pub fn cancel_for_node(&self, requester: NodeUuid) -> usize {
        self.cancel_where(|request| request.requester == requester)
    }

    /// Cancel every request waiting on a process that went away.
    pub fn cancel_for_process(&self, target: ProcessUuid) -> usize {
        self.cancel_where(|request| request.target == target)
    }

    fn cancel_where(&self, predicate: impl Fn(&PendingRequest) -> bool) -> usize {
        let mut cancelled = 0;
        self.pending.retain(|id, request| {
            if predicate(request) {
                debug!(request_id = %id, service = %request.service, "Cancelling pending request");
                cancelled += 1;
                false
            } else {
                true
            }
        });
        self.stats
            .total_cancelled
            .fetch_add(cancelled as u64, Ordering::Relaxed);
        cancelled
    }

    /// Remove requests whose timeout passed without anyone collecting them.
    ///
    /// Returns the number of requests removed.
    pub fn remove_expired(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;

        self.pending.retain(|id, request| {
            let elapsed = now.duration_since(request.created_at);
            if elapsed > request.timeout {
                warn!(
                    request_id = %id,
                    service = %request.service,
                    elapsed_ms = elapsed.as_millis(),
                    timeout_ms = request.timeout.as_millis(),
                    "Removing expired pending request"
                );
                self.stats.total_timeouts.fetch_add(1, Ordering::Relaxed);
                removed += 1;
                false
            } else {
                true
            }
        });

        removed
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, id: &RequestId) -> bool {
        self.pending.contains_key(id)
    }

    pub fn stats(&self) -> &PendingStats {
        &self.stats
    }
}
