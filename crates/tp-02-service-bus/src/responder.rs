//! # Service Responder
//!
//! Local responder registration and inbound request/response handling.
//! Handlers run on the dispatcher thread with the dispatch flag set; the
//! table lock is released before a handler is invoked.

use crate::requester::ServiceBus;
use crate::responders::Responder;
use shared_bus::DispatchFlag;
use shared_types::{
    DataMessage, Frame, NodeUuid, ProcessUuid, RequestId, ResponseStatus, TransportError,
};
use std::sync::atomic::Ordering;
use tracing::{debug, trace, warn};

impl ServiceBus {
    /// Offer `service` from node `nuuid`.
    ///
    /// # Errors
    ///
    /// `DuplicateRegistration` if the node already offers it.
    pub fn advertise(
        &self,
        service: &str,
        nuuid: NodeUuid,
        responder: Responder,
    ) -> Result<(), TransportError> {
        self.responders.insert(service, self.puuid, nuuid, responder)?;
        debug!(service = %service, nuuid = %nuuid, "[service] responder registered");
        Ok(())
    }

    /// Withdraw a node's responder. In-flight requests for it are answered
    /// `Unavailable`.
    pub fn unadvertise(&self, service: &str, nuuid: NodeUuid) -> bool {
        self.responders.remove(service, nuuid)
    }

    /// Services `nuuid` offers (fully qualified).
    pub fn advertised_services(&self, nuuid: NodeUuid) -> Vec<String> {
        self.responders.services_for_node(nuuid)
    }

    /// A node is going away: drop its responders and fail its outstanding
    /// requests with `NoResponder`. Requests it starts afterwards fail the
    /// same way.
    pub fn remove_node(&self, nuuid: NodeUuid) -> Vec<String> {
        self.retired.insert(nuuid);
        let cancelled = self.pending.cancel_for_node(nuuid);
        if cancelled > 0 {
            debug!(nuuid = %nuuid, cancelled, "[service] cancelled requests of destroyed node");
        }
        self.responders.remove_node(nuuid)
    }

    /// A remote process is gone: requests waiting on it cannot complete.
    pub fn on_process_lost(&self, puuid: ProcessUuid) -> usize {
        self.pending.cancel_for_process(puuid)
    }

    // =========================================================================
    // INBOUND
    // =========================================================================

    /// Apply a service frame. Returns false for non-service messages.
    pub fn handle(&self, sender: ProcessUuid, host: &str, msg: DataMessage) -> bool {
        match msg {
            DataMessage::Request {
                id,
                service,
                req_type_name,
                rep_type_name,
                responder,
                reply_to,
                payload,
            } => {
                let (status, reply) = self.serve(
                    sender,
                    host,
                    &service,
                    &req_type_name,
                    &rep_type_name,
                    responder,
                    &payload,
                );
                self.respond(sender, &reply_to, id, status, reply);
                true
            }
            DataMessage::Response {
                id,
                status,
                payload,
            } => {
                if !self.pending.complete(id, status, payload) {
                    trace!(request_id = %id, "[service] late or unknown response");
                }
                true
            }
            _ => false,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn serve(
        &self,
        sender: ProcessUuid,
        host: &str,
        service: &str,
        req_type_name: &str,
        rep_type_name: &str,
        nuuid: NodeUuid,
        payload: &[u8],
    ) -> (ResponseStatus, Vec<u8>) {
        let same_process = sender == self.puuid;
        let same_host = host == self.transport.host();
        let responder = self.responders.get(service, nuuid).filter(|r| {
            r.accepts(req_type_name, rep_type_name) && r.scope.permits(same_process, same_host)
        });

        let Some(responder) = responder else {
            debug!(service = %service, nuuid = %nuuid, "[service] no responder for request");
            self.counters.unavailable.fetch_add(1, Ordering::Relaxed);
            return (ResponseStatus::Unavailable, Vec::new());
        };

        let (reply, success) = {
            let _flag = DispatchFlag::set();
            (responder.handler)(payload)
        };
        self.counters.served.fetch_add(1, Ordering::Relaxed);
        (ResponseStatus::Handled { success }, reply)
    }

    fn respond(
        &self,
        requester: ProcessUuid,
        reply_to: &str,
        id: RequestId,
        status: ResponseStatus,
        payload: Vec<u8>,
    ) {
        let msg = DataMessage::Response {
            id,
            status,
            payload,
        };
        let sent = if requester == self.puuid {
            self.local
                .send(Frame::data(self.puuid, self.transport.host(), msg))
                .map_err(|_| TransportError::NetworkUnreachable("dispatcher stopped".into()))
        } else {
            self.send_data(reply_to, msg)
        };

        if let Err(e) = sent {
            warn!(
                request_id = %id,
                reply_to = %reply_to,
                error = %e,
                "[service] response send failed"
            );
            self.counters.send_failures.fetch_add(1, Ordering::Relaxed);
        }
    }
}
