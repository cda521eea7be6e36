//! Discovery sink over a [`NetworkTransport`].

use crate::ports::DiscoverySink;
use shared_net::NetworkTransport;
use shared_types::{DiscoveryMessage, Frame, ProcessUuid, Scope, TransportError};
use std::sync::Arc;

/// Wraps each discovery message in a [`Frame`] and broadcasts it.
pub struct FrameSink {
    transport: Arc<dyn NetworkTransport>,
    puuid: ProcessUuid,
}

impl FrameSink {
    pub fn new(transport: Arc<dyn NetworkTransport>, puuid: ProcessUuid) -> Self {
        Self { transport, puuid }
    }
}

impl DiscoverySink for FrameSink {
    fn broadcast(&self, scope: Scope, msg: &DiscoveryMessage) -> Result<(), TransportError> {
        if scope == Scope::Process {
            return Ok(());
        }
        let bytes = Frame::discovery(self.puuid, self.transport.host(), msg.clone())
            .encode()
            .map_err(|e| TransportError::MalformedInput(e.to_string()))?;
        self.transport.broadcast(scope, &bytes)?;
        Ok(())
    }
}
