//! # Wire Frames
//!
//! Every datagram exchanged between transport processes is one [`Frame`].
//!
//! ## Layout
//!
//! - **Versioning**: `version` is checked before the body is trusted.
//! - **Sender**: `sender` and `host` identify the emitting process; scope
//!   checks on the receiving side use them.
//! - **Body**: discovery traffic (broadcast) or data traffic (point to point).
//!
//! Frames are encoded with `bincode`.

use crate::errors::WireError;
use crate::ids::{NodeUuid, ProcessUuid, RequestId};
use crate::publisher::{EndpointKind, PublisherRecord};
use serde::{Deserialize, Serialize};

/// Current frame version.
pub const WIRE_VERSION: u16 = 1;

/// A versioned datagram.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    // =========================================================================
    // HEADER SECTION
    // =========================================================================
    /// Frame version. MUST be checked before processing.
    pub version: u16,

    /// Process that emitted the frame.
    pub sender: ProcessUuid,

    /// Host name of the emitting process.
    pub host: String,

    // =========================================================================
    // BODY SECTION
    // =========================================================================
    pub body: FrameBody,
}

/// Discovery or data traffic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameBody {
    Discovery(DiscoveryMessage),
    Data(DataMessage),
}

/// Messages broadcast (or answered) by the discovery engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiscoveryMessage {
    /// Announce or refresh an endpoint.
    Advertise(PublisherRecord),
    /// Withdraw an endpoint.
    Unadvertise {
        kind: EndpointKind,
        topic: String,
        puuid: ProcessUuid,
        nuuid: NodeUuid,
    },
    /// Ask matching publishers to re-advertise.
    Subscribe { kind: EndpointKind, topic: String },
    /// Liveness beacon.
    Heartbeat { addr: String },
    /// The sender is shutting down.
    Bye,
}

/// Outcome a responder reports back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseStatus {
    /// The handler ran and reported `success`.
    Handled { success: bool },
    /// No handler was registered for the addressed node.
    Unavailable,
}

/// Point-to-point traffic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataMessage {
    /// A subscriber process wants the publisher's payloads for `topic`.
    Connect {
        topic: String,
        subscriber_addr: String,
    },
    /// The subscriber process dropped its last subscription to `topic`.
    Disconnect { topic: String },
    /// A published payload.
    Publish {
        topic: String,
        msg_type_name: String,
        nuuid: NodeUuid,
        seq: u64,
        payload: Vec<u8>,
    },
    /// A service call addressed to one responder node.
    Request {
        id: RequestId,
        service: String,
        req_type_name: String,
        rep_type_name: String,
        responder: NodeUuid,
        reply_to: String,
        payload: Vec<u8>,
    },
    /// The answer to a `Request`.
    Response {
        id: RequestId,
        status: ResponseStatus,
        payload: Vec<u8>,
    },
}

impl Frame {
    #[must_use]
    pub fn new(sender: ProcessUuid, host: impl Into<String>, body: FrameBody) -> Self {
        Self {
            version: WIRE_VERSION,
            sender,
            host: host.into(),
            body,
        }
    }

    #[must_use]
    pub fn discovery(sender: ProcessUuid, host: impl Into<String>, msg: DiscoveryMessage) -> Self {
        Self::new(sender, host, FrameBody::Discovery(msg))
    }

    #[must_use]
    pub fn data(sender: ProcessUuid, host: impl Into<String>, msg: DataMessage) -> Self {
        Self::new(sender, host, FrameBody::Data(msg))
    }

    /// Serialize to bytes.
    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        bincode::serialize(self).map_err(|e| WireError::Encode(e.to_string()))
    }

    /// Deserialize and check the version.
    pub fn decode(bytes: &[u8]) -> Result<Self, WireError> {
        let frame: Frame =
            bincode::deserialize(bytes).map_err(|e| WireError::Decode(e.to_string()))?;
        if frame.version != WIRE_VERSION {
            return Err(WireError::UnsupportedVersion {
                received: frame.version,
                supported: WIRE_VERSION,
            });
        }
        Ok(frame)
    }
}
