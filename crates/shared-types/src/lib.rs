//! # Shared Types Crate
//!
//! Types every transport component agrees on: process and node identities,
//! publisher metadata, advertise/subscribe options, fully qualified topic
//! names, the versioned wire frame and the message codec abstraction.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: discovery, the buses and the node layer all
//!   exchange these types, never their own copies.
//! - **Opaque Payloads**: the buses only move bytes. Typed messages cross the
//!   boundary through [`Message`] and [`MessageFactory`].
//! - **Versioned Frames**: every datagram is a [`Frame`] carrying
//!   [`wire::WIRE_VERSION`].

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod errors;
pub mod ids;
pub mod message;
pub mod msgs;
pub mod options;
pub mod publisher;
pub mod rate_limiter;
pub mod snapshot;
pub mod topic;
pub mod wire;

pub use errors::*;
pub use ids::{NodeUuid, ProcessUuid, RequestId};
pub use message::{DynMessage, Message, MessageFactory};
pub use options::{
    AdvertiseMessageOptions, AdvertiseOptions, AdvertiseServiceOptions, NodeOptions, Scope,
    SubscribeOptions,
};
pub use publisher::{
    Endpoint, EndpointKind, MessagePublisher, Publisher, PublisherRecord, ServicePublisher,
};
pub use rate_limiter::Throttle;
pub use snapshot::Snapshot;
pub use wire::{DataMessage, DiscoveryMessage, Frame, FrameBody, ResponseStatus};
