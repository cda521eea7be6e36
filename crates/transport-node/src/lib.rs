//! # Transport Node
//!
//! The user-facing layer of the topic transport.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐ ┌──────────┐
//! │  Node A  │ │  Node B  │      nodes of one process
//! └────┬─────┘ └────┬─────┘
//!      └─────┬──────┘
//!            ▼
//! ┌──────────────────────────────────────────────┐
//! │              TransportContext                │
//! │  ┌───────────┐ ┌─────────────┐ ┌───────────┐ │
//! │  │ Discovery │ │ Message Bus │ │Service Bus│ │
//! │  └─────▲─────┘ └──────▲──────┘ └─────▲─────┘ │
//! │        └───── Dispatcher task ───────┘       │
//! │                       ▲                      │
//! └───────────────────────┼──────────────────────┘
//!                         │ inbound frames
//!                 NetworkTransport
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use transport_node::{Node, TransportConfig, TransportContext};
//! use shared_types::msgs::Int32;
//! use shared_types::AdvertiseMessageOptions;
//!
//! let ctx = TransportContext::udp(TransportConfig::from_env())?;
//! let node = Node::new(&ctx);
//! node.subscribe::<Int32, _>("/counter", |msg| println!("{}", msg.data));
//! let counter = node.advertise::<Int32>("/counter", AdvertiseMessageOptions::new());
//! counter.publish(&Int32 { data: 1 });
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod config;
pub mod context;
mod dispatcher;
pub mod handle;
pub mod node;
mod router;

pub use config::{ConfigError, TransportConfig};
pub use context::TransportContext;
pub use handle::{PublisherHandle, PublisherState};
pub use node::Node;
pub use shared_bus::MessageInfo;
pub use tp_02_service_bus::ServiceOutcome;

/// Version of the transport crates.
#[must_use]
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
