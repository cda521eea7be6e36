//! # Ports Layer
//!
//! - **Driving (inbound):** [`DiscoveryApi`], what the node layer calls
//! - **Driven (outbound):** [`DiscoverySink`], [`TimeSource`] and
//!   [`DiscoveryListener`], what the host must provide

pub mod inbound;
pub mod outbound;

pub use inbound::DiscoveryApi;
pub use outbound::{DiscoveryEvent, DiscoveryListener, DiscoverySink, TimeSource};
