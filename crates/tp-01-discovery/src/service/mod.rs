//! # Service Layer
//!
//! [`DiscoveryService`] wires the domain stores to the ports.
//!
//! - `core`: construction, local advertise/unadvertise, queries
//! - `events`: inbound discovery messages from peers
//! - `maintenance`: periodic sweep, backoff, shutdown
//! - `api`: the [`DiscoveryApi`](crate::ports::DiscoveryApi) implementation

mod api;
mod core;
mod events;
mod maintenance;


pub use self::core::{DiscoveryService, DiscoveryStats, Tracked};
pub use self::maintenance::SweepReport;
