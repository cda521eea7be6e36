//! # Publisher Discovery
//!
//! Tracks which processes publish which topics and services.
//!
//! Every process keeps two stores (message publishers and service
//! publishers) keyed by fully qualified name. Local advertisements are
//! broadcast within their scope and re-broadcast on every sweep. Remote
//! advertisements are upserted with a liveness timestamp and expire when
//! their process falls silent for `silence_multiplier` heartbeats.
//!
//! ## Architecture
//!
//! The crate follows Hexagonal Architecture with:
//! - **Domain Layer:** Stores, peer table, visibility rule
//! - **Ports Layer:** `DiscoveryApi` (driving), `DiscoverySink`,
//!   `TimeSource` and `DiscoveryListener` (driven)
//! - **Service Layer:** `DiscoveryService` wires domain to ports
//! - **Adapters Layer:** Frame sink over a `NetworkTransport`, clocks
//!
//! ## Example
//!
//! ```rust,ignore
//! use tp_01_discovery::{DiscoveryConfig, DiscoveryService, FrameSink, SystemTimeSource};
//!
//! let sink = FrameSink::new(network.transport.clone(), puuid);
//! let discovery = DiscoveryService::new(
//!     puuid,
//!     host,
//!     network.transport.local_addr(),
//!     DiscoveryConfig::default(),
//!     Arc::new(sink),
//!     Arc::new(SystemTimeSource),
//! );
//! discovery.advertise_message(publisher)?;
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::{ControllableTimeSource, FrameSink, SystemTimeSource};
pub use domain::{is_visible, DiscoveryConfig, DiscoveryStore, PeerInfo, PeerTable, StoreEntry};
pub use ports::{DiscoveryApi, DiscoveryEvent, DiscoveryListener, DiscoverySink, TimeSource};
pub use service::{DiscoveryService, DiscoveryStats, SweepReport};
