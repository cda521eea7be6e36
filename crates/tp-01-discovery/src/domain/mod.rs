//! # Domain Layer
//!
//! Discovery state with no I/O: the per-topic publisher stores, the peer
//! table, timing configuration and the scope visibility rule.

pub mod config;
pub mod peers;
pub mod store;

pub use config::DiscoveryConfig;
pub use peers::{PeerInfo, PeerTable};
pub use store::{DiscoveryStore, StoreEntry};

use shared_types::Scope;

/// Whether an endpoint with `scope` may be seen by a peer.
///
/// Process-scoped endpoints are never visible outside their process,
/// host-scoped ones only on the same host.
#[must_use]
pub fn is_visible(scope: Scope, same_process: bool, same_host: bool) -> bool {
    scope.permits(same_process, same_host)
}
