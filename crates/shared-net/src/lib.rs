//! # Shared Net
//!
//! The datagram boundary the transport core sends through.
//!
//! The core never touches sockets. It talks to a [`NetworkTransport`] and
//! reads inbound frames from the receiver in [`NetworkHandle`]. Delivery is
//! best-effort: frames may be lost or arrive out of order on real networks.
//!
//! ## Adapters
//!
//! - [`LoopbackNetwork`]: in-memory hub. Every `bind` is one simulated
//!   process on a named host, which lets tests exercise scope rules.
//! - [`UdpTransport`]: IPv4 multicast for discovery plus a unicast data
//!   socket per process.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod loopback;
pub mod transport;
pub mod udp;

pub use loopback::{LoopbackEndpoint, LoopbackNetwork};
pub use transport::{InboundRx, NetworkError, NetworkHandle, NetworkTransport, MAX_DATAGRAM_SIZE};
pub use udp::{UdpConfig, UdpTransport};

/// Best-effort local host name.
#[must_use]
pub fn local_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}
