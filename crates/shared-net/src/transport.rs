//! The transport port and its error type.

use shared_types::Scope;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

/// Largest payload a single UDP datagram can carry over IPv4.
pub const MAX_DATAGRAM_SIZE: usize = 65507;

/// Inbound frames, in arrival order.
pub type InboundRx = mpsc::UnboundedReceiver<Vec<u8>>;

/// Datagram transport used by discovery and the buses.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; sends happen from caller threads
/// and from the dispatcher task concurrently.
pub trait NetworkTransport: Send + Sync {
    /// Address peers use to reach this process point to point.
    fn local_addr(&self) -> &str;

    /// Host name this process reports in frames.
    fn host(&self) -> &str;

    /// Send to every peer the scope allows. `Scope::Process` sends nothing.
    fn broadcast(&self, scope: Scope, bytes: &[u8]) -> Result<(), NetworkError>;

    /// Send to one peer.
    fn send_to(&self, addr: &str, bytes: &[u8]) -> Result<(), NetworkError>;
}

/// A bound transport plus its inbound frame stream.
pub struct NetworkHandle {
    pub transport: Arc<dyn NetworkTransport>,
    pub inbound: InboundRx,
}

impl std::fmt::Debug for NetworkHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkHandle")
            .field("addr", &self.transport.local_addr())
            .field("host", &self.transport.host())
            .finish()
    }
}

/// Errors from network operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetworkError {
    /// No route to the destination
    #[error("destination unreachable: {0}")]
    Unreachable(String),
    /// Payload exceeds the datagram limit
    #[error("message of {size} bytes exceeds maximum of {max}")]
    MessageTooLarge { size: usize, max: usize },
    /// Socket-level failure
    #[error("socket error: {0}")]
    Io(String),
}

impl From<std::io::Error> for NetworkError {
    fn from(err: std::io::Error) -> Self {
        NetworkError::Io(err.to_string())
    }
}

impl From<NetworkError> for shared_types::TransportError {
    fn from(err: NetworkError) -> Self {
        shared_types::TransportError::NetworkUnreachable(err.to_string())
    }
}
