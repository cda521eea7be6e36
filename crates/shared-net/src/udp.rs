//! UDP adapter.
//!
//! Discovery frames go to an IPv4 multicast group; data frames go point to
//! point to each process's ephemeral data socket. `Scope::Host` broadcasts
//! use a multicast TTL of zero so they never leave the machine.

use crate::transport::{NetworkError, NetworkHandle, NetworkTransport, MAX_DATAGRAM_SIZE};
use shared_types::Scope;
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket as StdUdpSocket};
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

/// Default discovery multicast group.
pub const DEFAULT_MULTICAST_GROUP: Ipv4Addr = Ipv4Addr::new(239, 255, 0, 7);

/// Default discovery port.
pub const DEFAULT_DISCOVERY_PORT: u16 = 11319;

/// UDP transport settings.
#[derive(Debug, Clone)]
pub struct UdpConfig {
    pub multicast_group: Ipv4Addr,
    pub discovery_port: u16,
    /// Interface to join the group on. `UNSPECIFIED` lets the OS choose.
    pub interface: Ipv4Addr,
    pub multicast_ttl: u32,
    /// Host name override. Defaults to the system host name.
    pub host: Option<String>,
}

impl Default for UdpConfig {
    fn default() -> Self {
        Self {
            multicast_group: DEFAULT_MULTICAST_GROUP,
            discovery_port: DEFAULT_DISCOVERY_PORT,
            interface: Ipv4Addr::UNSPECIFIED,
            multicast_ttl: 1,
            host: None,
        }
    }
}

/// Multicast discovery plus a unicast data socket.
pub struct UdpTransport {
    group: SocketAddr,
    all_socket: StdUdpSocket,
    host_socket: StdUdpSocket,
    data_socket: Arc<StdUdpSocket>,
    addr: String,
    host: String,
    tasks: Vec<JoinHandle<()>>,
}

impl UdpTransport {
    /// Open the sockets and start forwarding inbound datagrams.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn bind(config: UdpConfig) -> Result<NetworkHandle, NetworkError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| NetworkError::Io("no tokio runtime available".to_string()))?;
        let _guard = runtime.enter();

        if !config.multicast_group.is_multicast() {
            return Err(NetworkError::Io(format!(
                "{} is not a multicast group",
                config.multicast_group
            )));
        }

        let discovery = UdpSocket::from_std(multicast_listener(&config)?)?;
        let all_socket = multicast_sender(config.interface, config.multicast_ttl)?;
        let host_socket = multicast_sender(config.interface, 0)?;

        let data_std = StdUdpSocket::bind(SocketAddrV4::new(config.interface, 0))?;
        data_std.set_nonblocking(true)?;
        let data_recv = UdpSocket::from_std(data_std.try_clone()?)?;
        let port = data_std.local_addr()?.port();
        let ip = if config.interface.is_unspecified() {
            detect_local_ip()
        } else {
            config.interface
        };
        let addr = format!("udp://{ip}:{port}");
        let host = config.host.clone().unwrap_or_else(crate::local_hostname);

        let (tx, rx) = mpsc::unbounded_channel();
        let tasks = vec![
            runtime.spawn(forward(discovery, tx.clone(), "discovery")),
            runtime.spawn(forward(data_recv, tx, "data")),
        ];

        debug!(
            "[udp] bound {} (group {}:{}, host {})",
            addr, config.multicast_group, config.discovery_port, host
        );

        Ok(NetworkHandle {
            transport: Arc::new(Self {
                group: SocketAddr::V4(SocketAddrV4::new(
                    config.multicast_group,
                    config.discovery_port,
                )),
                all_socket,
                host_socket,
                data_socket: Arc::new(data_std),
                addr,
                host,
                tasks,
            }),
            inbound: rx,
        })
    }

    fn check_size(bytes: &[u8]) -> Result<(), NetworkError> {
        if bytes.len() > MAX_DATAGRAM_SIZE {
            return Err(NetworkError::MessageTooLarge {
                size: bytes.len(),
                max: MAX_DATAGRAM_SIZE,
            });
        }
        Ok(())
    }
}

impl NetworkTransport for UdpTransport {
    fn local_addr(&self) -> &str {
        &self.addr
    }

    fn host(&self) -> &str {
        &self.host
    }

    fn broadcast(&self, scope: Scope, bytes: &[u8]) -> Result<(), NetworkError> {
        Self::check_size(bytes)?;
        let socket = match scope {
            Scope::Process => return Ok(()),
            Scope::Host => &self.host_socket,
            Scope::All => &self.all_socket,
        };
        socket
            .send_to(bytes, self.group)
            .map(|_| ())
            .map_err(|e| map_send_error(e, &self.group.to_string()))
    }

    fn send_to(&self, addr: &str, bytes: &[u8]) -> Result<(), NetworkError> {
        Self::check_size(bytes)?;
        let target: SocketAddr = addr
            .strip_prefix("udp://")
            .and_then(|a| a.parse().ok())
            .ok_or_else(|| NetworkError::Unreachable(addr.to_string()))?;
        self.data_socket
            .send_to(bytes, target)
            .map(|_| ())
            .map_err(|e| map_send_error(e, addr))
    }
}

impl Drop for UdpTransport {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

fn map_send_error(err: io::Error, addr: &str) -> NetworkError {
    match err.kind() {
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::InvalidInput
        | io::ErrorKind::AddrNotAvailable => NetworkError::Unreachable(addr.to_string()),
        _ => NetworkError::Io(err.to_string()),
    }
}

fn multicast_listener(config: &UdpConfig) -> Result<StdUdpSocket, NetworkError> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    #[cfg(unix)]
    socket.set_reuse_port(true)?;
    socket.bind(&SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, config.discovery_port).into())?;
    socket.join_multicast_v4(&config.multicast_group, &config.interface)?;
    socket.set_multicast_loop_v4(true)?;
    socket.set_nonblocking(true)?;
    Ok(socket.into())
}

fn multicast_sender(interface: Ipv4Addr, ttl: u32) -> Result<StdUdpSocket, NetworkError> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_multicast_ttl_v4(ttl)?;
    socket.set_multicast_loop_v4(true)?;
    if !interface.is_unspecified() {
        socket.set_multicast_if_v4(&interface)?;
    }
    socket.bind(&SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0).into())?;
    socket.set_nonblocking(true)?;
    Ok(socket.into())
}

/// Address of the interface holding the default route. No packet is sent.
fn detect_local_ip() -> Ipv4Addr {
    StdUdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
        .and_then(|s| {
            s.connect((Ipv4Addr::new(10, 255, 255, 255), 1))?;
            s.local_addr()
        })
        .ok()
        .and_then(|a| match a {
            SocketAddr::V4(v4) if !v4.ip().is_unspecified() => Some(*v4.ip()),
            _ => None,
        })
        .unwrap_or(Ipv4Addr::LOCALHOST)
}

async fn forward(socket: UdpSocket, tx: mpsc::UnboundedSender<Vec<u8>>, label: &'static str) {
    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE + 1];
    loop {
        match socket.recv_from(&mut buf).await {
            Ok((len, from)) => {
                trace!("[udp] {} datagram of {} bytes from {}", label, len, from);
                if tx.send(buf[..len].to_vec()).is_err() {
                    break;
                }
            }
            Err(e) => {
                warn!("[udp] {} receive failed: {}", label, e);
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            }
        }
    }
}
