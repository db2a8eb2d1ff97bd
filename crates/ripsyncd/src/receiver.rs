//! Datagram reception and decoding
//!
//! The receive task owns the socket, decodes every datagram and hands the
//! resulting advertisements to the reconciler over a bounded queue. A full
//! queue blocks the task, which pushes back on the socket instead of
//! buffering without limit.

use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use async_trait::async_trait;
use ripsync_common::{RipsyncError, RipsyncResult};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, trace, warn};

use crate::packet::{self, DecodeError};
use crate::types::{Advertisement, RECEIVE_ERROR_BACKOFF, RECV_BUFFER_SIZE};

/// Source of received datagrams with their sender
#[async_trait]
pub trait DatagramSource: Send {
    /// Wait for the next datagram, writing it into `buf`
    async fn recv_from(&mut self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)>;
}

/// UDP socket source, normally bound to the RIP port and joined to the
/// RIP-v2 multicast group
#[derive(Debug)]
pub struct UdpDatagramSource {
    socket: UdpSocket,
}

impl UdpDatagramSource {
    /// Bind `listen:port` and join `group` on the named interface.
    ///
    /// Must be called from within a tokio runtime.
    #[instrument]
    pub fn bind_multicast(
        listen: Ipv4Addr,
        port: u16,
        group: Ipv4Addr,
        interface: &str,
    ) -> RipsyncResult<Self> {
        let iface_addr = interface_ipv4(interface)?;

        let socket = std::net::UdpSocket::bind(SocketAddrV4::new(listen, port))
            .map_err(|e| RipsyncError::socket(format!("bind {}:{}", listen, port), e))?;
        socket
            .join_multicast_v4(&group, &iface_addr)
            .map_err(|e| RipsyncError::socket(format!("join {} on {}", group, interface), e))?;
        socket
            .set_nonblocking(true)
            .map_err(|e| RipsyncError::socket("set non-blocking", e))?;
        let socket =
            UdpSocket::from_std(socket).map_err(|e| RipsyncError::socket("register socket", e))?;

        info!(
            %listen,
            port,
            %group,
            interface,
            %iface_addr,
            "Listening for RIP-v2 advertisements"
        );

        Ok(Self { socket })
    }

    /// Local address of the socket
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

impl From<UdpSocket> for UdpDatagramSource {
    fn from(socket: UdpSocket) -> Self {
        Self { socket }
    }
}

#[async_trait]
impl DatagramSource for UdpDatagramSource {
    async fn recv_from(&mut self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        self.socket.recv_from(buf).await
    }
}

/// Resolve the first IPv4 address of a network interface
pub fn interface_ipv4(name: &str) -> RipsyncResult<Ipv4Addr> {
    let addrs = nix::ifaddrs::getifaddrs()
        .map_err(|e| RipsyncError::socket("getifaddrs", io::Error::from(e)))?;

    addrs
        .filter(|ifaddr| ifaddr.interface_name == name)
        .find_map(|ifaddr| {
            ifaddr
                .address
                .as_ref()
                .and_then(|addr| addr.as_sockaddr_in())
                .map(|sin| Ipv4Addr::from(sin.ip()))
        })
        .ok_or_else(|| RipsyncError::interface_not_found(name))
}

/// Decode one datagram and tag its entries with the sender.
///
/// Problems are logged and yield no advertisements.
pub fn process_datagram(payload: &[u8], from: SocketAddr) -> Vec<Advertisement> {
    let source = match from {
        SocketAddr::V4(addr) => *addr.ip(),
        SocketAddr::V6(addr) => {
            warn!(from = %addr, "Discarding datagram from non-IPv4 sender");
            return Vec::new();
        }
    };

    match packet::decode(payload) {
        Ok(entries) => {
            trace!(%source, count = entries.len(), "Decoded RIP response");
            entries
                .into_iter()
                .map(|entry| entry.advertised_by(source))
                .collect()
        }
        Err(e @ DecodeError::NotRipV2 { .. }) => {
            warn!(%source, error = %e, "Not a RIP-v2 packet, discarding");
            Vec::new()
        }
        Err(e) => {
            warn!(%source, error = %e, "Malformed packet, discarding");
            Vec::new()
        }
    }
}

/// Receive, decode and forward advertisements until the queue closes.
///
/// Receive errors are logged and retried after a short pause.
pub async fn run_receiver<S: DatagramSource>(
    mut source: S,
    tx: mpsc::Sender<Advertisement>,
) -> RipsyncResult<()> {
    let mut buf = vec![0u8; RECV_BUFFER_SIZE];

    loop {
        let (len, from) = match source.recv_from(&mut buf).await {
            Ok(received) => received,
            Err(e) => {
                warn!(error = %e, "Error reading packet");
                tokio::time::sleep(RECEIVE_ERROR_BACKOFF).await;
                continue;
            }
        };

        for adv in process_datagram(&buf[..len], from) {
            if tx.send(adv).await.is_err() {
                debug!("Advertisement queue closed, stopping receiver");
                return Ok(());
            }
        }
    }
}
