use std::io;
use std::mem::MaybeUninit;
use std::net::{IpAddr, SocketAddr};
use std::os::fd::{AsRawFd, RawFd};

use async_trait::async_trait;
use socket2::{SockAddr, Socket, Type};
use tokio::io::Interest;
use tokio::io::unix::AsyncFd;
use tokio::time::{timeout_at, Instant};
use tracing::debug;

use crate::traceroute::probe::ProbeFamily;

/// What the probe engine needs from the network.
///
/// The socket is opened before the trace starts and closed when dropped, so a trace
/// that owns its socket releases it on every exit path.
#[async_trait]
pub trait ProbeSocket: Send {
    /// Applies the TTL (IPv4) or Hop Limit (IPv6) to the next outgoing probe.
    fn set_hop_limit(&mut self, hop_limit: u8) -> io::Result<()>;

    async fn send_to(&mut self, buf: &[u8], destination: IpAddr) -> io::Result<usize>;

    /// Waits for one inbound packet, giving up with [`io::ErrorKind::TimedOut`] at
    /// `deadline`.
    async fn recv_from(&mut self, buf: &mut [u8], deadline: Instant) -> io::Result<(usize, IpAddr)>;
}

/// A raw ICMP (or ICMPv6) socket driven by `tokio` readiness events.
///
/// Opening one requires the `CAP_NET_RAW` capability (or root).
pub struct AsyncIcmpSocket {
    socket_async_fd: AsyncFd<SocketWrapper>,
    family: ProbeFamily,
}

impl AsyncIcmpSocket {
    pub fn new(family: ProbeFamily) -> io::Result<Self> {
        let socket = SocketWrapper::new(family)?;
        let socket_async_fd = AsyncFd::new(socket)?;

        Ok(Self {
            socket_async_fd,
            family,
        })
    }

    pub fn bind(&self, address: IpAddr) -> io::Result<()> {
        self.socket_async_fd.get_ref().bind(SocketAddr::new(address, 0))
    }

    pub fn family(&self) -> ProbeFamily {
        self.family
    }
}

#[async_trait]
impl ProbeSocket for AsyncIcmpSocket {
    fn set_hop_limit(&mut self, hop_limit: u8) -> io::Result<()> {
        self.socket_async_fd.get_ref().set_hop_limit(hop_limit)
    }

    async fn send_to(&mut self, buf: &[u8], destination: IpAddr) -> io::Result<usize> {
        let socket_addr = SocketAddr::new(destination, 0);
        self.socket_async_fd
            .async_io(Interest::WRITABLE, |socket| socket.send_to(buf, socket_addr))
            .await
    }

    async fn recv_from(
        &mut self,
        buf: &mut [u8],
        deadline: Instant,
    ) -> io::Result<(usize, IpAddr)> {
        let recv = self
            .socket_async_fd
            .async_io(Interest::READABLE, |socket| socket.recv_from(buf));

        match timeout_at(deadline, recv).await {
            Ok(result) => result,
            Err(_) => Err(io::Error::new(
                io::ErrorKind::TimedOut,
                "no ICMP answer before the deadline",
            )),
        }
    }
}

impl Drop for AsyncIcmpSocket {
    fn drop(&mut self) {
        debug!(family = self.family.name(), "closing probe socket");
    }
}

struct SocketWrapper {
    socket: Socket,
    family: ProbeFamily,
}

impl SocketWrapper {
    fn new(family: ProbeFamily) -> io::Result<Self> {
        let socket = Socket::new(family.domain(), Type::RAW, Some(family.protocol()))?;

        socket.set_nonblocking(true)?;

        Ok(Self { socket, family })
    }

    fn bind(&self, socket_addr: SocketAddr) -> io::Result<()> {
        self.socket.bind(&socket_addr.into())
    }

    fn set_hop_limit(&self, hop_limit: u8) -> io::Result<()> {
        match self.family {
            ProbeFamily::V4 => self.socket.set_ttl(u32::from(hop_limit)),
            ProbeFamily::V6 => self.socket.set_unicast_hops_v6(u32::from(hop_limit)),
        }
    }

    fn send_to(&self, buf: &[u8], socket_addr: SocketAddr) -> io::Result<usize> {
        self.socket.send_to(buf, &SockAddr::from(socket_addr))
    }

    fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, IpAddr)> {
        // SAFETY: `recv_from` only ever writes initialized bytes into the buffer.
        let uninit_buf = unsafe { &mut *(buf as *mut [u8] as *mut [MaybeUninit<u8>]) };
        let (size, from) = self.socket.recv_from(uninit_buf)?;
        let from = from
            .as_socket()
            .map(|socket_addr| socket_addr.ip())
            .ok_or_else(|| {
                io::Error::new(io::ErrorKind::InvalidData, "ICMP answer from a non IP address")
            })?;

        Ok((size, from))
    }
}

impl AsRawFd for SocketWrapper {
    fn as_raw_fd(&self) -> RawFd {
        self.socket.as_raw_fd()
    }
}
