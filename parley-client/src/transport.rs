//! Stream and datagram transports behind one contract
//!
//! The listener thread needs to block until the socket is readable without
//! reading from it, so every transport also hands out a [`Readiness`] handle
//! backed by a duplicate of its descriptor.

use std::io::{self, Read, Write};
use std::net::{Ipv4Addr, Ipv6Addr, Shutdown, SocketAddr, TcpStream, ToSocketAddrs, UdpSocket};
use std::os::fd::{AsRawFd, OwnedFd};
use std::time::Duration;

use bytes::Bytes;
use parley_protocol::{TransportKind, BUF_SIZE};
use parley_utils::{ParleyError, Result};

/// Parse a transport name from config or the command line
pub fn parse_transport_kind(name: &str) -> Result<TransportKind> {
    match name.to_ascii_lowercase().as_str() {
        "tcp" | "stream" => Ok(TransportKind::Stream),
        "udp" | "datagram" => Ok(TransportKind::Datagram),
        other => Err(ParleyError::transport(format!(
            "transport must be tcp (stream) or udp (datagram), got {:?}",
            other
        ))),
    }
}

/// A bidirectional byte transport to one peer
///
/// Methods take `&self` so the same transport can be shared between the
/// listener and the foreground caller; the coordinator decides who reads.
pub trait Transport: Send + Sync {
    fn kind(&self) -> TransportKind;

    fn peer(&self) -> SocketAddr;

    /// Send all of `data`, returning the number of bytes sent
    fn send(&self, data: &[u8]) -> io::Result<usize>;

    /// Receive at most `buf.len()` bytes; `Ok(0)` means the peer closed
    fn recv(&self, buf: &mut [u8]) -> io::Result<usize>;

    /// Shut down both directions
    fn shutdown(&self) -> io::Result<()>;

    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()>;

    /// A pollable handle that reports when the next `recv` will not block
    fn readiness(&self) -> io::Result<Readiness>;
}

/// TCP transport
pub struct TcpTransport {
    stream: TcpStream,
    peer: SocketAddr,
}

impl TcpTransport {
    pub fn connect(addr: impl ToSocketAddrs) -> io::Result<Self> {
        let stream = TcpStream::connect(addr)?;
        Self::from_stream(stream)
    }

    pub fn from_stream(stream: TcpStream) -> io::Result<Self> {
        let peer = stream.peer_addr()?;
        stream.set_nodelay(true)?;
        Ok(Self { stream, peer })
    }
}

impl Transport for TcpTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Stream
    }

    fn peer(&self) -> SocketAddr {
        self.peer
    }

    fn send(&self, data: &[u8]) -> io::Result<usize> {
        (&self.stream).write_all(data)?;
        Ok(data.len())
    }

    fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        (&self.stream).read(buf)
    }

    fn shutdown(&self) -> io::Result<()> {
        match self.stream.shutdown(Shutdown::Both) {
            // Peer already went away
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            other => other,
        }
    }

    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        self.stream.set_read_timeout(timeout)
    }

    fn readiness(&self) -> io::Result<Readiness> {
        Ok(Readiness::new(OwnedFd::from(self.stream.try_clone()?)))
    }
}

/// UDP transport that only accepts datagrams from its configured peer
pub struct UdpTransport {
    socket: UdpSocket,
    peer: SocketAddr,
}

impl UdpTransport {
    pub fn connect(addr: impl ToSocketAddrs) -> io::Result<Self> {
        let peer = resolve(addr)?;
        let local = if peer.is_ipv4() {
            SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))
        } else {
            SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0))
        };
        let socket = UdpSocket::bind(local)?;
        Ok(Self { socket, peer })
    }

    pub fn from_socket(socket: UdpSocket, peer: SocketAddr) -> Self {
        Self { socket, peer }
    }
}

impl Transport for UdpTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Datagram
    }

    fn peer(&self) -> SocketAddr {
        self.peer
    }

    fn send(&self, data: &[u8]) -> io::Result<usize> {
        self.socket.send_to(data, self.peer)
    }

    fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            let (n, from) = self.socket.recv_from(buf)?;
            if from == self.peer {
                return Ok(n);
            }
            tracing::debug!(%from, peer = %self.peer, "discarding datagram from unexpected source");
        }
    }

    fn shutdown(&self) -> io::Result<()> {
        // Nothing to tear down on an unconnected socket; dropping it closes it
        Ok(())
    }

    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        self.socket.set_read_timeout(timeout)
    }

    fn readiness(&self) -> io::Result<Readiness> {
        Ok(Readiness::new(OwnedFd::from(self.socket.try_clone()?)))
    }
}

fn resolve(addr: impl ToSocketAddrs) -> io::Result<SocketAddr> {
    addr.to_socket_addrs()?.next().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "address resolved to nothing")
    })
}

/// Blocking readiness wait on a transport descriptor
pub struct Readiness {
    fd: OwnedFd,
}

impl Readiness {
    fn new(fd: OwnedFd) -> Self {
        Self { fd }
    }

    /// Block until the descriptor is readable or `timeout` elapses
    ///
    /// Hang-ups and socket errors count as readable so the next `recv`
    /// reports them.
    pub fn wait(&self, timeout: Duration) -> io::Result<bool> {
        let mut pfd = libc::pollfd {
            fd: self.fd.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        };
        let millis = timeout.as_millis().min(libc::c_int::MAX as u128) as libc::c_int;

        // SAFETY: pfd is a valid pollfd that outlives the call, and nfds is 1
        let rc = unsafe { libc::poll(&mut pfd, 1, millis) };
        if rc < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(false);
            }
            return Err(err);
        }
        Ok(rc > 0 && pfd.revents & (libc::POLLIN | libc::POLLHUP | libc::POLLERR) != 0)
    }
}

/// The client's exclusively owned connection to the server
///
/// Closing releases the transport exactly once; afterwards every send and
/// receive fails with [`ParleyError::ConnectionClosed`].
pub struct Connection {
    transport: Option<Box<dyn Transport>>,
    kind: TransportKind,
    peer: SocketAddr,
    read_timeout: Duration,
}

impl Connection {
    /// Open a transport of the given kind to `addr`
    pub fn open(kind: TransportKind, addr: impl ToSocketAddrs, read_timeout: Duration) -> Result<Self> {
        let transport: Box<dyn Transport> = match kind {
            TransportKind::Stream => Box::new(
                TcpTransport::connect(addr)
                    .map_err(|e| ParleyError::transport(format!("TCP connect failed: {}", e)))?,
            ),
            TransportKind::Datagram => Box::new(
                UdpTransport::connect(addr)
                    .map_err(|e| ParleyError::transport(format!("UDP setup failed: {}", e)))?,
            ),
        };
        Self::from_transport(transport, read_timeout)
    }

    pub fn from_transport(transport: Box<dyn Transport>, read_timeout: Duration) -> Result<Self> {
        transport.set_read_timeout(Some(read_timeout))?;
        let kind = transport.kind();
        let peer = transport.peer();
        tracing::debug!(%peer, %kind, "connection opened");
        Ok(Self {
            transport: Some(transport),
            kind,
            peer,
            read_timeout,
        })
    }

    pub fn kind(&self) -> TransportKind {
        self.kind
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn is_closed(&self) -> bool {
        self.transport.is_none()
    }

    pub fn readiness(&self) -> Result<Readiness> {
        Ok(self.transport()?.readiness()?)
    }

    pub fn send(&self, data: &[u8]) -> Result<usize> {
        Ok(self.transport()?.send(data)?)
    }

    /// Receive one read's worth of bytes; empty means the peer closed
    pub fn recv(&self) -> Result<Bytes> {
        let mut buf = [0u8; BUF_SIZE];
        match self.transport()?.recv(&mut buf) {
            Ok(n) => Ok(Bytes::copy_from_slice(&buf[..n])),
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                Err(ParleyError::timeout(self.read_timeout))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Shut down and release the transport; later calls do nothing
    pub fn close(&mut self) {
        if let Some(transport) = self.transport.take() {
            if let Err(e) = transport.shutdown() {
                tracing::debug!(error = %e, "transport shutdown failed");
            }
            tracing::debug!(peer = %self.peer, "connection closed");
        }
    }

    fn transport(&self) -> Result<&dyn Transport> {
        self.transport.as_deref().ok_or(ParleyError::ConnectionClosed)
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}
