use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::Duration;

use tracing::debug;

use crate::adapter::Wire;

/// UDP wire bound to one local port and connected to one remote peer.
///
/// The socket is acquired at construction, lives for the life of the value,
/// and is released on drop regardless of how the exchange ended.
#[derive(Debug)]
pub struct UdpWire {
    socket: UdpSocket,
    remote: SocketAddr,
}

impl UdpWire {
    /// Binds an OS-assigned local port and connects to `remote`.
    pub fn connect(remote: impl ToSocketAddrs) -> io::Result<Self> {
        Self::bind("0.0.0.0:0", remote)
    }

    /// Binds `local` explicitly and connects to `remote`.
    pub fn bind(local: impl ToSocketAddrs, remote: impl ToSocketAddrs) -> io::Result<Self> {
        let socket = UdpSocket::bind(local)?;
        let remote = remote.to_socket_addrs()?.next().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                "remote address resolved to nothing",
            )
        })?;
        socket.connect(remote)?;
        debug!(local = %socket.local_addr()?, remote = %remote, "udp wire bound");
        Ok(Self { socket, remote })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote
    }
}

impl Wire for UdpWire {
    fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.socket.send(bytes)?;
        Ok(())
    }

    fn recv_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<Option<usize>> {
        // A zero read-timeout would disable the deadline entirely.
        if timeout.is_zero() {
            return Ok(None);
        }
        self.socket.set_read_timeout(Some(timeout))?;
        match self.socket.recv(buf) {
            Ok(len) => Ok(Some(len)),
            Err(err)
                if matches!(
                    err.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                ) =>
            {
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }
}
