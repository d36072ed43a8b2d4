//! Async UDP socket abstraction.
//!
//! [`Socket`] is a thin wrapper around `tokio::net::UdpSocket` that is bound
//! locally and connected to the vehicle, and speaks raw frames.  Framing and
//! liveness live elsewhere; this module owns only byte I/O.

use std::net::SocketAddr;

use tokio::net::UdpSocket;

use crate::packet::MAX_FRAME_LEN;

/// A connected, frame-oriented UDP socket.
///
/// All methods are `&self` so the socket can be shared between the link's
/// receive path and its keep-alive task.
#[derive(Debug)]
pub struct Socket {
    /// Address this socket is bound to (filled in after the OS assigns a port).
    pub local_addr: SocketAddr,
    /// Address the socket is associated with.
    pub peer_addr: SocketAddr,
    inner: UdpSocket,
}

impl Socket {
    /// Bind `local_addr` and associate the socket with `peer`.
    ///
    /// After this only datagrams from `peer` are delivered.
    pub async fn connect(local_addr: SocketAddr, peer: SocketAddr) -> std::io::Result<Self> {
        let inner = UdpSocket::bind(local_addr).await?;
        inner.connect(peer).await?;
        let local_addr = inner.local_addr()?;
        Ok(Self {
            local_addr,
            peer_addr: peer,
            inner,
        })
    }

    /// Send one frame as a single datagram.
    pub async fn send_frame(&self, frame: &[u8]) -> std::io::Result<()> {
        self.inner.send(frame).await?;
        Ok(())
    }

    /// Receive the next datagram, at most [`MAX_FRAME_LEN`] bytes.
    pub async fn recv_frame(&self) -> std::io::Result<Vec<u8>> {
        let mut buf = vec![0u8; MAX_FRAME_LEN];
        let n = self.inner.recv(&mut buf).await?;
        buf.truncate(n);
        Ok(buf)
    }
}
