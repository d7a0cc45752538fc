//! Data-plane UDP transport
//!
//! One socket per role: the dealer binds an ephemeral port and fans out to
//! node routers; each router binds its advertised reply address. Sender
//! identity is the datagram source address.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::{ToSocketAddrs, UdpSocket};

use mlsn_core::{MlsnError, MlsnResult};

/// Largest datagram either side of the data plane sends.
pub const MAX_DATAGRAM_SIZE: usize = 512;

/// UDP socket for the distance scatter/gather plane.
pub struct DataSocket {
    socket: UdpSocket,
    local_addr: SocketAddr,
}

impl DataSocket {
    /// Bind to a local address.
    pub async fn bind<A: ToSocketAddrs>(addr: A) -> MlsnResult<Self> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|e| MlsnError::TransportError(e.to_string()))?;
        let local_addr = socket
            .local_addr()
            .map_err(|e| MlsnError::TransportError(e.to_string()))?;
        Ok(DataSocket { socket, local_addr })
    }

    /// Get the bound address.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Send a payload to a destination.
    pub async fn send_to(&self, payload: &[u8], dest: SocketAddr) -> MlsnResult<()> {
        self.socket
            .send_to(payload, dest)
            .await
            .map_err(|e| MlsnError::TransportError(e.to_string()))?;
        Ok(())
    }

    /// Receive one datagram (blocking).
    pub async fn recv_from(&self, buf: &mut [u8]) -> MlsnResult<(usize, SocketAddr)> {
        self.socket
            .recv_from(buf)
            .await
            .map_err(|e| MlsnError::TransportError(e.to_string()))
    }

    /// Receive one datagram, waiting at most `wait`. Returns `None` when
    /// the timeout elapses with nothing received.
    pub async fn recv_timeout(
        &self,
        buf: &mut [u8],
        wait: Duration,
    ) -> MlsnResult<Option<(usize, SocketAddr)>> {
        match tokio::time::timeout(wait, self.socket.recv_from(buf)).await {
            Ok(Ok((len, addr))) => Ok(Some((len, addr))),
            Ok(Err(e)) => Err(MlsnError::TransportError(e.to_string())),
            Err(_) => Ok(None),
        }
    }
}

/// Resolve a reply address string to a socket address.
pub async fn resolve_peer(address: &str) -> MlsnResult<SocketAddr> {
    tokio::net::lookup_host(address)
        .await
        .map_err(|e| MlsnError::TransportError(format!("cannot resolve {address}: {e}")))?
        .next()
        .ok_or_else(|| MlsnError::TransportError(format!("{address} resolves to nothing")))
}
