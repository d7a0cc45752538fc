//! Control-plane RPC transport
//!
//! Messages are framed with a u32 LE length prefix. Within one connection
//! requests are read and answered in stream order; concurrency across
//! connections is bounded by the serve loop's semaphore.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;

use mlsn_core::{MlsnError, MlsnResult};
use mlsn_wire::{ControlRequest, ControlResponse};

/// Maximum framed message size; anything larger is a protocol violation.
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024;

async fn write_message(stream: &mut TcpStream, bytes: &[u8]) -> MlsnResult<()> {
    let len = bytes.len() as u32;
    stream
        .write_all(&len.to_le_bytes())
        .await
        .map_err(|e| MlsnError::TransportError(e.to_string()))?;
    stream
        .write_all(bytes)
        .await
        .map_err(|e| MlsnError::TransportError(e.to_string()))?;
    Ok(())
}

async fn read_message(stream: &mut TcpStream) -> MlsnResult<Vec<u8>> {
    let mut len_buf = [0u8; 4];
    match stream.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(MlsnError::ConnectionClosed)
        }
        Err(e) => return Err(MlsnError::TransportError(e.to_string())),
    }
    let len = u32::from_le_bytes(len_buf) as usize;
    if len == 0 || len > MAX_MESSAGE_SIZE {
        return Err(MlsnError::InvalidWireFormat(format!(
            "message length {} outside 1..={}",
            len, MAX_MESSAGE_SIZE
        )));
    }
    let mut buf = vec![0u8; len];
    stream
        .read_exact(&mut buf)
        .await
        .map_err(|e| MlsnError::TransportError(e.to_string()))?;
    Ok(buf)
}

/// Client side of the control plane: one connection, sequential calls.
pub struct RpcClient {
    stream: TcpStream,
}

impl RpcClient {
    /// Connect to a control-plane service.
    pub async fn connect<A: ToSocketAddrs>(addr: A) -> MlsnResult<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| MlsnError::TransportError(e.to_string()))?;
        Ok(RpcClient { stream })
    }

    /// Send a request and block until its response arrives.
    pub async fn call(&mut self, request: &ControlRequest) -> MlsnResult<ControlResponse> {
        write_message(&mut self.stream, &request.encode()).await?;
        let bytes = read_message(&mut self.stream).await?;
        ControlResponse::decode(&bytes)
    }
}

/// Listening side of the control plane.
pub struct RpcListener {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl RpcListener {
    /// Bind to a local address.
    pub async fn bind<A: ToSocketAddrs>(addr: A) -> MlsnResult<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| MlsnError::TransportError(e.to_string()))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| MlsnError::TransportError(e.to_string()))?;
        Ok(RpcListener {
            listener,
            local_addr,
        })
    }

    /// Get the bound address.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accept one connection.
    pub async fn accept(&self) -> MlsnResult<RpcConnection> {
        let (stream, peer) = self
            .listener
            .accept()
            .await
            .map_err(|e| MlsnError::TransportError(e.to_string()))?;
        Ok(RpcConnection { stream, peer })
    }
}

/// An accepted control-plane connection.
pub struct RpcConnection {
    stream: TcpStream,
    peer: SocketAddr,
}

impl RpcConnection {
    /// Get the peer address.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Read the next request in stream order.
    pub async fn next_request(&mut self) -> MlsnResult<ControlRequest> {
        let bytes = read_message(&mut self.stream).await?;
        ControlRequest::decode(&bytes)
    }

    /// Send a response for the most recent request.
    pub async fn respond(&mut self, response: &ControlResponse) -> MlsnResult<()> {
        write_message(&mut self.stream, &response.encode()).await
    }
}

/// Run a control-plane service until shutdown is signalled.
///
/// Each accepted connection gets its own task; request handling acquires a
/// permit from a semaphore of `max_in_flight` slots, which bounds the
/// worker pool across connections. On shutdown the accept loop stops and
/// in-flight connections get `grace` to drain before being aborted.
pub async fn serve<H, Fut>(
    listener: RpcListener,
    max_in_flight: usize,
    grace: Duration,
    handler: H,
    mut shutdown: watch::Receiver<bool>,
) -> MlsnResult<()>
where
    H: Fn(ControlRequest) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = ControlResponse> + Send + 'static,
{
    let limiter = Arc::new(Semaphore::new(max_in_flight));
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok(connection) => {
                        let handler = handler.clone();
                        let limiter = Arc::clone(&limiter);
                        connections.spawn(serve_connection(connection, handler, limiter));
                    }
                    Err(e) => {
                        tracing::warn!("accept failed: {e}");
                    }
                }
            }
            _ = shutdown.changed() => break,
        }
    }

    // Grace window for in-flight connections, then force-close.
    let drain = async {
        while connections.join_next().await.is_some() {}
    };
    if tokio::time::timeout(grace, drain).await.is_err() {
        connections.abort_all();
    }
    Ok(())
}

async fn serve_connection<H, Fut>(mut connection: RpcConnection, handler: H, limiter: Arc<Semaphore>)
where
    H: Fn(ControlRequest) -> Fut,
    Fut: Future<Output = ControlResponse>,
{
    let peer = connection.peer_addr();
    loop {
        let request = match connection.next_request().await {
            Ok(request) => request,
            Err(MlsnError::ConnectionClosed) => break,
            Err(e) => {
                tracing::debug!("dropping connection from {peer}: {e}");
                break;
            }
        };

        let Ok(_permit) = limiter.acquire().await else {
            break;
        };
        let response = handler(request).await;

        if let Err(e) = connection.respond(&response).await {
            tracing::debug!("failed to respond to {peer}: {e}");
            break;
        }
    }
}
