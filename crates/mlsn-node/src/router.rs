//! Node distance router
//!
//! Listens on the node's advertised reply address. Every `GetDistance`
//! datagram is answered with the current sensor reading, addressed back to
//! the sender; anything else is dropped silently.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::watch;

use mlsn_core::{MlsnResult, NodeId};
use mlsn_transport::{DataSocket, MAX_DATAGRAM_SIZE};
use mlsn_wire::{is_distance_request, DistanceReply};

use crate::sensor::SensorCell;

/// Data-plane responder for one node.
pub struct NodeRouter {
    socket: DataSocket,
    node_id: NodeId,
    cell: Arc<SensorCell>,
}

impl NodeRouter {
    /// Bind the router at the node's reply address.
    pub async fn bind(bind_address: &str, node_id: NodeId, cell: Arc<SensorCell>) -> MlsnResult<Self> {
        let socket = DataSocket::bind(bind_address).await?;
        tracing::info!(
            "router for node {node_id} listening on {}",
            socket.local_addr()
        );
        Ok(NodeRouter {
            socket,
            node_id,
            cell,
        })
    }

    /// Get the bound address.
    pub fn local_addr(&self) -> SocketAddr {
        self.socket.local_addr()
    }

    /// Answer distance requests until shutdown.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> MlsnResult<()> {
        let mut buf = [0u8; MAX_DATAGRAM_SIZE];
        loop {
            let (len, from) = tokio::select! {
                received = self.socket.recv_from(&mut buf) => match received {
                    Ok(datagram) => datagram,
                    Err(e) => {
                        tracing::warn!("router {} receive failed: {e}", self.node_id);
                        continue;
                    }
                },
                _ = shutdown.changed() => break,
            };

            if !is_distance_request(&buf[..len]) {
                tracing::trace!("router {} dropping unknown payload from {from}", self.node_id);
                continue;
            }

            let reply = DistanceReply {
                node_id: self.node_id,
                distance: self.cell.get().await,
            };
            if let Err(e) = self.socket.send_to(&reply.encode(), from).await {
                tracing::warn!("router {} reply to {from} failed: {e}", self.node_id);
            } else {
                tracing::trace!(
                    "router {} sent {:.3} m to {from}",
                    self.node_id,
                    reply.distance
                );
            }
        }

        tracing::info!("router {} stopped", self.node_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mlsn_wire::DISTANCE_REQUEST;

    async fn bound_router(distance: f64) -> (SocketAddr, watch::Sender<bool>) {
        let cell = Arc::new(SensorCell::new());
        cell.set(distance).await;
        let router = NodeRouter::bind("127.0.0.1:0", NodeId::new(5), cell)
            .await
            .unwrap();
        let addr = router.local_addr();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(router.run(shutdown_rx));
        (addr, shutdown_tx)
    }

    #[tokio::test]
    async fn test_router_answers_distance_requests() {
        let (addr, _shutdown) = bound_router(6.25).await;

        let probe = DataSocket::bind("127.0.0.1:0").await.unwrap();
        probe.send_to(DISTANCE_REQUEST, addr).await.unwrap();

        let mut buf = [0u8; MAX_DATAGRAM_SIZE];
        let (len, from) = probe.recv_from(&mut buf).await.unwrap();
        assert_eq!(from, addr);

        let reply = DistanceReply::decode(&buf[..len]).unwrap();
        assert_eq!(reply.node_id, NodeId::new(5));
        assert_eq!(reply.distance, 6.25);
    }

    #[tokio::test]
    async fn test_router_drops_unknown_payloads() {
        let (addr, _shutdown) = bound_router(1.0).await;

        let probe = DataSocket::bind("127.0.0.1:0").await.unwrap();
        probe.send_to(b"GetTemperature", addr).await.unwrap();

        let mut buf = [0u8; MAX_DATAGRAM_SIZE];
        let received = probe
            .recv_timeout(&mut buf, std::time::Duration::from_millis(100))
            .await
            .unwrap();
        assert!(received.is_none());

        // The router is still alive for a valid request afterwards.
        probe.send_to(DISTANCE_REQUEST, addr).await.unwrap();
        let (len, _) = probe.recv_from(&mut buf).await.unwrap();
        assert!(DistanceReply::decode(&buf[..len]).is_ok());
    }
}
