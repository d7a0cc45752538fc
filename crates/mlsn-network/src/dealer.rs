//! Distance dealer
//!
//! Owns the data-plane socket. One round = fan the `GetDistance` token out
//! to every connected node, then gather replies until all expected nodes
//! answered or a poll interval passes with no new datagram. Rounds are
//! mutually exclusive on the socket; partial results are returned as-is.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::sync::Mutex;

use mlsn_core::{MlsnResult, NodeId};
use mlsn_transport::{resolve_peer, DataSocket, MAX_DATAGRAM_SIZE};
use mlsn_wire::{DistanceReply, DISTANCE_REQUEST};

use crate::state::NodeRecord;

/// Dealer tuning knobs.
#[derive(Clone, Debug)]
pub struct DealerConfig {
    /// How long one gather poll waits for the next reply. A round ends when
    /// this elapses with nothing new.
    pub poll_timeout: Duration,
}

impl Default for DealerConfig {
    fn default() -> Self {
        DealerConfig {
            poll_timeout: Duration::from_secs(1),
        }
    }
}

/// Scatter/gather client for the node routers.
pub struct DistanceDealer {
    socket: DataSocket,
    peers: Mutex<HashMap<NodeId, SocketAddr>>,
    config: DealerConfig,
}

impl DistanceDealer {
    /// Bind the dealer socket on an ephemeral local port.
    pub async fn bind(config: DealerConfig) -> MlsnResult<Self> {
        let socket = DataSocket::bind("0.0.0.0:0").await?;
        Ok(DistanceDealer {
            socket,
            peers: Mutex::new(HashMap::new()),
            config,
        })
    }

    /// Resolve every registered node's reply address into the routing
    /// table. Runs once, inside the activation transition; a resolution
    /// failure aborts activation.
    pub async fn connect(&self, nodes_info: &HashMap<NodeId, NodeRecord>) -> MlsnResult<()> {
        let mut peers = self.peers.lock().await;
        peers.clear();
        for (&id, record) in nodes_info {
            let addr = resolve_peer(&record.reply_address).await?;
            tracing::debug!("dealer routing node {id} via {addr}");
            peers.insert(id, addr);
        }
        Ok(())
    }

    /// Run one scatter/gather round and return whatever arrived in time.
    ///
    /// The peers lock serializes rounds: two concurrent invocations never
    /// interleave on the socket. Duplicate replies from one node within a
    /// round collapse to the last value; replies from unknown ids are
    /// dropped.
    pub async fn request_distances(&self) -> HashMap<NodeId, f64> {
        let peers = self.peers.lock().await;
        let mut distances = HashMap::with_capacity(peers.len());
        if peers.is_empty() {
            return distances;
        }

        for (id, addr) in peers.iter() {
            if let Err(e) = self.socket.send_to(DISTANCE_REQUEST, *addr).await {
                tracing::warn!("distance request to node {id} at {addr} failed: {e}");
            }
        }

        let mut buf = [0u8; MAX_DATAGRAM_SIZE];
        let mut answered = 0;
        while answered < peers.len() {
            let received = match self
                .socket
                .recv_timeout(&mut buf, self.config.poll_timeout)
                .await
            {
                Ok(Some((len, from))) => (len, from),
                Ok(None) => {
                    tracing::debug!(
                        "gather timed out with {answered}/{} replies",
                        peers.len()
                    );
                    break;
                }
                Err(e) => {
                    tracing::warn!("gather receive failed: {e}");
                    break;
                }
            };

            let (len, from) = received;
            let reply = match DistanceReply::decode(&buf[..len]) {
                Ok(reply) => reply,
                Err(e) => {
                    tracing::debug!("dropping malformed reply from {from}: {e}");
                    continue;
                }
            };
            if !peers.contains_key(&reply.node_id) {
                tracing::debug!("dropping reply from unknown node {}", reply.node_id);
                continue;
            }

            if distances.insert(reply.node_id, reply.distance).is_none() {
                answered += 1;
            }
            tracing::trace!("node {} reports {:.3} m", reply.node_id, reply.distance);
        }

        distances
    }

    /// Number of nodes currently routed.
    pub async fn peer_count(&self) -> usize {
        self.peers.lock().await.len()
    }
}
