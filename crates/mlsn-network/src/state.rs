//! Shared network state
//!
//! The registry and the activation flag are the only mutable state shared
//! across request handlers. Each lives behind its own `tokio::sync::RwLock`.
//! That lock admits concurrent readers with exclusive writers, and it is
//! fair: a waiting writer blocks later readers, so neither side starves.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use tokio::sync::RwLock;

use mlsn_core::{NodeId, Position};

/// A registered node. Immutable after insertion.
#[derive(Clone, Debug)]
pub struct NodeRecord {
    /// Fixed global location of the node's range sensor.
    pub position: Position,
    /// Data-plane endpoint where the node's router answers distance requests.
    pub reply_address: String,
}

/// Registry of nodes plus the activation flag.
///
/// The flag starts false and flips to true exactly once, at `StartNetwork`.
/// From that moment the registry is read-only: `add_node` holds the flag's
/// read guard across its insert, so no insert can interleave with the
/// activation write and no node can appear after a reader has observed the
/// flag as true.
pub struct NetworkState {
    nodes: RwLock<HashMap<NodeId, NodeRecord>>,
    active: RwLock<bool>,
}

impl NetworkState {
    pub fn new() -> Self {
        NetworkState {
            nodes: RwLock::new(HashMap::new()),
            active: RwLock::new(false),
        }
    }

    /// Register a node. Returns true iff the id was free and the network
    /// is still inactive; on false nothing is mutated.
    pub async fn add_node(&self, id: NodeId, position: Position, reply_address: String) -> bool {
        let active = self.active.read().await;
        if *active {
            return false;
        }

        let mut nodes = self.nodes.write().await;
        match nodes.entry(id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(NodeRecord {
                    position,
                    reply_address,
                });
                true
            }
        }
    }

    /// Snapshot the registry. Safe for concurrent readers.
    pub async fn get_nodes_info(&self) -> HashMap<NodeId, NodeRecord> {
        self.nodes.read().await.clone()
    }

    /// Write the activation flag.
    pub async fn set_is_active(&self, state: bool) {
        *self.active.write().await = state;
    }

    /// Read the activation flag.
    pub async fn get_is_active(&self) -> bool {
        *self.active.read().await
    }
}

impl Default for NetworkState {
    fn default() -> Self {
        Self::new()
    }
}
