//! Identity types for the sensor network
//!
//! Identifiers are 32-bit signed integers for wire compatibility; node ids
//! are expected to be positive and unique within a deployment.

use std::fmt;

/// Identity of a sensor node.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct NodeId(pub i32);

impl NodeId {
    #[inline]
    pub fn new(id: i32) -> Self {
        NodeId(id)
    }

    #[inline]
    pub fn to_bytes(self) -> [u8; 4] {
        self.0.to_le_bytes()
    }

    #[inline]
    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        NodeId(i32::from_le_bytes(bytes))
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node({})", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of the driving client.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ClientId(pub i32);

impl ClientId {
    #[inline]
    pub fn new(id: i32) -> Self {
        ClientId(id)
    }

    #[inline]
    pub fn to_bytes(self) -> [u8; 4] {
        self.0.to_le_bytes()
    }

    #[inline]
    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        ClientId(i32::from_le_bytes(bytes))
    }
}

impl fmt::Debug for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Client({})", self.0)
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_roundtrip() {
        let id = NodeId::new(42);
        let recovered = NodeId::from_bytes(id.to_bytes());
        assert_eq!(id, recovered);
    }

    #[test]
    fn test_node_id_negative_roundtrip() {
        let id = NodeId::new(-7);
        let recovered = NodeId::from_bytes(id.to_bytes());
        assert_eq!(id, recovered);
    }

    #[test]
    fn test_client_id_roundtrip() {
        let id = ClientId::new(1);
        let recovered = ClientId::from_bytes(id.to_bytes());
        assert_eq!(id, recovered);
    }
}
