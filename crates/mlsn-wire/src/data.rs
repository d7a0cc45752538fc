//! Data-plane messages
//!
//! The dealer/router round is correlation-less: the request is the literal
//! `GetDistance` token, the reply is a fixed 12-byte frame carrying the
//! responding node id and its latest distance. Sender identity rides on the
//! datagram itself.

use mlsn_core::{MlsnError, MlsnResult, NodeId};

/// The distance request token, sent verbatim as a single datagram.
pub const DISTANCE_REQUEST: &[u8] = b"GetDistance";

/// Size of an encoded distance reply: node id (i32 LE) + distance (f64 LE).
pub const DISTANCE_REPLY_SIZE: usize = 12;

/// Check whether a datagram payload is a distance request.
#[inline]
pub fn is_distance_request(payload: &[u8]) -> bool {
    payload == DISTANCE_REQUEST
}

/// A node's reply to a distance request.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DistanceReply {
    pub node_id: NodeId,
    pub distance: f64,
}

impl DistanceReply {
    /// Serialize the reply to its fixed wire form.
    pub fn encode(&self) -> [u8; DISTANCE_REPLY_SIZE] {
        let mut buf = [0u8; DISTANCE_REPLY_SIZE];
        buf[0..4].copy_from_slice(&self.node_id.to_bytes());
        buf[4..12].copy_from_slice(&self.distance.to_le_bytes());
        buf
    }

    /// Parse a reply from a datagram payload.
    pub fn decode(buf: &[u8]) -> MlsnResult<Self> {
        if buf.len() != DISTANCE_REPLY_SIZE {
            return Err(MlsnError::BufferTooShort {
                expected: DISTANCE_REPLY_SIZE,
                actual: buf.len(),
            });
        }
        let node_id = NodeId::from_bytes(buf[0..4].try_into().unwrap());
        let distance = f64::from_le_bytes(buf[4..12].try_into().unwrap());
        Ok(DistanceReply { node_id, distance })
    }
}
