//! Control-plane messages
//!
//! Every message is a kind byte followed by little-endian fields; strings
//! are u16-length-prefixed UTF-8. Request kinds occupy 0x01..=0x04, the
//! matching response sets the high bit.

use mlsn_core::{
    ClientId, MlsnError, MlsnResult, NodeId, NodeStatus, PositionStatus, StartStatus, TargetStatus,
};

/// Message kind bytes.
pub const KIND_GET_POSITION: u8 = 0x01;
pub const KIND_ADD_NODE: u8 = 0x02;
pub const KIND_START_NETWORK: u8 = 0x03;
pub const KIND_TARGET_POSITION: u8 = 0x04;
pub const KIND_RESPONSE: u8 = 0x80;

/// Largest bind address accepted in an `AddNode` request.
pub const MAX_ADDRESS_LEN: usize = 256;

/// A request on the control plane.
#[derive(Clone, Debug, PartialEq)]
pub enum ControlRequest {
    /// Target service: fetch the current true position.
    GetPosition { node_id: NodeId },
    /// Network service: register a node before activation.
    AddNode {
        node_id: NodeId,
        x: f32,
        y: f32,
        z: f32,
        bind_address: String,
    },
    /// Network service: freeze the registry and start operating.
    StartNetwork { client_id: ClientId },
    /// Network service: scatter/gather distances and solve for the target.
    GetTargetGlobalPosition { client_id: ClientId },
}

impl ControlRequest {
    /// Serialize the request to bytes.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            ControlRequest::GetPosition { node_id } => {
                let mut buf = Vec::with_capacity(5);
                buf.push(KIND_GET_POSITION);
                buf.extend_from_slice(&node_id.to_bytes());
                buf
            }
            ControlRequest::AddNode {
                node_id,
                x,
                y,
                z,
                bind_address,
            } => {
                let addr = bind_address.as_bytes();
                let mut buf = Vec::with_capacity(19 + addr.len());
                buf.push(KIND_ADD_NODE);
                buf.extend_from_slice(&node_id.to_bytes());
                buf.extend_from_slice(&x.to_le_bytes());
                buf.extend_from_slice(&y.to_le_bytes());
                buf.extend_from_slice(&z.to_le_bytes());
                buf.extend_from_slice(&(addr.len() as u16).to_le_bytes());
                buf.extend_from_slice(addr);
                buf
            }
            ControlRequest::StartNetwork { client_id } => {
                let mut buf = Vec::with_capacity(5);
                buf.push(KIND_START_NETWORK);
                buf.extend_from_slice(&client_id.to_bytes());
                buf
            }
            ControlRequest::GetTargetGlobalPosition { client_id } => {
                let mut buf = Vec::with_capacity(5);
                buf.push(KIND_TARGET_POSITION);
                buf.extend_from_slice(&client_id.to_bytes());
                buf
            }
        }
    }

    /// Parse a request from bytes.
    pub fn decode(buf: &[u8]) -> MlsnResult<Self> {
        let (&kind, body) = buf.split_first().ok_or(MlsnError::BufferTooShort {
            expected: 1,
            actual: 0,
        })?;

        match kind {
            KIND_GET_POSITION => Ok(ControlRequest::GetPosition {
                node_id: NodeId::from_bytes(read_array(body, 0)?),
            }),
            KIND_ADD_NODE => {
                let node_id = NodeId::from_bytes(read_array(body, 0)?);
                let x = f32::from_le_bytes(read_array(body, 4)?);
                let y = f32::from_le_bytes(read_array(body, 8)?);
                let z = f32::from_le_bytes(read_array(body, 12)?);
                let addr_len = u16::from_le_bytes(read_array(body, 16)?) as usize;
                if addr_len > MAX_ADDRESS_LEN {
                    return Err(MlsnError::InvalidWireFormat(format!(
                        "bind address too long: {} > {}",
                        addr_len, MAX_ADDRESS_LEN
                    )));
                }
                let addr_bytes = body.get(18..18 + addr_len).ok_or(MlsnError::BufferTooShort {
                    expected: 18 + addr_len,
                    actual: body.len(),
                })?;
                let bind_address = std::str::from_utf8(addr_bytes)
                    .map_err(|_| {
                        MlsnError::InvalidWireFormat("bind address is not valid UTF-8".into())
                    })?
                    .to_string();
                Ok(ControlRequest::AddNode {
                    node_id,
                    x,
                    y,
                    z,
                    bind_address,
                })
            }
            KIND_START_NETWORK => Ok(ControlRequest::StartNetwork {
                client_id: ClientId::from_bytes(read_array(body, 0)?),
            }),
            KIND_TARGET_POSITION => Ok(ControlRequest::GetTargetGlobalPosition {
                client_id: ClientId::from_bytes(read_array(body, 0)?),
            }),
            other => Err(MlsnError::UnknownMessageKind(other)),
        }
    }
}

/// A response on the control plane.
#[derive(Clone, Debug, PartialEq)]
pub enum ControlResponse {
    /// Reply to `GetPosition`.
    Position {
        status: PositionStatus,
        x: f32,
        y: f32,
        z: f32,
    },
    /// Reply to `AddNode`.
    AddNode { status: NodeStatus },
    /// Reply to `StartNetwork`. `n_nodes` is reported regardless of outcome.
    StartNetwork { status: StartStatus, n_nodes: i32 },
    /// Reply to `GetTargetGlobalPosition`. Error responses carry the
    /// infinity sentinel in all three coordinates.
    TargetPosition {
        status: TargetStatus,
        x: f32,
        y: f32,
        z: f32,
    },
}

impl ControlResponse {
    /// Serialize the response to bytes.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            ControlResponse::Position { status, x, y, z } => {
                encode_position_reply(KIND_RESPONSE | KIND_GET_POSITION, status.to_byte(), *x, *y, *z)
            }
            ControlResponse::AddNode { status } => {
                vec![KIND_RESPONSE | KIND_ADD_NODE, status.to_byte()]
            }
            ControlResponse::StartNetwork { status, n_nodes } => {
                let mut buf = Vec::with_capacity(6);
                buf.push(KIND_RESPONSE | KIND_START_NETWORK);
                buf.push(status.to_byte());
                buf.extend_from_slice(&n_nodes.to_le_bytes());
                buf
            }
            ControlResponse::TargetPosition { status, x, y, z } => {
                encode_position_reply(KIND_RESPONSE | KIND_TARGET_POSITION, status.to_byte(), *x, *y, *z)
            }
        }
    }

    /// Parse a response from bytes.
    pub fn decode(buf: &[u8]) -> MlsnResult<Self> {
        let (&kind, body) = buf.split_first().ok_or(MlsnError::BufferTooShort {
            expected: 1,
            actual: 0,
        })?;

        match kind {
            k if k == (KIND_RESPONSE | KIND_GET_POSITION) => {
                let (status_byte, x, y, z) = decode_position_reply(body)?;
                let status = PositionStatus::from_byte(status_byte)
                    .ok_or(MlsnError::UnknownStatus(status_byte))?;
                Ok(ControlResponse::Position { status, x, y, z })
            }
            k if k == (KIND_RESPONSE | KIND_ADD_NODE) => {
                let status_byte = *body.first().ok_or(MlsnError::BufferTooShort {
                    expected: 1,
                    actual: 0,
                })?;
                let status = NodeStatus::from_byte(status_byte)
                    .ok_or(MlsnError::UnknownStatus(status_byte))?;
                Ok(ControlResponse::AddNode { status })
            }
            k if k == (KIND_RESPONSE | KIND_START_NETWORK) => {
                let status_byte = *body.first().ok_or(MlsnError::BufferTooShort {
                    expected: 1,
                    actual: 0,
                })?;
                let status = StartStatus::from_byte(status_byte)
                    .ok_or(MlsnError::UnknownStatus(status_byte))?;
                let n_nodes = i32::from_le_bytes(read_array(body, 1)?);
                Ok(ControlResponse::StartNetwork { status, n_nodes })
            }
            k if k == (KIND_RESPONSE | KIND_TARGET_POSITION) => {
                let (status_byte, x, y, z) = decode_position_reply(body)?;
                let status = TargetStatus::from_byte(status_byte)
                    .ok_or(MlsnError::UnknownStatus(status_byte))?;
                Ok(ControlResponse::TargetPosition { status, x, y, z })
            }
            other => Err(MlsnError::UnknownMessageKind(other)),
        }
    }
}

fn encode_position_reply(kind: u8, status: u8, x: f32, y: f32, z: f32) -> Vec<u8> {
    let mut buf = Vec::with_capacity(14);
    buf.push(kind);
    buf.push(status);
    buf.extend_from_slice(&x.to_le_bytes());
    buf.extend_from_slice(&y.to_le_bytes());
    buf.extend_from_slice(&z.to_le_bytes());
    buf
}

fn decode_position_reply(body: &[u8]) -> MlsnResult<(u8, f32, f32, f32)> {
    let status = *body.first().ok_or(MlsnError::BufferTooShort {
        expected: 13,
        actual: body.len(),
    })?;
    let x = f32::from_le_bytes(read_array(body, 1)?);
    let y = f32::from_le_bytes(read_array(body, 5)?);
    let z = f32::from_le_bytes(read_array(body, 9)?);
    Ok((status, x, y, z))
}

/// Read a fixed-size field at `offset`, reporting how many bytes were needed.
fn read_array<const N: usize>(buf: &[u8], offset: usize) -> MlsnResult<[u8; N]> {
    buf.get(offset..offset + N)
        .and_then(|slice| slice.try_into().ok())
        .ok_or(MlsnError::BufferTooShort {
            expected: offset + N,
            actual: buf.len(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_position_roundtrip() {
        let request = ControlRequest::GetPosition {
            node_id: NodeId::new(7),
        };
        let decoded = ControlRequest::decode(&request.encode()).unwrap();
        assert_eq!(decoded, request);
    }

    #[test]
    fn test_add_node_roundtrip() {
        let request = ControlRequest::AddNode {
            node_id: NodeId::new(3),
            x: 1.5,
            y: -2.0,
            z: 0.25,
            bind_address: "127.0.0.1:7803".to_string(),
        };
        let decoded = ControlRequest::decode(&request.encode()).unwrap();
        assert_eq!(decoded, request);
    }

    #[test]
    fn test_start_network_roundtrip() {
        let request = ControlRequest::StartNetwork {
            client_id: ClientId::new(1),
        };
        let decoded = ControlRequest::decode(&request.encode()).unwrap();
        assert_eq!(decoded, request);
    }

    #[test]
    fn test_response_roundtrips() {
        let responses = [
            ControlResponse::Position {
                status: PositionStatus::Ok,
                x: 3.0,
                y: 4.0,
                z: 5.0,
            },
            ControlResponse::AddNode {
                status: NodeStatus::Error,
            },
            ControlResponse::StartNetwork {
                status: StartStatus::Ok,
                n_nodes: 4,
            },
            ControlResponse::TargetPosition {
                status: TargetStatus::Ok,
                x: -1.0,
                y: 0.5,
                z: 9.75,
            },
        ];
        for response in responses {
            let decoded = ControlResponse::decode(&response.encode()).unwrap();
            assert_eq!(decoded, response);
        }
    }

    #[test]
    fn test_error_sentinel_survives_the_wire() {
        let response = ControlResponse::TargetPosition {
            status: TargetStatus::Error,
            x: f32::INFINITY,
            y: f32::INFINITY,
            z: f32::INFINITY,
        };
        let decoded = ControlResponse::decode(&response.encode()).unwrap();
        match decoded {
            ControlResponse::TargetPosition { status, x, y, z } => {
                assert_eq!(status, TargetStatus::Error);
                assert!(x.is_infinite() && x > 0.0);
                assert!(y.is_infinite() && z.is_infinite());
            }
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_kind_rejected() {
        assert!(matches!(
            ControlRequest::decode(&[0x7F, 0, 0, 0, 0]),
            Err(MlsnError::UnknownMessageKind(0x7F))
        ));
    }

    #[test]
    fn test_truncated_add_node_rejected() {
        let request = ControlRequest::AddNode {
            node_id: NodeId::new(3),
            x: 0.0,
            y: 0.0,
            z: 0.0,
            bind_address: "127.0.0.1:7803".to_string(),
        };
        let mut bytes = request.encode();
        bytes.truncate(bytes.len() - 4);
        assert!(matches!(
            ControlRequest::decode(&bytes),
            Err(MlsnError::BufferTooShort { .. })
        ));
    }

    #[test]
    fn test_oversized_address_rejected() {
        let request = ControlRequest::AddNode {
            node_id: NodeId::new(3),
            x: 0.0,
            y: 0.0,
            z: 0.0,
            bind_address: "x".repeat(MAX_ADDRESS_LEN + 1),
        };
        assert!(matches!(
            ControlRequest::decode(&request.encode()),
            Err(MlsnError::InvalidWireFormat(_))
        ));
    }
}
