//! Sensor node for the multilateration sensor network
//!
//! A node owns one simulated range sensor. A periodic loop polls the
//! Target for its true position and stores the noisy Euclidean distance;
//! a router answers the network dealer's distance requests from that
//! stored value. Registration with the network is a one-shot gate at
//! startup: a rejected node terminates.

pub mod router;
pub mod sensor;
pub mod updater;

pub use router::NodeRouter;
pub use sensor::SensorCell;
pub use updater::{run_sensor_loop, SensorConfig};

use mlsn_core::{MlsnError, MlsnResult, NodeId, NodeStatus, Position};
use mlsn_transport::RpcClient;
use mlsn_wire::{ControlRequest, ControlResponse};

/// Register this node with the network coordinator.
///
/// `bind_address` is the data-plane endpoint the router answers on; the
/// network dealer connects to it at activation.
pub async fn register_with_network(
    network_addr: &str,
    node_id: NodeId,
    position: Position,
    bind_address: &str,
) -> MlsnResult<()> {
    let mut client = RpcClient::connect(network_addr).await?;
    let response = client
        .call(&ControlRequest::AddNode {
            node_id,
            x: position.x as f32,
            y: position.y as f32,
            z: position.z as f32,
            bind_address: bind_address.to_string(),
        })
        .await?;

    match response {
        ControlResponse::AddNode {
            status: NodeStatus::Ok,
        } => {
            tracing::info!("node {node_id} registered with the network");
            Ok(())
        }
        ControlResponse::AddNode { .. } => Err(MlsnError::RegistrationRejected(node_id)),
        other => Err(MlsnError::InvalidWireFormat(format!(
            "unexpected response to AddNode: {other:?}"
        ))),
    }
}
