//! Target RPC service
//!
//! Answers `GetPosition` with the latest cached trajectory position. The
//! error status is reserved; normal operation always replies `PS_OK`.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use mlsn_core::{MlsnResult, NodeStatus, PositionStatus, StartStatus, TargetStatus};
use mlsn_transport::RpcListener;
use mlsn_wire::{ControlRequest, ControlResponse};

use crate::state::TargetCell;

/// Request handler around the shared position cell.
pub struct TargetService {
    cell: Arc<TargetCell>,
}

impl TargetService {
    pub fn new(cell: Arc<TargetCell>) -> Self {
        TargetService { cell }
    }

    /// Dispatch one control-plane request.
    pub async fn handle(&self, request: ControlRequest) -> ControlResponse {
        match request {
            ControlRequest::GetPosition { node_id } => {
                let position = self.cell.get().await;
                tracing::trace!("serving position to node {node_id}");
                ControlResponse::Position {
                    status: PositionStatus::Ok,
                    x: position.x as f32,
                    y: position.y as f32,
                    z: position.z as f32,
                }
            }
            ControlRequest::AddNode { node_id, .. } => {
                tracing::debug!("node {node_id} sent a network request to the target");
                ControlResponse::AddNode {
                    status: NodeStatus::Error,
                }
            }
            ControlRequest::StartNetwork { .. } => ControlResponse::StartNetwork {
                status: StartStatus::Error,
                n_nodes: 0,
            },
            ControlRequest::GetTargetGlobalPosition { .. } => ControlResponse::TargetPosition {
                status: TargetStatus::Error,
                x: f32::INFINITY,
                y: f32::INFINITY,
                z: f32::INFINITY,
            },
        }
    }
}

/// Bound target server.
pub struct TargetServer {
    listener: RpcListener,
    service: Arc<TargetService>,
}

impl TargetServer {
    /// Bind the control-plane listener.
    pub async fn bind(addr: &str, cell: Arc<TargetCell>) -> MlsnResult<Self> {
        let listener = RpcListener::bind(addr).await?;
        Ok(TargetServer {
            listener,
            service: Arc::new(TargetService::new(cell)),
        })
    }

    /// Get the control-plane address.
    pub fn local_addr(&self) -> SocketAddr {
        self.listener.local_addr()
    }

    /// Serve until shutdown is signalled.
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> MlsnResult<()> {
        let service = self.service;
        mlsn_transport::serve(
            self.listener,
            4,
            Duration::from_secs(1),
            move |request| {
                let service = Arc::clone(&service);
                async move { service.handle(request).await }
            },
            shutdown,
        )
        .await
    }
}
