//! Network RPC service
//!
//! Stateful handler for the three control-plane operations. The activation
//! flag is the sole barrier between the registration phase and the
//! operation phase:
//!
//! | State    | Request                 | Reply                          |
//! |----------|-------------------------|--------------------------------|
//! | Inactive | AddNode (new id)        | NS_OK, node registered         |
//! | Inactive | AddNode (duplicate)     | NS_ERROR                       |
//! | Inactive | StartNetwork            | SS_OK, network becomes active  |
//! | Inactive | GetTargetGlobalPosition | TS_ERROR + infinity sentinel   |
//! | Active   | AddNode                 | NS_ERROR                       |
//! | Active   | StartNetwork            | SS_ERROR                       |
//! | Active   | GetTargetGlobalPosition | TS_OK estimate, or TS_ERROR    |

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};

use mlsn_core::{
    ClientId, MlsnResult, NodeId, NodeStatus, Position, PositionStatus, StartStatus, TargetStatus,
};
use mlsn_transport::RpcListener;
use mlsn_wire::{ControlRequest, ControlResponse};

use crate::dealer::{DealerConfig, DistanceDealer};
use crate::solver::Multilateration;
use crate::state::NetworkState;

/// Coordinator tuning knobs.
#[derive(Clone, Debug)]
pub struct ServiceConfig {
    /// Gather poll timeout per round.
    pub poll_timeout: Duration,
    /// Bound on concurrently handled requests.
    pub max_in_flight: usize,
    /// How long in-flight connections may drain on shutdown.
    pub shutdown_grace: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        ServiceConfig {
            poll_timeout: Duration::from_secs(1),
            max_in_flight: 8,
            shutdown_grace: Duration::from_secs(1),
        }
    }
}

/// The coordinator's request handler.
pub struct NetworkService {
    state: Arc<NetworkState>,
    dealer: DistanceDealer,
    solver: Mutex<Multilateration>,
    /// Serializes StartNetwork attempts so at most one can win activation.
    start_guard: Mutex<()>,
}

impl NetworkService {
    /// Create the service and bind the dealer's data-plane socket.
    pub async fn new(config: &ServiceConfig) -> MlsnResult<Self> {
        let dealer = DistanceDealer::bind(DealerConfig {
            poll_timeout: config.poll_timeout,
        })
        .await?;
        Ok(NetworkService {
            state: Arc::new(NetworkState::new()),
            dealer,
            solver: Mutex::new(Multilateration::new()),
            start_guard: Mutex::new(()),
        })
    }

    /// Shared state handle, exposed for inspection in tests.
    pub fn state(&self) -> Arc<NetworkState> {
        Arc::clone(&self.state)
    }

    /// Dispatch one control-plane request.
    pub async fn handle(&self, request: ControlRequest) -> ControlResponse {
        match request {
            ControlRequest::AddNode {
                node_id,
                x,
                y,
                z,
                bind_address,
            } => {
                self.add_node(node_id, Position::new(x as f64, y as f64, z as f64), bind_address)
                    .await
            }
            ControlRequest::StartNetwork { client_id } => self.start_network(client_id).await,
            ControlRequest::GetTargetGlobalPosition { client_id } => {
                self.target_global_position(client_id).await
            }
            ControlRequest::GetPosition { node_id } => {
                tracing::debug!("node {node_id} sent a target-service request to the network");
                ControlResponse::Position {
                    status: PositionStatus::Error,
                    x: 0.0,
                    y: 0.0,
                    z: 0.0,
                }
            }
        }
    }

    async fn add_node(
        &self,
        node_id: NodeId,
        position: Position,
        bind_address: String,
    ) -> ControlResponse {
        tracing::debug!("AddNode request from node {node_id}");

        if self.state.get_is_active().await {
            tracing::info!("rejecting node {node_id}: network already active");
            return ControlResponse::AddNode {
                status: NodeStatus::Error,
            };
        }

        if self.state.add_node(node_id, position, bind_address).await {
            tracing::info!("node {node_id} registered");
            ControlResponse::AddNode {
                status: NodeStatus::Ok,
            }
        } else {
            tracing::info!("rejecting node {node_id}: duplicate id or network active");
            ControlResponse::AddNode {
                status: NodeStatus::Error,
            }
        }
    }

    async fn start_network(&self, client_id: ClientId) -> ControlResponse {
        tracing::debug!("StartNetwork request from client {client_id}");
        let _guard = self.start_guard.lock().await;

        let nodes_info = self.state.get_nodes_info().await;
        let n_nodes = nodes_info.len() as i32;

        if self.state.get_is_active().await {
            tracing::info!("rejecting StartNetwork: network already active");
            return ControlResponse::StartNetwork {
                status: StartStatus::Error,
                n_nodes,
            };
        }

        // Dealer routing and the solver's sensor snapshot must both be in
        // place before the flag flip becomes observable to other handlers.
        if let Err(e) = self.dealer.connect(&nodes_info).await {
            tracing::warn!("activation aborted, dealer connect failed: {e}");
            return ControlResponse::StartNetwork {
                status: StartStatus::Error,
                n_nodes,
            };
        }
        self.solver.lock().await.set_sensor_positions(&nodes_info);
        self.state.set_is_active(true).await;

        tracing::info!("network active with {n_nodes} nodes");
        ControlResponse::StartNetwork {
            status: StartStatus::Ok,
            n_nodes,
        }
    }

    async fn target_global_position(&self, client_id: ClientId) -> ControlResponse {
        tracing::debug!("GetTargetGlobalPosition request from client {client_id}");

        if !self.state.get_is_active().await {
            tracing::debug!("no estimate: network not active");
            return target_error();
        }

        let distances = self.dealer.request_distances().await;
        if distances.is_empty() {
            tracing::warn!("no estimate: empty gather round");
            return target_error();
        }

        match self.solver.lock().await.estimate_position(&distances) {
            Ok(position) => {
                tracing::debug!(
                    "estimate ({:.3}, {:.3}, {:.3}) from {} distances",
                    position.x,
                    position.y,
                    position.z,
                    distances.len()
                );
                ControlResponse::TargetPosition {
                    status: TargetStatus::Ok,
                    x: position.x as f32,
                    y: position.y as f32,
                    z: position.z as f32,
                }
            }
            Err(e) => {
                tracing::warn!("no estimate: {e}");
                target_error()
            }
        }
    }
}

/// The contractual error reply: TS_ERROR with infinity in every coordinate.
fn target_error() -> ControlResponse {
    ControlResponse::TargetPosition {
        status: TargetStatus::Error,
        x: f32::INFINITY,
        y: f32::INFINITY,
        z: f32::INFINITY,
    }
}

/// Bound coordinator server: RPC listener plus the service behind it.
pub struct NetworkServer {
    listener: RpcListener,
    service: Arc<NetworkService>,
    config: ServiceConfig,
}

impl NetworkServer {
    /// Bind the control-plane listener and the dealer socket.
    pub async fn bind(addr: &str, config: ServiceConfig) -> MlsnResult<Self> {
        let listener = RpcListener::bind(addr).await?;
        let service = Arc::new(NetworkService::new(&config).await?);
        Ok(NetworkServer {
            listener,
            service,
            config,
        })
    }

    /// Get the control-plane address.
    pub fn local_addr(&self) -> SocketAddr {
        self.listener.local_addr()
    }

    /// Handler handle, exposed for in-process testing.
    pub fn service(&self) -> Arc<NetworkService> {
        Arc::clone(&self.service)
    }

    /// Serve until shutdown is signalled.
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> MlsnResult<()> {
        let service = self.service;
        mlsn_transport::serve(
            self.listener,
            self.config.max_in_flight,
            self.config.shutdown_grace,
            move |request| {
                let service = Arc::clone(&service);
                async move { service.handle(request).await }
            },
            shutdown,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quick_config() -> ServiceConfig {
        ServiceConfig {
            poll_timeout: Duration::from_millis(100),
            ..Default::default()
        }
    }

    async fn add_node(service: &NetworkService, id: i32) -> ControlResponse {
        service
            .handle(ControlRequest::AddNode {
                node_id: NodeId::new(id),
                x: id as f32,
                y: 0.0,
                z: 0.0,
                bind_address: "127.0.0.1:0".to_string(),
            })
            .await
    }

    async fn start_network(service: &NetworkService) -> ControlResponse {
        service
            .handle(ControlRequest::StartNetwork {
                client_id: ClientId::new(1),
            })
            .await
    }

    #[tokio::test]
    async fn test_query_before_activation_returns_sentinel() {
        let service = NetworkService::new(&quick_config()).await.unwrap();
        let response = service
            .handle(ControlRequest::GetTargetGlobalPosition {
                client_id: ClientId::new(1),
            })
            .await;
        match response {
            ControlResponse::TargetPosition { status, x, y, z } => {
                assert_eq!(status, TargetStatus::Error);
                assert!(x.is_infinite() && y.is_infinite() && z.is_infinite());
            }
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_duplicate_registration_rejected() {
        let service = NetworkService::new(&quick_config()).await.unwrap();
        assert_eq!(
            add_node(&service, 1).await,
            ControlResponse::AddNode {
                status: NodeStatus::Ok
            }
        );
        assert_eq!(
            add_node(&service, 1).await,
            ControlResponse::AddNode {
                status: NodeStatus::Error
            }
        );
        assert_eq!(service.state().get_nodes_info().await.len(), 1);
    }

    #[tokio::test]
    async fn test_registration_after_activation_rejected() {
        let service = NetworkService::new(&quick_config()).await.unwrap();
        add_node(&service, 1).await;
        assert_eq!(
            start_network(&service).await,
            ControlResponse::StartNetwork {
                status: StartStatus::Ok,
                n_nodes: 1
            }
        );
        assert_eq!(
            add_node(&service, 2).await,
            ControlResponse::AddNode {
                status: NodeStatus::Error
            }
        );
    }

    #[tokio::test]
    async fn test_zero_node_activation_succeeds() {
        let service = NetworkService::new(&quick_config()).await.unwrap();
        assert_eq!(
            start_network(&service).await,
            ControlResponse::StartNetwork {
                status: StartStatus::Ok,
                n_nodes: 0
            }
        );
        // Active but nothing to gather: the first query fails cleanly.
        let response = service
            .handle(ControlRequest::GetTargetGlobalPosition {
                client_id: ClientId::new(1),
            })
            .await;
        assert!(matches!(
            response,
            ControlResponse::TargetPosition {
                status: TargetStatus::Error,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_second_start_reports_error_with_count() {
        let service = NetworkService::new(&quick_config()).await.unwrap();
        add_node(&service, 1).await;
        add_node(&service, 2).await;
        assert_eq!(
            start_network(&service).await,
            ControlResponse::StartNetwork {
                status: StartStatus::Ok,
                n_nodes: 2
            }
        );
        assert_eq!(
            start_network(&service).await,
            ControlResponse::StartNetwork {
                status: StartStatus::Error,
                n_nodes: 2
            }
        );
    }

    #[tokio::test]
    async fn test_at_most_one_concurrent_start_wins() {
        let service = Arc::new(NetworkService::new(&quick_config()).await.unwrap());
        let mut attempts = Vec::new();
        for _ in 0..16 {
            let service = Arc::clone(&service);
            attempts.push(tokio::spawn(
                async move { start_network(&service).await },
            ));
        }

        let mut wins = 0;
        for attempt in attempts {
            if let ControlResponse::StartNetwork {
                status: StartStatus::Ok,
                ..
            } = attempt.await.unwrap()
            {
                wins += 1;
            }
        }
        assert_eq!(wins, 1);
    }

    #[tokio::test]
    async fn test_bad_address_aborts_activation() {
        let service = NetworkService::new(&quick_config()).await.unwrap();
        service
            .handle(ControlRequest::AddNode {
                node_id: NodeId::new(1),
                x: 0.0,
                y: 0.0,
                z: 0.0,
                bind_address: "not-an-address".to_string(),
            })
            .await;

        assert!(matches!(
            start_network(&service).await,
            ControlResponse::StartNetwork {
                status: StartStatus::Error,
                n_nodes: 1
            }
        ));
        // The flag stays down, so a retry against a fixed registry is possible.
        assert!(!service.state().get_is_active().await);
    }
}
