//! In-process cluster harness
//!
//! Every component binds `127.0.0.1:0`; addresses flow between components
//! exactly as they would across machines. Dropping the harness signals
//! shutdown to everything it spawned.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use mlsn_core::{ClientId, MlsnResult, NodeId, Position};
use mlsn_network::{NetworkServer, ServiceConfig};
use mlsn_node::{run_sensor_loop, NodeRouter, SensorCell, SensorConfig};
use mlsn_target::{run_trajectory_updater, TargetCell, TargetServer, Trajectory, UpdaterConfig};
use mlsn_transport::{DataSocket, RpcClient};
use mlsn_wire::{ControlRequest, ControlResponse};

/// One in-process deployment rooted at a network coordinator.
pub struct TestNet {
    shutdown: watch::Sender<bool>,
    network_addr: SocketAddr,
}

impl TestNet {
    /// Start a coordinator with the given gather poll timeout.
    pub async fn start(poll_timeout: Duration) -> MlsnResult<Self> {
        let server = NetworkServer::bind(
            "127.0.0.1:0",
            ServiceConfig {
                poll_timeout,
                ..Default::default()
            },
        )
        .await?;
        let network_addr = server.local_addr();

        let (shutdown, shutdown_rx) = watch::channel(false);
        tokio::spawn(server.run(shutdown_rx));

        Ok(TestNet {
            shutdown,
            network_addr,
        })
    }

    pub fn network_addr(&self) -> SocketAddr {
        self.network_addr
    }

    /// Fresh control-plane connection to the coordinator.
    pub async fn client(&self) -> MlsnResult<RpcClient> {
        RpcClient::connect(self.network_addr).await
    }

    /// Raw AddNode call with an arbitrary reply address.
    pub async fn add_node(
        &self,
        id: i32,
        position: [f64; 3],
        bind_address: &str,
    ) -> MlsnResult<ControlResponse> {
        let mut client = self.client().await?;
        client
            .call(&ControlRequest::AddNode {
                node_id: NodeId::new(id),
                x: position[0] as f32,
                y: position[1] as f32,
                z: position[2] as f32,
                bind_address: bind_address.to_string(),
            })
            .await
    }

    /// Spawn a router that always answers with a fixed distance, and
    /// register it.
    pub async fn spawn_static_node(
        &self,
        id: i32,
        position: [f64; 3],
        distance: f64,
    ) -> MlsnResult<ControlResponse> {
        let cell = Arc::new(SensorCell::new());
        cell.set(distance).await;

        let router = NodeRouter::bind("127.0.0.1:0", NodeId::new(id), cell).await?;
        let bind_address = router.local_addr().to_string();
        tokio::spawn(router.run(self.shutdown.subscribe()));

        self.add_node(id, position, &bind_address).await
    }

    /// Register a node whose reply address has no listener behind it.
    pub async fn register_dead_node(
        &self,
        id: i32,
        position: [f64; 3],
    ) -> MlsnResult<ControlResponse> {
        let socket = DataSocket::bind("127.0.0.1:0").await?;
        let bind_address = socket.local_addr().to_string();
        drop(socket);

        self.add_node(id, position, &bind_address).await
    }

    /// Start a target playing the given trajectory.
    pub async fn spawn_target(
        &self,
        trajectory_json: &str,
        frequency: f64,
        loop_path: bool,
    ) -> MlsnResult<SocketAddr> {
        let trajectory = Trajectory::from_json(trajectory_json)?;
        let cell = Arc::new(TargetCell::new(trajectory.first()));

        let server = TargetServer::bind("127.0.0.1:0", Arc::clone(&cell)).await?;
        let addr = server.local_addr();
        tokio::spawn(server.run(self.shutdown.subscribe()));
        tokio::spawn(run_trajectory_updater(
            cell,
            trajectory,
            UpdaterConfig {
                frequency,
                loop_path,
            },
            self.shutdown.subscribe(),
        ));

        Ok(addr)
    }

    /// Spawn a full node (sensor loop + router) against a live target, and
    /// register it.
    pub async fn spawn_live_node(
        &self,
        id: i32,
        position: [f64; 3],
        target_addr: SocketAddr,
        noise_var: f64,
    ) -> MlsnResult<ControlResponse> {
        let node_id = NodeId::new(id);
        let cell = Arc::new(SensorCell::new());

        let router = NodeRouter::bind("127.0.0.1:0", node_id, Arc::clone(&cell)).await?;
        let bind_address = router.local_addr().to_string();
        tokio::spawn(router.run(self.shutdown.subscribe()));

        tokio::spawn(run_sensor_loop(
            cell,
            node_id,
            Position::new(position[0], position[1], position[2]),
            target_addr.to_string(),
            SensorConfig {
                frequency: 50.0,
                noise_var,
            },
            self.shutdown.subscribe(),
        ));

        self.add_node(id, position, &bind_address).await
    }

    /// StartNetwork as client 1.
    pub async fn start_network(&self) -> MlsnResult<ControlResponse> {
        let mut client = self.client().await?;
        client
            .call(&ControlRequest::StartNetwork {
                client_id: ClientId::new(1),
            })
            .await
    }

    /// GetTargetGlobalPosition as client 1.
    pub async fn query_position(&self) -> MlsnResult<ControlResponse> {
        let mut client = self.client().await?;
        client
            .call(&ControlRequest::GetTargetGlobalPosition {
                client_id: ClientId::new(1),
            })
            .await
    }
}

impl Drop for TestNet {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}
