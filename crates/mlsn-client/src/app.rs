//! Client application
//!
//! Starts the network, then polls it for target position estimates at a
//! fixed cadence. Each estimate feeds the tracker; each prediction lands in
//! the CSV output. Error rounds are skipped, and the cadence never exerts
//! backpressure on the network.

use std::path::Path;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use tokio::sync::watch;
use tokio::time::{interval, Duration};

use mlsn_core::{ClientId, MlsnError, MlsnResult, Position, StartStatus, TargetStatus};
use mlsn_transport::RpcClient;
use mlsn_wire::{ControlRequest, ControlResponse};

use crate::kalman::KalmanConfig;
use crate::output::TrajectoryWriter;
use crate::tracker::Tracker;

/// Client tuning knobs.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub client_id: ClientId,
    /// Estimate request frequency, in Hz.
    pub frequency: f64,
    pub kalman: KalmanConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            client_id: ClientId::new(1),
            frequency: 15.0,
            kalman: KalmanConfig::default(),
        }
    }
}

/// The driving client.
pub struct ClientApp {
    network_addr: String,
    client: Option<RpcClient>,
    tracker: Tracker,
    writer: TrajectoryWriter,
    config: ClientConfig,
}

impl ClientApp {
    /// Connect to the network and open the output file.
    pub async fn connect(
        network_addr: &str,
        output_path: &Path,
        config: ClientConfig,
    ) -> MlsnResult<Self> {
        let client = RpcClient::connect(network_addr).await?;
        let writer = TrajectoryWriter::create(output_path)?;
        Ok(ClientApp {
            network_addr: network_addr.to_string(),
            client: Some(client),
            tracker: Tracker::new(config.kalman.clone()),
            writer,
            config,
        })
    }

    /// Ask the network to activate. Fails if it is already active.
    async fn start_network(&mut self) -> MlsnResult<i32> {
        let Some(client) = self.client.as_mut() else {
            return Err(MlsnError::TransportError("not connected".into()));
        };
        let response = client
            .call(&ControlRequest::StartNetwork {
                client_id: self.config.client_id,
            })
            .await?;
        match response {
            ControlResponse::StartNetwork {
                status: StartStatus::Ok,
                n_nodes,
            } => Ok(n_nodes),
            ControlResponse::StartNetwork { .. } => Err(MlsnError::AlreadyActive),
            other => Err(MlsnError::InvalidWireFormat(format!(
                "unexpected response to StartNetwork: {other:?}"
            ))),
        }
    }

    /// Start the network and track until shutdown.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> MlsnResult<()> {
        let n_nodes = self.start_network().await?;
        tracing::info!("network started with {n_nodes} nodes");

        let period = Duration::from_secs_f64(1.0 / self.config.frequency.max(f64::EPSILON));
        let mut ticker = interval(period);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.changed() => break,
            }
            self.tick().await?;
        }

        tracing::info!("client stopped");
        Ok(())
    }

    /// One request/track/log cycle.
    async fn tick(&mut self) -> MlsnResult<()> {
        if self.client.is_none() {
            match RpcClient::connect(&self.network_addr).await {
                Ok(client) => self.client = Some(client),
                Err(e) => {
                    tracing::warn!("cannot reach the network: {e}");
                    return Ok(());
                }
            }
        }
        let Some(client) = self.client.as_mut() else {
            return Ok(());
        };

        let response = client
            .call(&ControlRequest::GetTargetGlobalPosition {
                client_id: self.config.client_id,
            })
            .await;

        match response {
            Ok(ControlResponse::TargetPosition {
                status: TargetStatus::Ok,
                x,
                y,
                z,
            }) => {
                let measurement = Position::new(x as f64, y as f64, z as f64);
                let predicted = self.tracker.observe(measurement, Instant::now());
                tracing::debug!(
                    "predicted position ({:.3}, {:.3}, {:.3})",
                    predicted.x,
                    predicted.y,
                    predicted.z
                );
                self.writer.append(unix_timestamp(), &predicted)?;
            }
            Ok(ControlResponse::TargetPosition { .. }) => {
                // The network cannot produce an estimate this round; skip.
                tracing::debug!("no estimate available, skipping tick");
            }
            Ok(other) => {
                tracing::warn!("unexpected response to position request: {other:?}");
            }
            Err(e) => {
                tracing::warn!("position request failed: {e}");
                self.client = None;
            }
        }
        Ok(())
    }
}

fn unix_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs_f64())
        .unwrap_or(0.0)
}
