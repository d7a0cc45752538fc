//! Sensor polling loop
//!
//! Fetches the target's position over the control plane at a fixed
//! frequency, computes the Euclidean distance from the sensor with
//! additive Gaussian noise, and publishes it into the sensor cell. RPC
//! failures leave the stored distance untouched; the connection is redialed
//! on the next tick.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use tokio::sync::watch;
use tokio::time::{interval, Duration};

use mlsn_core::{NodeId, Position, PositionStatus};
use mlsn_transport::RpcClient;
use mlsn_wire::{ControlRequest, ControlResponse};

use crate::sensor::SensorCell;

/// Sensor loop tuning knobs.
#[derive(Clone, Debug)]
pub struct SensorConfig {
    /// Measurement frequency, in Hz.
    pub frequency: f64,
    /// Variance of the additive Gaussian measurement noise, in m^2.
    pub noise_var: f64,
}

impl Default for SensorConfig {
    fn default() -> Self {
        SensorConfig {
            frequency: 10.0,
            noise_var: 0.0016,
        }
    }
}

/// Compute one noisy range measurement.
fn measure(sensor_position: &Position, target_position: &Position, noise_std: f64, rng: &mut StdRng) -> f64 {
    let ideal = (sensor_position - target_position).norm();
    let noise: f64 = rng.sample(StandardNormal);
    // Ranges are non-negative by definition; noise near zero could dip below.
    (ideal + noise * noise_std).max(0.0)
}

/// Run the measurement loop until shutdown.
pub async fn run_sensor_loop(
    cell: Arc<SensorCell>,
    node_id: NodeId,
    sensor_position: Position,
    target_addr: String,
    config: SensorConfig,
    mut shutdown: watch::Receiver<bool>,
) {
    let period = Duration::from_secs_f64(1.0 / config.frequency.max(f64::EPSILON));
    let noise_std = config.noise_var.max(0.0).sqrt();
    let mut ticker = interval(period);
    let mut rng = StdRng::from_entropy();
    let mut client: Option<RpcClient> = None;

    tracing::info!("sensor {node_id} polling at {} Hz", config.frequency);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => break,
        }

        if client.is_none() {
            match RpcClient::connect(&target_addr).await {
                Ok(connected) => client = Some(connected),
                Err(e) => {
                    tracing::warn!("sensor {node_id} cannot reach target at {target_addr}: {e}");
                    continue;
                }
            }
        }
        let Some(connection) = client.as_mut() else {
            continue;
        };

        let response = connection.call(&ControlRequest::GetPosition { node_id }).await;

        match response {
            Ok(ControlResponse::Position {
                status: PositionStatus::Ok,
                x,
                y,
                z,
            }) => {
                let target = Position::new(x as f64, y as f64, z as f64);
                let distance = measure(&sensor_position, &target, noise_std, &mut rng);
                cell.set(distance).await;
                tracing::trace!("sensor {node_id} measured {distance:.3} m");
            }
            Ok(other) => {
                tracing::warn!("sensor {node_id} got an unusable reply: {other:?}");
            }
            Err(e) => {
                tracing::warn!("sensor {node_id} poll failed: {e}");
                client = None;
            }
        }
    }

    tracing::info!("sensor {node_id} stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noiseless_measurement_is_euclidean() {
        let mut rng = StdRng::seed_from_u64(7);
        let sensor = Position::new(0.0, 0.0, 0.0);
        let target = Position::new(3.0, 4.0, 0.0);
        assert_eq!(measure(&sensor, &target, 0.0, &mut rng), 5.0);
    }

    #[test]
    fn test_measurement_never_negative() {
        let mut rng = StdRng::seed_from_u64(7);
        let point = Position::new(1.0, 1.0, 1.0);
        for _ in 0..1000 {
            assert!(measure(&point, &point, 10.0, &mut rng) >= 0.0);
        }
    }

    #[test]
    fn test_noise_statistics_within_three_sigma() {
        let mut rng = StdRng::seed_from_u64(42);
        let sensor = Position::new(0.0, 0.0, 0.0);
        let target = Position::new(10.0, 0.0, 0.0);
        let noise_std = 0.04;

        let samples = 10_000;
        let mean: f64 = (0..samples)
            .map(|_| measure(&sensor, &target, noise_std, &mut rng))
            .sum::<f64>()
            / samples as f64;

        // Sample mean of N draws stays within 3 sigma/sqrt(N) of the ideal.
        let bound = 3.0 * noise_std / (samples as f64).sqrt();
        assert!((mean - 10.0).abs() < bound, "mean {mean} outside {bound}");
    }
}
