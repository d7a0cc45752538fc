//! Trajectory updater
//!
//! Advances the waypoint cursor at a fixed rate and publishes each
//! position into the shared cell. With `loop_path` the cursor wraps after
//! the last waypoint; without it the task ends there.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::{interval, Duration};

use crate::state::TargetCell;
use crate::trajectory::Trajectory;

/// Updater tuning knobs.
#[derive(Clone, Debug)]
pub struct UpdaterConfig {
    /// Position update frequency, in Hz.
    pub frequency: f64,
    /// Restart the trajectory after the last waypoint.
    pub loop_path: bool,
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        UpdaterConfig {
            frequency: 3.0,
            loop_path: true,
        }
    }
}

/// Run the update loop until the trajectory ends or shutdown is signalled.
pub async fn run_trajectory_updater(
    cell: Arc<TargetCell>,
    trajectory: Trajectory,
    config: UpdaterConfig,
    mut shutdown: watch::Receiver<bool>,
) {
    let period = Duration::from_secs_f64(1.0 / config.frequency.max(f64::EPSILON));
    let mut ticker = interval(period);
    let mut index = 0;

    tracing::info!(
        "trajectory updater running {} waypoints at {} Hz",
        trajectory.len(),
        config.frequency
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => break,
        }

        let waypoint = trajectory.waypoint(index);
        cell.set(waypoint).await;
        tracing::debug!(
            "target moved to ({:.3}, {:.3}, {:.3})",
            waypoint.x,
            waypoint.y,
            waypoint.z
        );

        index += 1;
        if index >= trajectory.len() {
            if config.loop_path {
                index = 0;
            } else {
                break;
            }
        }
    }

    tracing::info!("trajectory updater stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use mlsn_core::Position;

    fn line() -> Trajectory {
        Trajectory::from_json(r#"{"waypoints": [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [2.0, 0.0, 0.0]]}"#)
            .unwrap()
    }

    #[tokio::test]
    async fn test_updater_ends_without_looping() {
        let trajectory = line();
        let cell = Arc::new(TargetCell::new(trajectory.first()));
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        run_trajectory_updater(
            Arc::clone(&cell),
            trajectory,
            UpdaterConfig {
                frequency: 1000.0,
                loop_path: false,
            },
            shutdown_rx,
        )
        .await;

        assert_eq!(cell.get().await, Position::new(2.0, 0.0, 0.0));
    }

    #[tokio::test]
    async fn test_updater_wraps_when_looping() {
        let trajectory = line();
        let cell = Arc::new(TargetCell::new(trajectory.first()));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let updater = tokio::spawn(run_trajectory_updater(
            Arc::clone(&cell),
            trajectory,
            UpdaterConfig {
                frequency: 1000.0,
                loop_path: true,
            },
            shutdown_rx,
        ));

        // Enough ticks to pass the end of the trajectory at least once.
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown_tx.send(true).unwrap();
        updater.await.unwrap();

        let position = cell.get().await;
        assert!(position.x >= 0.0 && position.x <= 2.0);
    }
}
