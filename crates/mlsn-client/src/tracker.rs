//! Target tracker
//!
//! Wraps the Kalman filter with initialization and dt bookkeeping. The
//! first estimate seeds the state with zero velocity; every later estimate
//! runs a predict/update cycle over the elapsed wall time.

use std::time::Instant;

use mlsn_core::Position;

use crate::kalman::{KalmanConfig, KalmanFilter};

/// Tracks the target and predicts its position between estimates.
pub struct Tracker {
    kalman: KalmanFilter,
    last_update: Option<Instant>,
    predicted: Option<Position>,
}

impl Tracker {
    pub fn new(config: KalmanConfig) -> Self {
        Tracker {
            kalman: KalmanFilter::new(config),
            last_update: None,
            predicted: None,
        }
    }

    /// Feed one position estimate observed at `at`; returns the new
    /// predicted position.
    pub fn observe(&mut self, measurement: Position, at: Instant) -> Position {
        let predicted = match self.last_update {
            None => {
                self.kalman.set_state(&measurement);
                measurement
            }
            Some(previous) => {
                let dt = at.saturating_duration_since(previous).as_secs_f64();
                self.kalman.update_matrices(dt);
                self.kalman.predict();
                self.kalman.update(&measurement);
                self.kalman.position()
            }
        };

        self.last_update = Some(at);
        self.predicted = Some(predicted);
        predicted
    }

    /// The latest prediction, if any estimate has arrived yet.
    pub fn predicted_position(&self) -> Option<Position> {
        self.predicted
    }

    pub fn is_initialized(&self) -> bool {
        self.last_update.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_first_observation_initializes() {
        let mut tracker = Tracker::new(KalmanConfig::default());
        assert!(!tracker.is_initialized());
        assert!(tracker.predicted_position().is_none());

        let measurement = Position::new(4.5, 2.5, 1.5);
        let predicted = tracker.observe(measurement, Instant::now());
        assert_eq!(predicted, measurement);
        assert!(tracker.is_initialized());
    }

    #[test]
    fn test_later_observations_are_filtered() {
        let mut tracker = Tracker::new(KalmanConfig::default());
        let t0 = Instant::now();

        tracker.observe(Position::zeros(), t0);
        let predicted = tracker.observe(
            Position::new(1.0, 0.0, 0.0),
            t0 + Duration::from_millis(100),
        );

        // The filter trusts the precise measurement model heavily, but the
        // prediction must stay between the prior and the measurement.
        assert!(predicted.x > 0.0 && predicted.x <= 1.0);
    }

    #[test]
    fn test_out_of_order_timestamps_do_not_panic() {
        let mut tracker = Tracker::new(KalmanConfig::default());
        let t0 = Instant::now();
        tracker.observe(Position::zeros(), t0 + Duration::from_secs(1));
        let predicted = tracker.observe(Position::new(1.0, 1.0, 1.0), t0);
        assert!(predicted.x.is_finite());
    }
}
