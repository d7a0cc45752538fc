//! Constant-velocity Kalman filter
//!
//! State vector: [x, y, z, vx, vy, vz]. Measurement: [x, y, z]. The state
//! transition matrix and the process noise follow the discrete white-noise
//! acceleration model, rebuilt from `dt` before every predict step.

use nalgebra::{SMatrix, SVector};

use mlsn_core::Position;

type Vector6 = SVector<f64, 6>;
type Matrix6 = SMatrix<f64, 6, 6>;
type Matrix3 = SMatrix<f64, 3, 3>;
type Matrix3x6 = SMatrix<f64, 3, 6>;

/// Filter tuning knobs.
#[derive(Clone, Debug)]
pub struct KalmanConfig {
    /// White-noise acceleration spectral density per axis.
    pub noise_ax: f64,
    pub noise_ay: f64,
    pub noise_az: f64,
    /// Measurement variance per axis (sensor accuracy of +-40 mm squared).
    pub measurement_var: f64,
}

impl Default for KalmanConfig {
    fn default() -> Self {
        KalmanConfig {
            noise_ax: 2.0,
            noise_ay: 2.0,
            noise_az: 2.0,
            measurement_var: 0.0016,
        }
    }
}

/// Recursive position/velocity estimator.
pub struct KalmanFilter {
    /// State vector [x, y, z, vx, vy, vz].
    x: Vector6,
    /// State covariance. Positions start confident, velocities do not.
    p: Matrix6,
    /// State transition matrix; depends on dt.
    f: Matrix6,
    /// Process noise covariance; depends on dt.
    q: Matrix6,
    /// Measurement noise covariance.
    r: Matrix3,
    /// Measurement matrix mapping state to the observed position.
    h: Matrix3x6,
    noise_ax: f64,
    noise_ay: f64,
    noise_az: f64,
}

impl KalmanFilter {
    pub fn new(config: KalmanConfig) -> Self {
        let p = Matrix6::from_diagonal(&Vector6::new(1.0, 1.0, 1.0, 100.0, 100.0, 100.0));
        let r = Matrix3::identity() * config.measurement_var;

        let mut h = Matrix3x6::zeros();
        h[(0, 0)] = 1.0;
        h[(1, 1)] = 1.0;
        h[(2, 2)] = 1.0;

        KalmanFilter {
            x: Vector6::zeros(),
            p,
            f: Matrix6::identity(),
            q: Matrix6::zeros(),
            r,
            h,
            noise_ax: config.noise_ax,
            noise_ay: config.noise_ay,
            noise_az: config.noise_az,
        }
    }

    /// Reset the state to a known position with zero velocity.
    pub fn set_state(&mut self, position: &Position) {
        self.x = Vector6::new(position.x, position.y, position.z, 0.0, 0.0, 0.0);
    }

    /// The estimated position.
    pub fn position(&self) -> Position {
        Position::new(self.x[0], self.x[1], self.x[2])
    }

    /// The estimated velocity.
    pub fn velocity(&self) -> Position {
        Position::new(self.x[3], self.x[4], self.x[5])
    }

    /// Rebuild the dt-dependent matrices F and Q.
    pub fn update_matrices(&mut self, dt: f64) {
        let dt2 = dt * dt;
        let dt3 = dt2 * dt;
        let dt4 = dt3 * dt;

        self.f = Matrix6::identity();
        self.f[(0, 3)] = dt;
        self.f[(1, 4)] = dt;
        self.f[(2, 5)] = dt;

        let noise = [self.noise_ax, self.noise_ay, self.noise_az];
        self.q = Matrix6::zeros();
        for (axis, &n) in noise.iter().enumerate() {
            self.q[(axis, axis)] = dt4 / 4.0 * n;
            self.q[(axis, axis + 3)] = dt3 / 2.0 * n;
            self.q[(axis + 3, axis)] = dt3 / 2.0 * n;
            self.q[(axis + 3, axis + 3)] = dt2 * n;
        }
    }

    /// Extrapolate the state forward.
    pub fn predict(&mut self) {
        self.x = self.f * self.x;
        self.p = self.f * self.p * self.f.transpose() + self.q;
    }

    /// Correct the extrapolation with a position measurement.
    pub fn update(&mut self, measurement: &Position) {
        let z = SVector::<f64, 3>::new(measurement.x, measurement.y, measurement.z);
        let innovation = z - self.h * self.x;
        let s = self.h * self.p * self.h.transpose() + self.r;
        let Some(s_inverse) = s.try_inverse() else {
            // R is positive definite, so this cannot happen with a sane P;
            // skip the correction rather than corrupt the state.
            tracing::warn!("singular innovation covariance, skipping update");
            return;
        };
        let gain = self.p * self.h.transpose() * s_inverse;
        self.x += gain * innovation;
        self.p = (Matrix6::identity() - gain * self.h) * self.p;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> KalmanFilter {
        KalmanFilter::new(KalmanConfig::default())
    }

    #[test]
    fn test_set_state_zeroes_velocity() {
        let mut kalman = filter();
        kalman.set_state(&Position::new(4.5, 2.5, 1.5));
        assert_eq!(kalman.position(), Position::new(4.5, 2.5, 1.5));
        assert_eq!(kalman.velocity(), Position::zeros());
    }

    #[test]
    fn test_predict_moves_along_velocity() {
        let mut kalman = filter();
        kalman.x = Vector6::new(0.0, 0.0, 0.0, 1.0, 2.0, 3.0);
        kalman.update_matrices(0.5);
        kalman.predict();
        assert_eq!(kalman.position(), Position::new(0.5, 1.0, 1.5));
    }

    #[test]
    fn test_update_pulls_toward_measurement() {
        let mut kalman = filter();
        kalman.set_state(&Position::zeros());
        kalman.update_matrices(0.1);
        kalman.predict();
        kalman.update(&Position::new(1.0, 0.0, 0.0));

        let x = kalman.position().x;
        assert!(x > 0.0 && x <= 1.0, "estimate {x} outside (0, 1]");
    }

    #[test]
    fn test_covariance_shrinks_with_measurements() {
        let mut kalman = filter();
        kalman.set_state(&Position::zeros());

        let before = kalman.p.trace();
        for _ in 0..10 {
            kalman.update_matrices(0.1);
            kalman.predict();
            kalman.update(&Position::zeros());
        }
        assert!(kalman.p.trace() < before);
    }

    #[test]
    fn test_constant_velocity_track_converges() {
        let mut kalman = filter();
        let dt = 0.1;
        let velocity = Position::new(2.0, -1.0, 0.5);

        kalman.set_state(&Position::zeros());
        for step in 1..=50 {
            let truth = velocity * (step as f64 * dt);
            kalman.update_matrices(dt);
            kalman.predict();
            kalman.update(&truth);
        }

        let truth = velocity * (50.0 * dt);
        assert!((kalman.position() - truth).norm() < 0.05);
        assert!((kalman.velocity() - velocity).norm() < 0.2);
    }
}
