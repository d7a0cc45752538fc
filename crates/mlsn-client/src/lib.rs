//! Client application for the multilateration sensor network
//!
//! Drives the system: starts the network, polls it for target position
//! estimates, smooths them with a constant-velocity Kalman filter, and
//! logs the predicted trajectory to CSV.

pub mod app;
pub mod kalman;
pub mod output;
pub mod tracker;

pub use app::{ClientApp, ClientConfig};
pub use kalman::{KalmanConfig, KalmanFilter};
pub use output::TrajectoryWriter;
pub use tracker::Tracker;
