//! Network coordinator for the multilateration sensor network
//!
//! The coordinator registers nodes during the pre-activation window and
//! freezes the registry on `StartNetwork`. From then on it serves position
//! estimates by scatter-gathering distances from every node and solving
//! the non-linear least-squares multilateration problem.

pub mod dealer;
pub mod service;
pub mod solver;
pub mod state;

pub use dealer::{DealerConfig, DistanceDealer};
pub use service::{NetworkServer, NetworkService, ServiceConfig};
pub use solver::Multilateration;
pub use state::{NetworkState, NodeRecord};
