//! Core types for the multilateration sensor network:
//! - Identifiers (NodeId, ClientId)
//! - Wire status codes shared by all services
//! - The common error type and result alias

pub mod error;
pub mod id;
pub mod status;

pub use error::*;
pub use id::*;
pub use status::*;

/// A point in 3D Euclidean space. All internal math runs on `f64`;
/// the wire carries `f32` per the protocol contract.
pub type Position = nalgebra::Vector3<f64>;
