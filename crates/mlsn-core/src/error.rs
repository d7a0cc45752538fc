//! Error types for the multilateration sensor network

use thiserror::Error;

use crate::NodeId;

/// Errors raised anywhere in the sensor network stack.
///
/// RPC handlers never surface these over the wire; every failure is mapped
/// to a domain status code before a response is sent.
#[derive(Error, Debug)]
pub enum MlsnError {
    // Wire errors
    #[error("invalid wire format: {0}")]
    InvalidWireFormat(String),

    #[error("buffer too short: expected {expected}, got {actual}")]
    BufferTooShort { expected: usize, actual: usize },

    #[error("unknown message kind: {0:#04x}")]
    UnknownMessageKind(u8),

    #[error("unknown status byte: {0}")]
    UnknownStatus(u8),

    // Registration errors
    #[error("node {0} is already registered")]
    DuplicateNode(NodeId),

    #[error("node {0} rejected by the network (duplicate id or network already active)")]
    RegistrationRejected(NodeId),

    #[error("network is already active")]
    AlreadyActive,

    #[error("network is not active")]
    NotActive,

    // Estimation errors
    #[error("insufficient measurements: need at least {needed}, got {got}")]
    InsufficientMeasurements { needed: usize, got: usize },

    #[error("least-squares solver failed to converge")]
    SolverDivergence,

    // Trajectory errors
    #[error("malformed trajectory: {0}")]
    MalformedTrajectory(String),

    // Transport errors
    #[error("transport error: {0}")]
    TransportError(String),

    #[error("connection closed by peer")]
    ConnectionClosed,

    #[error("i/o error: {0}")]
    Io(String),

    #[error("shutting down")]
    Shutdown,
}

/// Result type for sensor network operations.
pub type MlsnResult<T> = Result<T, MlsnError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_the_node() {
        let err = MlsnError::DuplicateNode(NodeId::new(3));
        assert!(err.to_string().contains('3'));
    }

    #[test]
    fn test_insufficient_measurements_counts() {
        let err = MlsnError::InsufficientMeasurements { needed: 3, got: 2 };
        let text = err.to_string();
        assert!(text.contains('3') && text.contains('2'));
    }
}
