//! Wire status codes
//!
//! The numeric values (UNKNOWN=0, OK=1, ERROR=2) are part of the protocol
//! contract and must match across implementations.

/// Outcome of a target `GetPosition` call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum PositionStatus {
    #[default]
    Unknown = 0,
    Ok = 1,
    /// Reserved; never produced in normal operation.
    Error = 2,
}

impl PositionStatus {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(PositionStatus::Unknown),
            1 => Some(PositionStatus::Ok),
            2 => Some(PositionStatus::Error),
            _ => None,
        }
    }

    #[inline]
    pub fn to_byte(self) -> u8 {
        self as u8
    }
}

/// Outcome of an `AddNode` registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum NodeStatus {
    #[default]
    Unknown = 0,
    Ok = 1,
    /// Duplicate id, or the network is already active.
    Error = 2,
}

impl NodeStatus {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(NodeStatus::Unknown),
            1 => Some(NodeStatus::Ok),
            2 => Some(NodeStatus::Error),
            _ => None,
        }
    }

    #[inline]
    pub fn to_byte(self) -> u8 {
        self as u8
    }
}

/// Outcome of a `StartNetwork` activation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum StartStatus {
    #[default]
    Unknown = 0,
    Ok = 1,
    /// The network is already active, or activation setup failed.
    Error = 2,
}

impl StartStatus {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(StartStatus::Unknown),
            1 => Some(StartStatus::Ok),
            2 => Some(StartStatus::Error),
            _ => None,
        }
    }

    #[inline]
    pub fn to_byte(self) -> u8 {
        self as u8
    }
}

/// Outcome of a `GetTargetGlobalPosition` estimate.
///
/// Error responses carry `x = y = z = +inf` by contract; clients must
/// distinguish errors by status, never by value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum TargetStatus {
    #[default]
    Unknown = 0,
    Ok = 1,
    Error = 2,
}

impl TargetStatus {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(TargetStatus::Unknown),
            1 => Some(TargetStatus::Ok),
            2 => Some(TargetStatus::Error),
            _ => None,
        }
    }

    #[inline]
    pub fn to_byte(self) -> u8 {
        self as u8
    }
}
