//! Wire protocol for the multilateration sensor network
//!
//! Two planes share this crate:
//! - `control`: typed request/response messages exchanged over the TCP
//!   control plane (registration, activation, position queries)
//! - `data`: the scatter/gather datagrams exchanged between the network
//!   dealer and the node routers

pub mod control;
pub mod data;

pub use control::*;
pub use data::*;
