//! Transport layer for the multilateration sensor network
//!
//! - `rpc`: length-prefixed request/response framing over TCP, plus a
//!   bounded-concurrency serve loop shared by the target and network
//!   services
//! - `data`: the UDP socket used by the dealer/router data plane, with a
//!   timeout-bounded receive for the gather phase

pub mod data;
pub mod rpc;

pub use data::*;
pub use rpc::*;
