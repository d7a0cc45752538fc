//! Test harness for the multilateration sensor network
//!
//! Spins up real components on ephemeral loopback ports so the end-to-end
//! suites exercise the same code paths as a deployed fleet.

pub mod cluster;

pub use cluster::TestNet;
