//! Application layer for com-bridge.
//!
//! Knows the order of things (open A, open B, start, wait, close) and
//! delegates the actual I/O to the infrastructure layer.

pub mod run_bridge;

pub use run_bridge::{run, RunOutcome};
