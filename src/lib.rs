// ABOUTME: Library root for shipyard - exposes the control-plane core for the CLI and tests.
// ABOUTME: The main binary is in main.rs.

pub mod config;
pub mod descriptor;
pub mod error;
pub mod output;
pub mod queue;
pub mod rollout;
pub mod store;
pub mod types;
pub mod unit;
pub mod vault;
