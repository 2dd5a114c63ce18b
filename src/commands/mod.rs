// ABOUTME: Command module aggregator for the shipyard CLI.
// ABOUTME: Re-exports unit-file and control-plane store command handlers.

mod store;
mod unit;

pub use store::{create_rollout, list_rollouts, list_tasks, migrate, show_rollout};
pub use unit::{inspect, patch_image, render, validate};
