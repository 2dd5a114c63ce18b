// ABOUTME: Multi-host rollout orchestration: records, artifacts, storage primitives, and a reference driver.
// ABOUTME: The orchestrator fixes the data contract; strategies are applied by whoever drives it.

mod artifacts;
pub mod driver;
mod error;
mod executor;
mod model;
mod orchestrator;

pub use artifacts::{ArtifactError, ArtifactSource, DescriptorArtifacts, NodeArtifacts};
pub use driver::RolloutDriver;
pub use error::RolloutError;
pub use executor::{ExecutionError, ExecutionOutcome, RemoteExecutor};
pub use model::{
    HealthStatus, NodeDeployment, NodeStatus, Progress, Rollout, RolloutStatus, Strategy,
};
pub use orchestrator::RolloutOrchestrator;
