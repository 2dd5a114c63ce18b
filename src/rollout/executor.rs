// ABOUTME: Seam for applying generated unit files to a remote host.
// ABOUTME: The SSH-backed implementation lives outside this crate; the driver only sees this trait.

use async_trait::async_trait;

use super::{HealthStatus, NodeArtifacts};
use crate::types::HostId;

/// Installs and starts a unit on a host.
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    async fn execute(
        &self,
        host: &HostId,
        artifacts: &NodeArtifacts,
    ) -> Result<ExecutionOutcome, ExecutionError>;
}

/// Runtime facts reported after a successful apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutcome {
    pub container_id: String,
    pub assigned_port: Option<u16>,
    pub health: HealthStatus,
    /// Command output worth keeping in the node log.
    pub log: String,
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct ExecutionError {
    pub message: String,
    pub log: String,
}

impl ExecutionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            log: String::new(),
        }
    }
}
