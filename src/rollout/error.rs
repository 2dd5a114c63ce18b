// ABOUTME: Error types for rollout orchestration.
// ABOUTME: Distinguishes rejected requests, missing records, rolled-back writes, and illegal status moves.

use crate::error::ErrorKind;
use crate::store::StoreError;
use crate::types::{HostId, NodeId, RolloutId};
use crate::vault::VaultError;

use super::ArtifactError;

#[derive(Debug, thiserror::Error)]
pub enum RolloutError {
    #[error("a rollout needs at least one host")]
    NoHosts,

    #[error("rollout {0} not found")]
    RolloutNotFound(RolloutId),

    #[error("node deployment {0} not found")]
    NodeNotFound(NodeId),

    #[error("failed to render artifacts for host {host}: {source}")]
    Artifacts {
        host: HostId,
        #[source]
        source: ArtifactError,
    },

    /// The rollout and its nodes were not written; nothing is visible.
    #[error("rollout creation rolled back: {0}")]
    TransactionFailed(#[source] StoreError),

    #[error("cannot move {entity} {id} from {from} to {to}")]
    InvalidTransition {
        entity: &'static str,
        id: String,
        from: &'static str,
        to: &'static str,
    },

    #[error(transparent)]
    Vault(#[from] VaultError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl RolloutError {
    /// Returns the error kind for programmatic handling.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RolloutError::NoHosts | RolloutError::Artifacts { .. } => ErrorKind::Validation,
            RolloutError::RolloutNotFound(_) | RolloutError::NodeNotFound(_) => {
                ErrorKind::NotFound
            }
            RolloutError::TransactionFailed(_) => ErrorKind::TransactionFailure,
            RolloutError::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            RolloutError::Vault(_) => ErrorKind::Storage,
            RolloutError::Store(e) => e.kind(),
        }
    }
}
