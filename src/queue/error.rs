// ABOUTME: Error types for build queue operations.
// ABOUTME: Separates the expected empty-queue signal from lost races and storage failures.

use crate::error::ErrorKind;
use crate::store::StoreError;
use crate::types::TaskId;
use crate::vault::VaultError;

use super::TaskStatus;

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// Nothing is pending. Workers treat this as "no work", not a failure.
    #[error("no pending build task")]
    Empty,

    #[error("build task {0} not found")]
    NotFound(TaskId),

    /// Another caller claimed the selected task first.
    #[error("build task {0} was claimed by another worker")]
    ClaimedElsewhere(TaskId),

    #[error("build task {id} is {status}, cannot {action}")]
    InvalidTransition {
        id: TaskId,
        status: TaskStatus,
        action: &'static str,
    },

    /// The claimed task's payload could not be opened or parsed. The task has
    /// been marked failed.
    #[error("build task {id} has an undecodable payload: {reason}")]
    UndecodablePayload { id: TaskId, reason: String },

    #[error("invalid build job payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error(transparent)]
    Vault(#[from] VaultError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl QueueError {
    /// Returns the error kind for programmatic handling.
    pub fn kind(&self) -> ErrorKind {
        match self {
            QueueError::Empty | QueueError::NotFound(_) => ErrorKind::NotFound,
            QueueError::ClaimedElsewhere(_) => ErrorKind::ConcurrencyConflict,
            QueueError::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            QueueError::Payload(_) | QueueError::UndecodablePayload { .. } => ErrorKind::Format,
            QueueError::Vault(_) => ErrorKind::Storage,
            QueueError::Store(e) => e.kind(),
        }
    }

    /// True when a claim lost to another worker and may simply be retried.
    pub fn is_conflict(&self) -> bool {
        self.kind() == ErrorKind::ConcurrencyConflict
    }
}
