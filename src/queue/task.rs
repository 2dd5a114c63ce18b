// ABOUTME: Build task records and their job payloads.
// ABOUTME: Status is a closed enum; paused is an administrative hold with no automatic transitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::{AppId, ReleaseId, TaskId, text_enum};

text_enum! {
    /// Lifecycle of a build task.
    ///
    /// `Pending -> Running -> Completed | Failed`, plus an operator-driven
    /// `Pending <-> Paused` hold.
    pub enum TaskStatus {
        Pending => "pending",
        Running => "running",
        Completed => "completed",
        Failed => "failed",
        Paused => "paused",
    }
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        match self {
            TaskStatus::Completed | TaskStatus::Failed => true,
            TaskStatus::Pending | TaskStatus::Running | TaskStatus::Paused => false,
        }
    }
}

/// What to build. Serialized into the task row (through the vault, since
/// build args routinely carry registry credentials).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildJob {
    pub release_id: ReleaseId,
    pub app_id: AppId,
    /// Build context directory on the build host.
    pub context_path: String,
    /// Dockerfile contents.
    pub dockerfile: String,
    #[serde(default)]
    pub build_args: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct BuildTask {
    pub id: TaskId,
    /// Opaque token the submitter uses to correlate the task with its request.
    pub correlation: String,
    pub job: BuildJob,
    pub status: TaskStatus,
    pub log: String,
    /// `hostname:pid` of the worker that claimed the task.
    pub claimed_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
