// ABOUTME: Rollout and node-deployment records with their closed status enums.
// ABOUTME: Progress counters are derived from node statuses; conclude() maps them to a terminal status.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::types::{AppId, HostId, NodeId, ReleaseId, RolloutId, text_enum};

text_enum! {
    /// How a rollout walks its hosts.
    #[derive(Default)]
    pub enum Strategy {
        /// All hosts at once; partial success is allowed.
        #[default]
        Parallel => "parallel",
        /// One host at a time; stops at the first failure.
        Sequential => "sequential",
        /// A small batch first; the rest only if the batch fully succeeds.
        Canary => "canary",
    }
}

text_enum! {
    pub enum RolloutStatus {
        Pending => "pending",
        Running => "running",
        Success => "success",
        Failed => "failed",
        /// Terminal nodes are a mix of success and failure.
        Partial => "partial",
    }
}

impl RolloutStatus {
    pub fn is_terminal(&self) -> bool {
        match self {
            RolloutStatus::Success | RolloutStatus::Failed | RolloutStatus::Partial => true,
            RolloutStatus::Pending | RolloutStatus::Running => false,
        }
    }
}

text_enum! {
    pub enum NodeStatus {
        Pending => "pending",
        Running => "running",
        Success => "success",
        Failed => "failed",
    }
}

impl NodeStatus {
    pub fn is_terminal(&self) -> bool {
        match self {
            NodeStatus::Success | NodeStatus::Failed => true,
            NodeStatus::Pending | NodeStatus::Running => false,
        }
    }
}

text_enum! {
    pub enum HealthStatus {
        Healthy => "healthy",
        Unhealthy => "unhealthy",
        Unknown => "unknown",
    }
}

/// Node counters as last recomputed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub total: u32,
    pub success: u32,
    pub failed: u32,
}

impl Progress {
    /// Nodes that have not reached a terminal status.
    pub fn outstanding(&self) -> u32 {
        self.total.saturating_sub(self.success + self.failed)
    }

    /// Terminal status implied by the counters, once every node has finished.
    ///
    /// Returns `None` while any node is outstanding. Strategies that stop
    /// early decide for themselves; this only covers the fully-drained case.
    pub fn conclude(&self) -> Option<RolloutStatus> {
        if self.total == 0 || self.outstanding() > 0 {
            return None;
        }
        Some(match (self.success, self.failed) {
            (_, 0) => RolloutStatus::Success,
            (0, _) => RolloutStatus::Failed,
            _ => RolloutStatus::Partial,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Rollout {
    pub id: RolloutId,
    pub app_id: AppId,
    pub release_id: ReleaseId,
    pub strategy: Strategy,
    pub status: RolloutStatus,
    pub progress: Progress,
    pub log: String,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// One host's share of a rollout.
///
/// Artifacts are not carried here; fetch them with
/// `RolloutOrchestrator::node_artifacts`, which decrypts the env file.
#[derive(Debug, Clone, Serialize)]
pub struct NodeDeployment {
    pub id: NodeId,
    pub rollout_id: RolloutId,
    pub host_id: HostId,
    /// Host order within the rollout, starting at 0.
    pub position: u32,
    pub status: NodeStatus,
    pub log: String,
    pub error: String,
    pub container_id: Option<String>,
    pub assigned_port: Option<u16>,
    pub health: HealthStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn progress(total: u32, success: u32, failed: u32) -> Progress {
        Progress {
            total,
            success,
            failed,
        }
    }

    #[test]
    fn conclude_waits_for_outstanding_nodes() {
        assert_eq!(progress(3, 1, 1).conclude(), None);
        assert_eq!(progress(0, 0, 0).conclude(), None);
    }

    #[test]
    fn conclude_maps_drained_counters() {
        assert_eq!(progress(3, 3, 0).conclude(), Some(RolloutStatus::Success));
        assert_eq!(progress(3, 0, 3).conclude(), Some(RolloutStatus::Failed));
        assert_eq!(progress(3, 2, 1).conclude(), Some(RolloutStatus::Partial));
    }

    #[test]
    fn strategy_defaults_to_parallel() {
        assert_eq!(Strategy::default(), Strategy::Parallel);
        assert_eq!("canary".parse::<Strategy>().unwrap(), Strategy::Canary);
    }

    #[test]
    fn terminal_statuses() {
        assert!(RolloutStatus::Partial.is_terminal());
        assert!(!RolloutStatus::Running.is_terminal());
        assert!(NodeStatus::Failed.is_terminal());
        assert!(!NodeStatus::Pending.is_terminal());
    }
}
