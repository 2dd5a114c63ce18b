// ABOUTME: Reference rollout driver that applies a strategy using orchestrator primitives.
// ABOUTME: Parallel fans out, sequential stops at the first failure, canary gates the rest on a first batch.

use futures::future::join_all;
use std::sync::Arc;
use tracing::{info, warn};

use super::{
    HealthStatus, NodeDeployment, NodeStatus, Progress, RemoteExecutor, Rollout, RolloutError,
    RolloutOrchestrator, RolloutStatus, Strategy,
};
use crate::config::RolloutConfig;
use crate::types::RolloutId;

pub const DEFAULT_CANARY_SIZE: usize = 1;

pub struct RolloutDriver {
    orchestrator: RolloutOrchestrator,
    executor: Arc<dyn RemoteExecutor>,
    canary_size: usize,
}

impl RolloutDriver {
    pub fn new(orchestrator: RolloutOrchestrator, executor: Arc<dyn RemoteExecutor>) -> Self {
        Self {
            orchestrator,
            executor,
            canary_size: DEFAULT_CANARY_SIZE,
        }
    }

    /// Driver using the configured canary batch size.
    pub fn from_config(
        orchestrator: RolloutOrchestrator,
        executor: Arc<dyn RemoteExecutor>,
        config: &RolloutConfig,
    ) -> Self {
        Self::new(orchestrator, executor).with_canary_size(config.canary_size)
    }

    /// Hosts in the canary batch. Zero is treated as one.
    pub fn with_canary_size(mut self, size: usize) -> Self {
        self.canary_size = size.max(1);
        self
    }

    /// An app's own `[deploy] canary_size`, which wins over the configured one.
    pub fn with_app_canary_size(self, size: Option<usize>) -> Self {
        match size {
            Some(size) => self.with_canary_size(size),
            None => self,
        }
    }

    pub fn canary_size(&self) -> usize {
        self.canary_size
    }

    /// Drive every pending node of `rollout` according to its strategy and
    /// record the terminal status.
    ///
    /// Node failures are recorded on the node and never abort the call;
    /// only storage errors do.
    pub async fn run(&self, rollout: &RolloutId) -> Result<Rollout, RolloutError> {
        let current = self.orchestrator.get_rollout(rollout).await?;
        if current.status.is_terminal() {
            return Ok(current);
        }

        let nodes: Vec<_> = self
            .orchestrator
            .list_nodes(rollout)
            .await?
            .into_iter()
            .filter(|node| node.status == NodeStatus::Pending)
            .collect();

        self.orchestrator
            .set_rollout_status(
                rollout,
                RolloutStatus::Running,
                &format!("{} strategy over {} node(s)\n", current.strategy, nodes.len()),
            )
            .await?;

        let halted = match current.strategy {
            Strategy::Parallel => {
                self.deploy_batch(&nodes).await?;
                false
            }
            Strategy::Sequential => {
                let mut halted = false;
                for node in &nodes {
                    if !self.deploy_node(node).await? {
                        halted = true;
                        break;
                    }
                }
                halted
            }
            Strategy::Canary => {
                let split = self.canary_size.min(nodes.len());
                let (canary, rest) = nodes.split_at(split);
                if self.deploy_batch(canary).await? {
                    self.deploy_batch(rest).await?;
                    false
                } else {
                    !rest.is_empty()
                }
            }
        };

        let progress = self.orchestrator.recompute_progress(rollout).await?;
        let status = final_status(progress);
        let mut log = format!(
            "{} succeeded, {} failed, {} not attempted\n",
            progress.success,
            progress.failed,
            progress.outstanding()
        );
        if halted {
            log.insert_str(0, "halted after failure; ");
            warn!(rollout = %rollout, strategy = %current.strategy, "rollout halted");
        }

        info!(rollout = %rollout, status = %status, "rollout finished");
        self.orchestrator
            .set_rollout_status(rollout, status, &log)
            .await
    }

    /// Deploy `nodes` concurrently. True when every one succeeded.
    async fn deploy_batch(&self, nodes: &[NodeDeployment]) -> Result<bool, RolloutError> {
        let results = join_all(nodes.iter().map(|node| self.deploy_node(node))).await;
        let mut all_ok = true;
        for result in results {
            all_ok &= result?;
        }
        Ok(all_ok)
    }

    /// Apply one node. Returns whether it ended in success.
    async fn deploy_node(&self, node: &NodeDeployment) -> Result<bool, RolloutError> {
        self.orchestrator
            .update_node_status(&node.id, NodeStatus::Running, "", "")
            .await?;
        let artifacts = self.orchestrator.node_artifacts(&node.id).await?;

        let succeeded = match self.executor.execute(&node.host_id, &artifacts).await {
            Ok(outcome) => {
                self.orchestrator.record_execution(&node.id, &outcome).await?;
                if outcome.health == HealthStatus::Unhealthy {
                    self.orchestrator
                        .update_node_status(
                            &node.id,
                            NodeStatus::Failed,
                            &outcome.log,
                            "container reported unhealthy",
                        )
                        .await?;
                    false
                } else {
                    self.orchestrator
                        .update_node_status(&node.id, NodeStatus::Success, &outcome.log, "")
                        .await?;
                    true
                }
            }
            Err(e) => {
                warn!(node = %node.id, host = %node.host_id, error = %e, "node deployment failed");
                self.orchestrator
                    .update_node_status(&node.id, NodeStatus::Failed, &e.log, &e.message)
                    .await?;
                false
            }
        };

        self.orchestrator.recompute_progress(&node.rollout_id).await?;
        Ok(succeeded)
    }
}

/// Terminal status once the driver stops, including when it stopped early.
fn final_status(progress: Progress) -> RolloutStatus {
    progress.conclude().unwrap_or(if progress.success == 0 {
        RolloutStatus::Failed
    } else {
        RolloutStatus::Partial
    })
}
