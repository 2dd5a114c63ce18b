// ABOUTME: Transactional rollout state over the shared store.
// ABOUTME: Creates a rollout with all its nodes atomically and exposes status and progress primitives.

use chrono::{DateTime, Utc};
use snafu::ResultExt;
use sqlx::Row;
use sqlx::sqlite::SqliteRow;
use std::sync::Arc;
use tracing::{debug, info};

use super::{
    ArtifactSource, ExecutionOutcome, HealthStatus, NodeArtifacts, NodeDeployment, NodeStatus,
    Progress, Rollout, RolloutError, RolloutStatus, Strategy,
};
use crate::store::{CorruptSnafu, Database, QuerySnafu, StoreError};
use crate::types::{AppId, HostId, NodeId, ReleaseId, RolloutId};
use crate::vault::{self, Vault};

const SELECT_ROLLOUT: &str = "SELECT id, app_id, release_id, strategy, status, total_nodes, \
     success_nodes, failed_nodes, log, created_at, started_at, finished_at FROM rollouts";

const SELECT_NODE: &str = "SELECT id, rollout_id, host_id, position, status, log, error, \
     container_id, assigned_port, health, started_at, finished_at FROM node_deployments";

#[derive(Clone)]
pub struct RolloutOrchestrator {
    db: Database,
    vault: Arc<dyn Vault>,
}

impl std::fmt::Debug for RolloutOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RolloutOrchestrator")
            .field("db", &self.db)
            .finish()
    }
}

impl RolloutOrchestrator {
    pub fn new(db: Database, vault: Arc<dyn Vault>) -> Self {
        Self { db, vault }
    }

    /// Create a pending rollout with one pending node per host.
    ///
    /// Artifacts are rendered for every host before anything is written. The
    /// parent and all nodes then commit together or not at all.
    pub async fn create_rollout(
        &self,
        app: &AppId,
        release: &ReleaseId,
        strategy: Strategy,
        hosts: &[HostId],
        artifacts: &dyn ArtifactSource,
    ) -> Result<Rollout, RolloutError> {
        if hosts.is_empty() {
            return Err(RolloutError::NoHosts);
        }

        let mut rendered = Vec::with_capacity(hosts.len());
        for host in hosts {
            let files = artifacts
                .render(host)
                .map_err(|source| RolloutError::Artifacts {
                    host: host.clone(),
                    source,
                })?;
            let env_text = vault::seal(self.vault.as_ref(), &files.env_text)?;
            rendered.push((host, files.unit_text, env_text));
        }

        let rollout = Rollout {
            id: RolloutId::generate(),
            app_id: app.clone(),
            release_id: release.clone(),
            strategy,
            status: RolloutStatus::Pending,
            progress: Progress {
                total: hosts.len() as u32,
                success: 0,
                failed: 0,
            },
            log: String::new(),
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        };

        self.insert_rollout(&rollout, &rendered)
            .await
            .map_err(|source| RolloutError::TransactionFailed(StoreError::Query { source }))?;

        info!(
            rollout = %rollout.id,
            release = %release,
            strategy = %strategy,
            hosts = hosts.len(),
            "created rollout"
        );
        Ok(rollout)
    }

    async fn insert_rollout(
        &self,
        rollout: &Rollout,
        nodes: &[(&HostId, String, String)],
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.db.pool().begin().await?;

        sqlx::query(
            "INSERT INTO rollouts (id, app_id, release_id, strategy, status, total_nodes, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(rollout.id.as_str())
        .bind(rollout.app_id.as_str())
        .bind(rollout.release_id.as_str())
        .bind(rollout.strategy.as_str())
        .bind(rollout.status.as_str())
        .bind(i64::from(rollout.progress.total))
        .bind(rollout.created_at)
        .execute(&mut *tx)
        .await?;

        for (position, (host, unit_text, env_text)) in nodes.iter().enumerate() {
            sqlx::query(
                "INSERT INTO node_deployments \
                 (id, rollout_id, host_id, position, status, unit_text, env_text) \
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(NodeId::generate().as_str())
            .bind(rollout.id.as_str())
            .bind(host.as_str())
            .bind(position as i64)
            .bind(NodeStatus::Pending.as_str())
            .bind(unit_text)
            .bind(env_text)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await
    }

    /// Move a node to `status`, appending `log` and replacing its error text.
    ///
    /// Stamps `started_at` when the node starts running and `finished_at` when
    /// it reaches success or failed. A node never returns to pending.
    pub async fn update_node_status(
        &self,
        node: &NodeId,
        status: NodeStatus,
        log: &str,
        error: &str,
    ) -> Result<NodeDeployment, RolloutError> {
        let current = self.get_node(node).await?;
        if status == NodeStatus::Pending && current.status != NodeStatus::Pending {
            return Err(RolloutError::InvalidTransition {
                entity: "node",
                id: node.to_string(),
                from: current.status.as_str(),
                to: status.as_str(),
            });
        }

        let now = Utc::now();
        let started_at = match (current.status, status) {
            (NodeStatus::Running, _) => current.started_at,
            (_, NodeStatus::Running) => Some(now),
            _ => current.started_at,
        };
        let finished_at = match status {
            NodeStatus::Success | NodeStatus::Failed => Some(now),
            NodeStatus::Pending | NodeStatus::Running => None,
        };

        // Conditional on the status read above so a concurrent update is not overwritten.
        let result = sqlx::query(
            "UPDATE node_deployments SET status = ?, log = log || ?, error = ?, \
             started_at = ?, finished_at = ? WHERE id = ? AND status = ?",
        )
        .bind(status.as_str())
        .bind(log)
        .bind(error)
        .bind(started_at)
        .bind(finished_at)
        .bind(node.as_str())
        .bind(current.status.as_str())
        .execute(self.db.pool())
        .await
        .context(QuerySnafu)?;

        if result.rows_affected() == 0 {
            return Err(RolloutError::InvalidTransition {
                entity: "node",
                id: node.to_string(),
                from: current.status.as_str(),
                to: status.as_str(),
            });
        }

        debug!(node = %node, from = %current.status, to = %status, "node status updated");
        self.get_node(node).await
    }

    /// Store what the executor reported about the running container.
    pub async fn record_execution(
        &self,
        node: &NodeId,
        outcome: &ExecutionOutcome,
    ) -> Result<(), RolloutError> {
        let result = sqlx::query(
            "UPDATE node_deployments SET container_id = ?, assigned_port = ?, health = ? \
             WHERE id = ?",
        )
        .bind(&outcome.container_id)
        .bind(outcome.assigned_port.map(i64::from))
        .bind(outcome.health.as_str())
        .bind(node.as_str())
        .execute(self.db.pool())
        .await
        .context(QuerySnafu)?;

        if result.rows_affected() == 0 {
            return Err(RolloutError::NodeNotFound(node.clone()));
        }
        Ok(())
    }

    /// Recount node outcomes and overwrite the rollout's counters.
    ///
    /// Leaves the rollout status alone. Safe to call at any time.
    pub async fn recompute_progress(&self, rollout: &RolloutId) -> Result<Progress, RolloutError> {
        let result = sqlx::query(
            "UPDATE rollouts SET \
             success_nodes = (SELECT COUNT(*) FROM node_deployments \
                              WHERE rollout_id = ?1 AND status = 'success'), \
             failed_nodes = (SELECT COUNT(*) FROM node_deployments \
                             WHERE rollout_id = ?1 AND status = 'failed') \
             WHERE id = ?1",
        )
        .bind(rollout.as_str())
        .execute(self.db.pool())
        .await
        .context(QuerySnafu)?;

        if result.rows_affected() == 0 {
            return Err(RolloutError::RolloutNotFound(rollout.clone()));
        }

        let progress = self.get_rollout(rollout).await?.progress;
        debug!(
            rollout = %rollout,
            success = progress.success,
            failed = progress.failed,
            total = progress.total,
            "progress recomputed"
        );
        Ok(progress)
    }

    /// Set the rollout's status, appending `log`.
    ///
    /// Stamps `started_at` on the first move to running and `finished_at` on
    /// success, failed or partial. A rollout never returns to pending.
    pub async fn set_rollout_status(
        &self,
        rollout: &RolloutId,
        status: RolloutStatus,
        log: &str,
    ) -> Result<Rollout, RolloutError> {
        let current = self.get_rollout(rollout).await?;
        self.apply_rollout_status(&current, status, log).await
    }

    /// Move `current` to `status`, provided nobody changed it since it was read.
    async fn apply_rollout_status(
        &self,
        current: &Rollout,
        status: RolloutStatus,
        log: &str,
    ) -> Result<Rollout, RolloutError> {
        let rollout = &current.id;
        let invalid = || RolloutError::InvalidTransition {
            entity: "rollout",
            id: rollout.to_string(),
            from: current.status.as_str(),
            to: status.as_str(),
        };
        if status == RolloutStatus::Pending && current.status != RolloutStatus::Pending {
            return Err(invalid());
        }

        let now = Utc::now();
        let started_at = match status {
            RolloutStatus::Running => current.started_at.or(Some(now)),
            _ => current.started_at,
        };
        let finished_at = if status.is_terminal() { Some(now) } else { None };

        let result = sqlx::query(
            "UPDATE rollouts SET status = ?, log = log || ?, started_at = ?, finished_at = ? \
             WHERE id = ? AND status = ?",
        )
        .bind(status.as_str())
        .bind(log)
        .bind(started_at)
        .bind(finished_at)
        .bind(rollout.as_str())
        .bind(current.status.as_str())
        .execute(self.db.pool())
        .await
        .context(QuerySnafu)?;

        if result.rows_affected() == 0 {
            return Err(invalid());
        }

        info!(rollout = %rollout, from = %current.status, to = %status, "rollout status set");
        self.get_rollout(rollout).await
    }

    pub async fn get_rollout(&self, id: &RolloutId) -> Result<Rollout, RolloutError> {
        let row = sqlx::query(&format!("{SELECT_ROLLOUT} WHERE id = ?"))
            .bind(id.as_str())
            .fetch_optional(self.db.pool())
            .await
            .context(QuerySnafu)?
            .ok_or_else(|| RolloutError::RolloutNotFound(id.clone()))?;
        Ok(rollout_from_row(&row)?)
    }

    /// Rollouts of `app`, newest first.
    pub async fn list_rollouts(&self, app: &AppId) -> Result<Vec<Rollout>, RolloutError> {
        let rows = sqlx::query(&format!(
            "{SELECT_ROLLOUT} WHERE app_id = ? ORDER BY created_at DESC, rowid DESC"
        ))
        .bind(app.as_str())
        .fetch_all(self.db.pool())
        .await
        .context(QuerySnafu)?;

        Ok(rows
            .iter()
            .map(rollout_from_row)
            .collect::<Result<_, _>>()?)
    }

    /// Nodes of a rollout in host order.
    pub async fn list_nodes(&self, rollout: &RolloutId) -> Result<Vec<NodeDeployment>, RolloutError> {
        let rows = sqlx::query(&format!(
            "{SELECT_NODE} WHERE rollout_id = ? ORDER BY position"
        ))
        .bind(rollout.as_str())
        .fetch_all(self.db.pool())
        .await
        .context(QuerySnafu)?;

        if rows.is_empty() {
            // Distinguish an unknown rollout from one whose nodes were removed.
            self.get_rollout(rollout).await?;
        }
        Ok(rows.iter().map(node_from_row).collect::<Result<_, _>>()?)
    }

    pub async fn get_node(&self, id: &NodeId) -> Result<NodeDeployment, RolloutError> {
        let row = sqlx::query(&format!("{SELECT_NODE} WHERE id = ?"))
            .bind(id.as_str())
            .fetch_optional(self.db.pool())
            .await
            .context(QuerySnafu)?
            .ok_or_else(|| RolloutError::NodeNotFound(id.clone()))?;
        Ok(node_from_row(&row)?)
    }

    /// The unit and decrypted environment file generated for a node.
    pub async fn node_artifacts(&self, id: &NodeId) -> Result<NodeArtifacts, RolloutError> {
        let row = sqlx::query("SELECT unit_text, env_text FROM node_deployments WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(self.db.pool())
            .await
            .context(QuerySnafu)?
            .ok_or_else(|| RolloutError::NodeNotFound(id.clone()))?;

        let env_text: String = row.try_get("env_text").context(QuerySnafu)?;
        Ok(NodeArtifacts {
            unit_text: row.try_get("unit_text").context(QuerySnafu)?,
            env_text: vault::open(self.vault.as_ref(), &env_text)?,
        })
    }
}

fn rollout_from_row(row: &SqliteRow) -> Result<Rollout, StoreError> {
    Ok(Rollout {
        id: RolloutId::new(get::<String>(row, "id")?),
        app_id: AppId::new(get::<String>(row, "app_id")?),
        release_id: ReleaseId::new(get::<String>(row, "release_id")?),
        strategy: parse_text(row, "rollouts", "strategy")?,
        status: parse_text(row, "rollouts", "status")?,
        progress: Progress {
            total: counter(row, "rollouts", "total_nodes")?,
            success: counter(row, "rollouts", "success_nodes")?,
            failed: counter(row, "rollouts", "failed_nodes")?,
        },
        log: get(row, "log")?,
        created_at: get(row, "created_at")?,
        started_at: get(row, "started_at")?,
        finished_at: get(row, "finished_at")?,
    })
}

fn node_from_row(row: &SqliteRow) -> Result<NodeDeployment, StoreError> {
    let assigned_port = get::<Option<i64>>(row, "assigned_port")?
        .map(|port| {
            u16::try_from(port).map_err(|_| {
                CorruptSnafu {
                    table: "node_deployments",
                    column: "assigned_port",
                    value: port.to_string(),
                }
                .build()
            })
        })
        .transpose()?;

    Ok(NodeDeployment {
        id: NodeId::new(get::<String>(row, "id")?),
        rollout_id: RolloutId::new(get::<String>(row, "rollout_id")?),
        host_id: HostId::new(get::<String>(row, "host_id")?),
        position: counter(row, "node_deployments", "position")?,
        status: parse_text::<NodeStatus>(row, "node_deployments", "status")?,
        log: get(row, "log")?,
        error: get(row, "error")?,
        container_id: get(row, "container_id")?,
        assigned_port,
        health: parse_text::<HealthStatus>(row, "node_deployments", "health")?,
        started_at: get::<Option<DateTime<Utc>>>(row, "started_at")?,
        finished_at: get::<Option<DateTime<Utc>>>(row, "finished_at")?,
    })
}

fn get<'r, T>(row: &'r SqliteRow, column: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(column).context(QuerySnafu)
}

fn parse_text<T: std::str::FromStr>(
    row: &SqliteRow,
    table: &'static str,
    column: &'static str,
) -> Result<T, StoreError> {
    let value: String = get(row, column)?;
    value.parse().map_err(|_| {
        CorruptSnafu {
            table,
            column,
            value,
        }
        .build()
    })
}

fn counter(row: &SqliteRow, table: &'static str, column: &'static str) -> Result<u32, StoreError> {
    let value: i64 = get(row, column)?;
    u32::try_from(value).map_err(|_| {
        CorruptSnafu {
            table,
            column,
            value: value.to_string(),
        }
        .build()
    })
}
