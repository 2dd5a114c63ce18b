// ABOUTME: Durable build-task queue with exactly-once claiming.
// ABOUTME: Claims select the oldest pending task and flip it with a conditional update in one transaction.

mod error;
mod task;
pub mod worker;

pub use error::QueueError;
pub use task::{BuildJob, BuildTask, TaskStatus};

use chrono::{DateTime, Utc};
use snafu::ResultExt;
use sqlx::Row;
use sqlx::sqlite::SqliteRow;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::store::{CorruptSnafu, Database, QuerySnafu, StoreError};
use crate::types::TaskId;
use crate::vault::{self, Vault};

const SELECT_TASK: &str = "SELECT id, correlation, payload, status, log, claimed_by, \
     created_at, updated_at FROM build_tasks";

/// Build queue over the shared database.
#[derive(Clone)]
pub struct TaskQueue {
    db: Database,
    vault: Arc<dyn Vault>,
}

impl std::fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskQueue").field("db", &self.db).finish()
    }
}

impl TaskQueue {
    pub fn new(db: Database, vault: Arc<dyn Vault>) -> Self {
        Self { db, vault }
    }

    /// Queue a build. The task starts out pending.
    pub async fn enqueue(&self, job: BuildJob, correlation: &str) -> Result<BuildTask, QueueError> {
        let id = TaskId::generate();
        let payload = vault::seal(self.vault.as_ref(), &serde_json::to_string(&job)?)?;
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO build_tasks (id, correlation, payload, status, log, created_at, updated_at) \
             VALUES (?, ?, ?, ?, '', ?, ?)",
        )
        .bind(id.as_str())
        .bind(correlation)
        .bind(&payload)
        .bind(TaskStatus::Pending.as_str())
        .bind(now)
        .bind(now)
        .execute(self.db.pool())
        .await
        .context(QuerySnafu)?;

        info!(task = %id, release = %job.release_id, "enqueued build task");
        Ok(BuildTask {
            id,
            correlation: correlation.to_string(),
            job,
            status: TaskStatus::Pending,
            log: String::new(),
            claimed_by: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Atomically take the oldest pending task and mark it running.
    ///
    /// Returns [`QueueError::Empty`] when nothing is pending and
    /// [`QueueError::ClaimedElsewhere`] when another worker won the race for
    /// the selected task. A task whose payload cannot be decoded is marked
    /// failed and reported as [`QueueError::UndecodablePayload`].
    pub async fn claim_next(&self, worker: &str) -> Result<BuildTask, QueueError> {
        let mut tx = self.db.pool().begin().await.context(QuerySnafu)?;

        let candidate: Option<String> = sqlx::query_scalar(
            "SELECT id FROM build_tasks WHERE status = ? ORDER BY created_at, rowid LIMIT 1",
        )
        .bind(TaskStatus::Pending.as_str())
        .fetch_optional(&mut *tx)
        .await
        .context(QuerySnafu)?;

        let Some(id) = candidate else {
            return Err(QueueError::Empty);
        };

        let claimed = sqlx::query(
            "UPDATE build_tasks SET status = ?, claimed_by = ?, updated_at = ? \
             WHERE id = ? AND status = ?",
        )
        .bind(TaskStatus::Running.as_str())
        .bind(worker)
        .bind(Utc::now())
        .bind(&id)
        .bind(TaskStatus::Pending.as_str())
        .execute(&mut *tx)
        .await
        .context(QuerySnafu)?;

        if claimed.rows_affected() == 0 {
            debug!(task = %id, "lost claim race");
            return Err(QueueError::ClaimedElsewhere(TaskId::new(id)));
        }

        let row = sqlx::query(&format!("{SELECT_TASK} WHERE id = ?"))
            .bind(&id)
            .fetch_one(&mut *tx)
            .await
            .context(QuerySnafu)?;

        let task = match self.task_from_row(&row) {
            Ok(task) => task,
            Err(e @ (QueueError::Payload(_) | QueueError::Vault(_))) => {
                let reason = e.to_string();
                sqlx::query(
                    "UPDATE build_tasks SET status = ?, log = log || ?, updated_at = ? WHERE id = ?",
                )
                .bind(TaskStatus::Failed.as_str())
                .bind(format!("payload could not be decoded: {reason}\n"))
                .bind(Utc::now())
                .bind(&id)
                .execute(&mut *tx)
                .await
                .context(QuerySnafu)?;
                tx.commit().await.context(QuerySnafu)?;

                warn!(task = %id, worker, error = %reason, "failed undecodable build task");
                return Err(QueueError::UndecodablePayload {
                    id: TaskId::new(id),
                    reason,
                });
            }
            Err(e) => return Err(e),
        };
        tx.commit().await.context(QuerySnafu)?;

        info!(task = %task.id, worker, "claimed build task");
        Ok(task)
    }

    /// Mark a running task completed, appending `log`.
    pub async fn complete(&self, id: &TaskId, log: &str) -> Result<(), QueueError> {
        self.transition(id, TaskStatus::Running, TaskStatus::Completed, log, "complete")
            .await
    }

    /// Mark a running task failed, appending `log`.
    pub async fn fail(&self, id: &TaskId, log: &str) -> Result<(), QueueError> {
        self.transition(id, TaskStatus::Running, TaskStatus::Failed, log, "fail")
            .await
    }

    /// Put a pending task on hold. Only an explicit [`TaskQueue::resume`] releases it.
    pub async fn pause(&self, id: &TaskId) -> Result<(), QueueError> {
        self.transition(id, TaskStatus::Pending, TaskStatus::Paused, "", "pause")
            .await
    }

    /// Return a paused task to the pending pool.
    pub async fn resume(&self, id: &TaskId) -> Result<(), QueueError> {
        self.transition(id, TaskStatus::Paused, TaskStatus::Pending, "", "resume")
            .await
    }

    /// Append build output to a task's accumulated log.
    pub async fn append_log(&self, id: &TaskId, chunk: &str) -> Result<(), QueueError> {
        let result = sqlx::query(
            "UPDATE build_tasks SET log = log || ?, updated_at = ? WHERE id = ?",
        )
        .bind(chunk)
        .bind(Utc::now())
        .bind(id.as_str())
        .execute(self.db.pool())
        .await
        .context(QuerySnafu)?;

        if result.rows_affected() == 0 {
            return Err(QueueError::NotFound(id.clone()));
        }
        Ok(())
    }

    pub async fn get(&self, id: &TaskId) -> Result<BuildTask, QueueError> {
        let row = sqlx::query(&format!("{SELECT_TASK} WHERE id = ?"))
            .bind(id.as_str())
            .fetch_optional(self.db.pool())
            .await
            .context(QuerySnafu)?
            .ok_or_else(|| QueueError::NotFound(id.clone()))?;
        self.task_from_row(&row)
    }

    /// Tasks in `status`, oldest first. Read-only.
    pub async fn list_by_status(&self, status: TaskStatus) -> Result<Vec<BuildTask>, QueueError> {
        let rows = sqlx::query(&format!(
            "{SELECT_TASK} WHERE status = ? ORDER BY created_at, rowid"
        ))
        .bind(status.as_str())
        .fetch_all(self.db.pool())
        .await
        .context(QuerySnafu)?;

        rows.iter().map(|row| self.task_from_row(row)).collect()
    }

    /// Conditional `from -> to` move; distinguishes unknown ids from wrong states.
    async fn transition(
        &self,
        id: &TaskId,
        from: TaskStatus,
        to: TaskStatus,
        log: &str,
        action: &'static str,
    ) -> Result<(), QueueError> {
        let mut tx = self.db.pool().begin().await.context(QuerySnafu)?;

        let result = sqlx::query(
            "UPDATE build_tasks SET status = ?, log = log || ?, updated_at = ? \
             WHERE id = ? AND status = ?",
        )
        .bind(to.as_str())
        .bind(log)
        .bind(Utc::now())
        .bind(id.as_str())
        .bind(from.as_str())
        .execute(&mut *tx)
        .await
        .context(QuerySnafu)?;

        if result.rows_affected() == 0 {
            let current: Option<String> =
                sqlx::query_scalar("SELECT status FROM build_tasks WHERE id = ?")
                    .bind(id.as_str())
                    .fetch_optional(&mut *tx)
                    .await
                    .context(QuerySnafu)?;
            return Err(match current {
                None => QueueError::NotFound(id.clone()),
                Some(status) => QueueError::InvalidTransition {
                    id: id.clone(),
                    status: parse_status(&status)?,
                    action,
                },
            });
        }

        tx.commit().await.context(QuerySnafu)?;
        info!(task = %id, from = %from, to = %to, "build task transitioned");
        Ok(())
    }

    fn task_from_row(&self, row: &SqliteRow) -> Result<BuildTask, QueueError> {
        let payload: String = row.try_get("payload").context(QuerySnafu)?;
        let payload = vault::open(self.vault.as_ref(), &payload)?;
        let status: String = row.try_get("status").context(QuerySnafu)?;

        Ok(BuildTask {
            id: TaskId::new(row.try_get::<String, _>("id").context(QuerySnafu)?),
            correlation: row.try_get("correlation").context(QuerySnafu)?,
            job: serde_json::from_str(&payload)?,
            status: parse_status(&status)?,
            log: row.try_get("log").context(QuerySnafu)?,
            claimed_by: row.try_get("claimed_by").context(QuerySnafu)?,
            created_at: row
                .try_get::<DateTime<Utc>, _>("created_at")
                .context(QuerySnafu)?,
            updated_at: row
                .try_get::<DateTime<Utc>, _>("updated_at")
                .context(QuerySnafu)?,
        })
    }
}

fn parse_status(value: &str) -> Result<TaskStatus, StoreError> {
    value.parse().map_err(|_| {
        CorruptSnafu {
            table: "build_tasks",
            column: "status",
            value,
        }
        .build()
    })
}
