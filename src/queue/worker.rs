// ABOUTME: Reference build worker that drains the task queue.
// ABOUTME: Claims a task, hands it to an ImageBuilder, and records the terminal status.

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{BuildJob, QueueError, TaskQueue, TaskStatus};
use crate::config::WorkerConfig;
use crate::types::TaskId;

/// Builds container images. The real implementation shells out to a builder
/// on the build host and lives outside this crate.
#[async_trait]
pub trait ImageBuilder: Send + Sync {
    async fn build(&self, job: &BuildJob) -> Result<BuildOutput, BuildFailure>;
}

/// Successful build.
#[derive(Debug, Clone, Default)]
pub struct BuildOutput {
    pub log: String,
}

/// Failed build, with whatever output was captured before it failed.
#[derive(Debug, Clone, thiserror::Error)]
#[error("build failed: {reason}")]
pub struct BuildFailure {
    pub reason: String,
    pub log: String,
}

/// Result of one worker iteration that found work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Processed {
    pub task: TaskId,
    pub status: TaskStatus,
}

/// Identity recorded in `claimed_by`: `hostname:pid`.
pub fn worker_identity() -> String {
    format!(
        "{}:{}",
        gethostname::gethostname().to_string_lossy(),
        std::process::id()
    )
}

pub struct BuildWorker<B> {
    queue: TaskQueue,
    builder: B,
    identity: String,
    poll_interval: Duration,
}

impl<B: ImageBuilder> BuildWorker<B> {
    pub fn new(queue: TaskQueue, builder: B, poll_interval: Duration) -> Self {
        Self {
            queue,
            builder,
            identity: worker_identity(),
            poll_interval,
        }
    }

    /// Worker polling at the configured interval.
    pub fn from_config(queue: TaskQueue, builder: B, config: &WorkerConfig) -> Self {
        Self::new(queue, builder, config.poll_interval)
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Override the identity recorded on claimed tasks.
    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = identity.into();
        self
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Claim and process at most one task.
    ///
    /// Returns `Ok(None)` when there was nothing to do, including when another
    /// worker won the race for the oldest task.
    pub async fn run_once(&self) -> Result<Option<Processed>, QueueError> {
        let task = match self.queue.claim_next(&self.identity).await {
            Ok(task) => task,
            Err(QueueError::Empty) => return Ok(None),
            Err(QueueError::UndecodablePayload { id, reason }) => {
                warn!(task = %id, %reason, "skipped task with undecodable payload");
                return Ok(Some(Processed {
                    task: id,
                    status: TaskStatus::Failed,
                }));
            }
            Err(e) if e.is_conflict() => {
                debug!(worker = %self.identity, error = %e, "claim lost, will retry");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        info!(task = %task.id, release = %task.job.release_id, "building release");
        let status = match self.builder.build(&task.job).await {
            Ok(output) => {
                self.queue.complete(&task.id, &output.log).await?;
                TaskStatus::Completed
            }
            Err(failure) => {
                warn!(task = %task.id, reason = %failure.reason, "build failed");
                let mut log = failure.log;
                if !log.is_empty() && !log.ends_with('\n') {
                    log.push('\n');
                }
                log.push_str(&failure.reason);
                log.push('\n');
                self.queue.fail(&task.id, &log).await?;
                TaskStatus::Failed
            }
        };

        Ok(Some(Processed {
            task: task.id,
            status,
        }))
    }

    /// Process tasks until `shutdown` resolves, sleeping `poll_interval`
    /// whenever the queue is empty or a storage call fails.
    pub async fn run(&self, shutdown: impl Future<Output = ()>) {
        tokio::pin!(shutdown);
        info!(worker = %self.identity, "build worker started");

        loop {
            let idle = match self.run_once().await {
                Ok(Some(_)) => false,
                Ok(None) => true,
                Err(e) => {
                    warn!(worker = %self.identity, error = %e, "worker iteration failed");
                    true
                }
            };

            if idle {
                tokio::select! {
                    _ = &mut shutdown => break,
                    _ = tokio::time::sleep(self.poll_interval) => {}
                }
            } else if futures::FutureExt::now_or_never(&mut shutdown).is_some() {
                break;
            }
        }

        info!(worker = %self.identity, "build worker stopped");
    }
}
