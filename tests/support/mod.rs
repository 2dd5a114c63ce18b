// ABOUTME: Test support utilities.
// ABOUTME: Provides tracing setup, database helpers, and a scripted remote executor.

use async_trait::async_trait;
use parking_lot::Mutex;
use shipyard::rollout::{
    ExecutionError, ExecutionOutcome, HealthStatus, NodeArtifacts, RemoteExecutor,
};
use shipyard::store::Database;
use shipyard::types::HostId;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Once;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
#[allow(dead_code)]
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::from_default_env()
            .add_directive("shipyard=debug".parse().unwrap())
            .add_directive("sqlx=warn".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// Private in-memory database with the schema applied.
#[allow(dead_code)]
pub async fn memory_db() -> Database {
    Database::in_memory().await.expect("in-memory database")
}

/// File-backed database under `dir`, so several pooled connections share state.
#[allow(dead_code)]
pub async fn file_db(dir: &Path, max_connections: u32) -> Database {
    let url = format!("sqlite://{}", dir.join("state.db").display());
    let db = Database::connect(&url, max_connections)
        .await
        .expect("file database");
    db.migrate().await.expect("schema");
    db
}

/// Executor that fails or reports unhealthy for chosen hosts and records every call.
#[allow(dead_code)]
#[derive(Default)]
pub struct ScriptedExecutor {
    failing: HashSet<String>,
    unhealthy: HashSet<String>,
    calls: Mutex<Vec<(String, NodeArtifacts)>>,
}

#[allow(dead_code)]
impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, host: &str) -> Self {
        self.failing.insert(host.to_string());
        self
    }

    pub fn unhealthy(mut self, host: &str) -> Self {
        self.unhealthy.insert(host.to_string());
        self
    }

    /// Hosts executed so far, in call order.
    pub fn hosts(&self) -> Vec<String> {
        self.calls.lock().iter().map(|(host, _)| host.clone()).collect()
    }

    pub fn artifacts_for(&self, host: &str) -> Option<NodeArtifacts> {
        self.calls
            .lock()
            .iter()
            .find(|(h, _)| h == host)
            .map(|(_, artifacts)| artifacts.clone())
    }
}

#[async_trait]
impl RemoteExecutor for ScriptedExecutor {
    async fn execute(
        &self,
        host: &HostId,
        artifacts: &NodeArtifacts,
    ) -> Result<ExecutionOutcome, ExecutionError> {
        self.calls
            .lock()
            .push((host.as_str().to_string(), artifacts.clone()));

        if self.failing.contains(host.as_str()) {
            return Err(ExecutionError {
                message: format!("systemctl start failed on {host}"),
                log: "Job for web.service failed.\n".to_string(),
            });
        }

        let health = if self.unhealthy.contains(host.as_str()) {
            HealthStatus::Unhealthy
        } else {
            HealthStatus::Healthy
        };
        Ok(ExecutionOutcome {
            container_id: format!("ctr-{host}"),
            assigned_port: Some(8080),
            health,
            log: format!("started on {host}\n"),
        })
    }
}
