// ABOUTME: Commands that read or prepare the control-plane database.
// ABOUTME: Migrates the schema, records rollouts, and lists build tasks and rollouts.

use std::fmt::Write as _;
use std::fs;
use std::sync::Arc;

use shipyard::config::Config;
use shipyard::descriptor::DeployDescriptor;
use shipyard::error::Result;
use shipyard::output::Output;
use shipyard::queue::{TaskQueue, TaskStatus};
use shipyard::rollout::{DescriptorArtifacts, NodeDeployment, Rollout, RolloutOrchestrator};
use shipyard::store::Database;
use shipyard::types::{AppId, HostId, ReleaseId, RolloutId};
use shipyard::vault::PlaintextVault;

use crate::cli::CreateRolloutArgs;

async fn open(config: &Config) -> Result<Database> {
    let db = Database::connect(&config.database_url()?, config.database.max_connections).await?;
    db.migrate().await?;
    Ok(db)
}

pub async fn migrate(config: &Config, output: &Output) -> Result<()> {
    let db = open(config).await?;
    db.close().await;
    output.success("Schema is up to date");
    Ok(())
}

pub async fn list_tasks(config: &Config, status: TaskStatus, output: &Output) -> Result<()> {
    let db = open(config).await?;
    let queue = TaskQueue::new(db.clone(), Arc::new(PlaintextVault));
    let tasks = queue.list_by_status(status).await?;

    output.progress(&format!("{} {status} task(s)", tasks.len()));
    for task in &tasks {
        let summary = serde_json::json!({
            "id": task.id,
            "correlation": task.correlation,
            "status": task.status,
            "release_id": task.job.release_id,
            "app_id": task.job.app_id,
            "claimed_by": task.claimed_by,
            "created_at": task.created_at,
        });
        output.record(&summary, || {
            format!(
                "{}  {}  release={}  {}\n",
                task.id,
                task.created_at.format("%Y-%m-%d %H:%M:%S"),
                task.job.release_id,
                task.claimed_by.as_deref().unwrap_or("unclaimed")
            )
        });
    }

    db.close().await;
    Ok(())
}

/// Render the descriptor for the release and record a pending rollout.
///
/// Applying it to the hosts is left to a driver with a remote executor.
pub async fn create_rollout(
    config: &Config,
    args: &CreateRolloutArgs,
    output: &Output,
) -> Result<()> {
    let descriptor = DeployDescriptor::parse(&fs::read_to_string(&args.descriptor)?)?;
    descriptor.validate()?;

    let hosts = if args.hosts.is_empty() {
        config.host_ids()
    } else {
        args.hosts.iter().map(|h| HostId::new(h.as_str())).collect()
    };
    let app = AppId::new(descriptor.app_name()?.as_str());
    let release = ReleaseId::new(args.release.as_str());
    let strategy = descriptor.strategy();

    let mut artifacts = DescriptorArtifacts::new(descriptor, &release)?;
    if let Some(owner) = config.bootstrap_owner() {
        artifacts = artifacts.with_owner(owner);
    }

    let db = open(config).await?;
    let orchestrator = RolloutOrchestrator::new(db.clone(), Arc::new(PlaintextVault));
    let rollout = orchestrator
        .create_rollout(&app, &release, strategy, &hosts, &artifacts)
        .await?;

    output.record(&rollout, || {
        format!(
            "Created rollout {} ({} strategy, {} node(s), image {})\n",
            rollout.id,
            rollout.strategy,
            rollout.progress.total,
            artifacts.image()
        )
    });

    db.close().await;
    Ok(())
}

pub async fn show_rollout(config: &Config, id: &str, output: &Output) -> Result<()> {
    let db = open(config).await?;
    let orchestrator = RolloutOrchestrator::new(db.clone(), Arc::new(PlaintextVault));
    let id = RolloutId::new(id);
    let rollout = orchestrator.get_rollout(&id).await?;
    let nodes = orchestrator.list_nodes(&id).await?;

    let report = serde_json::json!({ "rollout": rollout, "nodes": nodes });
    output.record(&report, || describe_rollout(&rollout, &nodes));

    db.close().await;
    Ok(())
}

pub async fn list_rollouts(config: &Config, app: &str, output: &Output) -> Result<()> {
    let db = open(config).await?;
    let orchestrator = RolloutOrchestrator::new(db.clone(), Arc::new(PlaintextVault));
    let rollouts = orchestrator.list_rollouts(&AppId::new(app)).await?;

    output.progress(&format!("{} rollout(s) for {app}", rollouts.len()));
    for rollout in &rollouts {
        output.record(rollout, || {
            format!(
                "{}  {}  {}  release={}  {}/{} ok\n",
                rollout.id,
                rollout.created_at.format("%Y-%m-%d %H:%M:%S"),
                rollout.status,
                rollout.release_id,
                rollout.progress.success,
                rollout.progress.total
            )
        });
    }

    db.close().await;
    Ok(())
}

fn describe_rollout(rollout: &Rollout, nodes: &[NodeDeployment]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Rollout {} ({})", rollout.id, rollout.status);
    let _ = writeln!(out, "  app:      {}", rollout.app_id);
    let _ = writeln!(out, "  release:  {}", rollout.release_id);
    let _ = writeln!(out, "  strategy: {}", rollout.strategy);
    let _ = writeln!(
        out,
        "  progress: {} succeeded, {} failed, {} total",
        rollout.progress.success, rollout.progress.failed, rollout.progress.total
    );
    for node in nodes {
        let _ = write!(out, "  - {} {}", node.host_id, node.status);
        if let Some(port) = node.assigned_port {
            let _ = write!(out, " port={port}");
        }
        if !node.error.is_empty() {
            let _ = write!(out, " error={:?}", node.error);
        }
        out.push('\n');
    }
    out
}
