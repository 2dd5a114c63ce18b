// ABOUTME: Integration tests for rollout orchestration over the store.
// ABOUTME: Tests atomic creation, descriptor-rendered artifacts, sealed env files, and progress recounts.

mod support;

use shipyard::descriptor::DeployDescriptor;
use shipyard::error::ErrorKind;
use shipyard::rollout::*;
use shipyard::types::{AppId, HostId, ReleaseId};
use shipyard::unit::{UnitDescriptor, UserInfo};
use shipyard::vault::{PlaintextVault, Vault, VaultError};
use std::sync::Arc;

const WEB: &str = r#"
app = "web"

[build]
image = "ghcr.io/acme/web"
tag_strategy = "release"

[env]
DATABASE_URL = "postgres://web@db/web"

[http_service]
internal_port = 8080

[[mounts]]
source = "/srv/web/uploads"
destination = "/uploads"
"#;

struct PrefixVault;

impl Vault for PrefixVault {
    fn encrypt(&self, plaintext: &str) -> Result<String, VaultError> {
        Ok(format!("sealed({})", plaintext.len()))
    }

    fn decrypt(&self, _ciphertext: &str) -> Result<String, VaultError> {
        Err(VaultError::Decrypt("key unavailable".to_string()))
    }
}

fn hosts(names: &[&str]) -> Vec<HostId> {
    names.iter().map(|name| HostId::new(*name)).collect()
}

fn web_artifacts(release: &ReleaseId) -> DescriptorArtifacts {
    let descriptor = DeployDescriptor::parse(WEB).unwrap();
    descriptor.validate().unwrap();
    DescriptorArtifacts::new(descriptor, release)
        .unwrap()
        .with_owner(UserInfo { uid: 1000, gid: 1000 })
}

#[tokio::test]
async fn nodes_carry_release_pinned_units() {
    support::init_tracing();
    let orch = RolloutOrchestrator::new(support::memory_db().await, Arc::new(PlaintextVault));
    let release = ReleaseId::new("r-2024-06-01");

    let rollout = orch
        .create_rollout(
            &AppId::new("web"),
            &release,
            Strategy::Sequential,
            &hosts(&["web-1", "web-2"]),
            &web_artifacts(&release),
        )
        .await
        .unwrap();
    assert_eq!(rollout.strategy, Strategy::Sequential);
    assert_eq!(rollout.progress.total, 2);

    for node in orch.list_nodes(&rollout.id).await.unwrap() {
        let artifacts = orch.node_artifacts(&node.id).await.unwrap();
        let unit = UnitDescriptor::parse(&artifacts.unit_text);
        assert_eq!(unit.image.as_deref(), Some("ghcr.io/acme/web:r-2024-06-01"));
        assert!(artifacts.unit_text.contains("ExecStartPre=/usr/bin/mkdir -p /srv/web/uploads\n"));
        assert_eq!(artifacts.env_text, "DATABASE_URL=postgres://web@db/web\n");
    }
}

#[tokio::test]
async fn env_text_goes_through_the_vault() {
    let db = support::memory_db().await;
    let orch = RolloutOrchestrator::new(db.clone(), Arc::new(PrefixVault));
    let release = ReleaseId::new("r1");

    let rollout = orch
        .create_rollout(
            &AppId::new("web"),
            &release,
            Strategy::Parallel,
            &hosts(&["web-1"]),
            &web_artifacts(&release),
        )
        .await
        .unwrap();

    let stored: String = sqlx::query_scalar("SELECT env_text FROM node_deployments")
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert!(stored.starts_with("sealed("));

    let node = orch.list_nodes(&rollout.id).await.unwrap().remove(0);
    let err = orch.node_artifacts(&node.id).await.unwrap_err();
    assert!(matches!(err, RolloutError::Vault(_)));
    assert_eq!(err.kind(), ErrorKind::Storage);
}

#[tokio::test]
async fn failed_creation_leaves_no_rows() {
    let db = support::memory_db().await;
    let orch = RolloutOrchestrator::new(db.clone(), Arc::new(PlaintextVault));
    let release = ReleaseId::new("r1");

    let err = orch
        .create_rollout(
            &AppId::new("web"),
            &release,
            Strategy::Parallel,
            &hosts(&["web-1", "web-2", "web-2"]),
            &web_artifacts(&release),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TransactionFailure);

    let (rollouts, nodes): (i64, i64) = sqlx::query_as(
        "SELECT (SELECT COUNT(*) FROM rollouts), (SELECT COUNT(*) FROM node_deployments)",
    )
    .fetch_one(db.pool())
    .await
    .unwrap();
    assert_eq!((rollouts, nodes), (0, 0));
}

#[tokio::test]
async fn total_matches_children() {
    let db = support::memory_db().await;
    let orch = RolloutOrchestrator::new(db.clone(), Arc::new(PlaintextVault));
    let release = ReleaseId::new("r1");
    let names: Vec<String> = (0..25).map(|n| format!("host-{n:02}")).collect();
    let names: Vec<&str> = names.iter().map(String::as_str).collect();

    let rollout = orch
        .create_rollout(
            &AppId::new("web"),
            &release,
            Strategy::Parallel,
            &hosts(&names),
            &web_artifacts(&release),
        )
        .await
        .unwrap();

    let nodes = orch.list_nodes(&rollout.id).await.unwrap();
    assert_eq!(nodes.len() as u32, rollout.progress.total);
    let positions: Vec<u32> = nodes.iter().map(|n| n.position).collect();
    assert_eq!(positions, (0..25).collect::<Vec<u32>>());
}

#[tokio::test]
async fn recount_converges_with_concurrent_updates() {
    let orch = RolloutOrchestrator::new(support::memory_db().await, Arc::new(PlaintextVault));
    let release = ReleaseId::new("r1");
    let rollout = orch
        .create_rollout(
            &AppId::new("web"),
            &release,
            Strategy::Parallel,
            &hosts(&["a", "b", "c", "d", "e", "f"]),
            &web_artifacts(&release),
        )
        .await
        .unwrap();
    let nodes = orch.list_nodes(&rollout.id).await.unwrap();

    let updates = nodes.iter().enumerate().map(|(i, node)| {
        let orch = orch.clone();
        let rollout_id = rollout.id.clone();
        async move {
            let status = if i % 3 == 0 {
                NodeStatus::Failed
            } else {
                NodeStatus::Success
            };
            orch.update_node_status(&node.id, NodeStatus::Running, "", "")
                .await
                .unwrap();
            orch.update_node_status(&node.id, status, "", "")
                .await
                .unwrap();
            orch.recompute_progress(&rollout_id).await.unwrap();
        }
    });
    futures::future::join_all(updates).await;

    let progress = orch.recompute_progress(&rollout.id).await.unwrap();
    assert_eq!(progress.success, 4);
    assert_eq!(progress.failed, 2);
    assert_eq!(progress.conclude(), Some(RolloutStatus::Partial));

    // The orchestrator never picks the terminal status itself.
    let stored = orch.get_rollout(&rollout.id).await.unwrap();
    assert_eq!(stored.status, RolloutStatus::Pending);
    assert_eq!(stored.progress, progress);
}

#[tokio::test]
async fn rollouts_listed_newest_first() {
    let orch = RolloutOrchestrator::new(support::memory_db().await, Arc::new(PlaintextVault));
    let mut created = Vec::new();
    for n in 0..3 {
        let release = ReleaseId::new(format!("r{n}"));
        let rollout = orch
            .create_rollout(
                &AppId::new("web"),
                &release,
                Strategy::Parallel,
                &hosts(&["web-1"]),
                &web_artifacts(&release),
            )
            .await
            .unwrap();
        created.push(rollout.id);
    }

    let listed: Vec<_> = orch
        .list_rollouts(&AppId::new("web"))
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();
    created.reverse();
    assert_eq!(listed, created);
    assert!(orch.list_rollouts(&AppId::new("api")).await.unwrap().is_empty());
}
