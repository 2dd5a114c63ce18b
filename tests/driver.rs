// ABOUTME: Integration tests for the reference rollout driver.
// ABOUTME: Tests parallel, sequential, and canary strategies against a scripted executor.

mod support;

use shipyard::config::Config;
use shipyard::descriptor::DeployDescriptor;
use shipyard::rollout::*;
use shipyard::types::{AppId, HostId, ReleaseId, RolloutId};
use shipyard::vault::PlaintextVault;
use std::sync::Arc;
use support::ScriptedExecutor;

struct FixedArtifacts;

impl ArtifactSource for FixedArtifacts {
    fn render(&self, host: &HostId) -> Result<NodeArtifacts, ArtifactError> {
        Ok(NodeArtifacts {
            unit_text: format!("[Unit]\n\n[Container]\nImage=web:1\nContainerName={host}\n\n[Install]\n"),
            env_text: "MODE=production\n".to_string(),
        })
    }
}

async fn setup(strategy: Strategy, names: &[&str]) -> (RolloutOrchestrator, RolloutId) {
    support::init_tracing();
    let orch = RolloutOrchestrator::new(support::memory_db().await, Arc::new(PlaintextVault));
    let hosts: Vec<HostId> = names.iter().map(|name| HostId::new(*name)).collect();
    let rollout = orch
        .create_rollout(
            &AppId::new("web"),
            &ReleaseId::new("r1"),
            strategy,
            &hosts,
            &FixedArtifacts,
        )
        .await
        .unwrap();
    (orch, rollout.id)
}

async fn statuses(orch: &RolloutOrchestrator, id: &RolloutId) -> Vec<(String, NodeStatus)> {
    orch.list_nodes(id)
        .await
        .unwrap()
        .into_iter()
        .map(|node| (node.host_id.as_str().to_string(), node.status))
        .collect()
}

fn expect(pairs: &[(&str, NodeStatus)]) -> Vec<(String, NodeStatus)> {
    pairs
        .iter()
        .map(|(host, status)| (host.to_string(), *status))
        .collect()
}

mod parallel {
    use super::*;

    #[tokio::test]
    async fn all_hosts_succeed() {
        let (orch, id) = setup(Strategy::Parallel, &["a", "b", "c"]).await;
        let executor = Arc::new(ScriptedExecutor::new());
        let driver = RolloutDriver::new(orch.clone(), executor.clone());

        let rollout = driver.run(&id).await.unwrap();
        assert_eq!(rollout.status, RolloutStatus::Success);
        assert_eq!(rollout.progress.success, 3);
        assert!(rollout.started_at.is_some());
        assert!(rollout.finished_at.is_some());

        let mut called = executor.hosts();
        called.sort();
        assert_eq!(called, ["a", "b", "c"]);

        let artifacts = executor.artifacts_for("b").unwrap();
        assert!(artifacts.unit_text.contains("ContainerName=b"));
        assert_eq!(artifacts.env_text, "MODE=production\n");
    }

    #[tokio::test]
    async fn one_failure_is_partial_and_spares_siblings() {
        let (orch, id) = setup(Strategy::Parallel, &["a", "b", "c"]).await;
        let executor = Arc::new(ScriptedExecutor::new().failing("b"));
        let driver = RolloutDriver::new(orch.clone(), executor);

        let rollout = driver.run(&id).await.unwrap();
        assert_eq!(rollout.status, RolloutStatus::Partial);
        assert_eq!(
            statuses(&orch, &id).await,
            expect(&[
                ("a", NodeStatus::Success),
                ("b", NodeStatus::Failed),
                ("c", NodeStatus::Success),
            ])
        );

        let failed = orch
            .list_nodes(&id)
            .await
            .unwrap()
            .into_iter()
            .find(|n| n.host_id.as_str() == "b")
            .unwrap();
        assert_eq!(failed.error, "systemctl start failed on b");
        assert_eq!(failed.log, "Job for web.service failed.\n");
        assert!(failed.finished_at.is_some());
    }

    #[tokio::test]
    async fn every_failure_is_failed() {
        let (orch, id) = setup(Strategy::Parallel, &["a", "b"]).await;
        let executor = Arc::new(ScriptedExecutor::new().failing("a").failing("b"));
        let rollout = RolloutDriver::new(orch, executor).run(&id).await.unwrap();
        assert_eq!(rollout.status, RolloutStatus::Failed);
    }

    #[tokio::test]
    async fn unhealthy_container_fails_node() {
        let (orch, id) = setup(Strategy::Parallel, &["a"]).await;
        let executor = Arc::new(ScriptedExecutor::new().unhealthy("a"));
        let rollout = RolloutDriver::new(orch.clone(), executor)
            .run(&id)
            .await
            .unwrap();
        assert_eq!(rollout.status, RolloutStatus::Failed);

        let node = orch.list_nodes(&id).await.unwrap().remove(0);
        assert_eq!(node.health, HealthStatus::Unhealthy);
        assert_eq!(node.container_id.as_deref(), Some("ctr-a"));
    }
}

mod sequential {
    use super::*;

    #[tokio::test]
    async fn runs_in_host_order() {
        let (orch, id) = setup(Strategy::Sequential, &["c", "a", "b"]).await;
        let executor = Arc::new(ScriptedExecutor::new());
        let rollout = RolloutDriver::new(orch, executor.clone())
            .run(&id)
            .await
            .unwrap();
        assert_eq!(rollout.status, RolloutStatus::Success);
        assert_eq!(executor.hosts(), ["c", "a", "b"]);
    }

    #[tokio::test]
    async fn stops_at_first_failure() {
        let (orch, id) = setup(Strategy::Sequential, &["a", "b", "c", "d"]).await;
        let executor = Arc::new(ScriptedExecutor::new().failing("b"));
        let rollout = RolloutDriver::new(orch.clone(), executor.clone())
            .run(&id)
            .await
            .unwrap();

        assert_eq!(executor.hosts(), ["a", "b"]);
        assert_eq!(rollout.status, RolloutStatus::Partial);
        assert_eq!(rollout.progress.outstanding(), 2);
        assert!(rollout.log.contains("halted"));
        assert_eq!(
            statuses(&orch, &id).await,
            expect(&[
                ("a", NodeStatus::Success),
                ("b", NodeStatus::Failed),
                ("c", NodeStatus::Pending),
                ("d", NodeStatus::Pending),
            ])
        );
    }

    #[tokio::test]
    async fn first_host_failure_is_failed() {
        let (orch, id) = setup(Strategy::Sequential, &["a", "b"]).await;
        let executor = Arc::new(ScriptedExecutor::new().failing("a"));
        let rollout = RolloutDriver::new(orch, executor).run(&id).await.unwrap();
        assert_eq!(rollout.status, RolloutStatus::Failed);
    }
}

mod canary {
    use super::*;

    #[tokio::test]
    async fn healthy_canary_releases_the_rest() {
        let (orch, id) = setup(Strategy::Canary, &["a", "b", "c", "d"]).await;
        let executor = Arc::new(ScriptedExecutor::new());
        let rollout = RolloutDriver::new(orch, executor.clone())
            .with_canary_size(2)
            .run(&id)
            .await
            .unwrap();

        assert_eq!(rollout.status, RolloutStatus::Success);
        let called = executor.hosts();
        assert_eq!(called.len(), 4);
        let mut canaries = called[..2].to_vec();
        canaries.sort();
        assert_eq!(canaries, ["a", "b"]);
    }

    #[tokio::test]
    async fn failed_canary_holds_the_rest() {
        let (orch, id) = setup(Strategy::Canary, &["a", "b", "c"]).await;
        let executor = Arc::new(ScriptedExecutor::new().failing("a"));
        let rollout = RolloutDriver::new(orch.clone(), executor.clone())
            .run(&id)
            .await
            .unwrap();

        assert_eq!(executor.hosts(), ["a"]);
        assert_eq!(rollout.status, RolloutStatus::Failed);
        assert_eq!(
            statuses(&orch, &id).await,
            expect(&[
                ("a", NodeStatus::Failed),
                ("b", NodeStatus::Pending),
                ("c", NodeStatus::Pending),
            ])
        );
    }

    #[tokio::test]
    async fn app_canary_size_overrides_config() {
        let config = Config::from_yaml("rollout:\n  canary_size: 2\n").unwrap();
        let with_override = DeployDescriptor::parse(
            "app = \"web\"\n[deploy]\nstrategy = \"canary\"\ncanary_size = 3\n",
        )
        .unwrap();
        let without = DeployDescriptor::parse("app = \"web\"\n").unwrap();

        let (orch, _) = setup(Strategy::Canary, &["a"]).await;
        let executor = Arc::new(ScriptedExecutor::new());
        let driver = RolloutDriver::from_config(orch.clone(), executor.clone(), &config.rollout);
        assert_eq!(driver.canary_size(), 2);
        let driver = driver.with_app_canary_size(without.canary_size());
        assert_eq!(driver.canary_size(), 2);
        let driver = driver.with_app_canary_size(with_override.canary_size());
        assert_eq!(driver.canary_size(), 3);
    }

    #[tokio::test]
    async fn configured_canary_batch_gates_the_rest() {
        let config = Config::from_yaml("rollout:\n  canary_size: 2\n").unwrap();
        let (orch, id) = setup(Strategy::Canary, &["a", "b", "c", "d"]).await;
        let executor = Arc::new(ScriptedExecutor::new().failing("b"));
        let rollout = RolloutDriver::from_config(orch.clone(), executor.clone(), &config.rollout)
            .run(&id)
            .await
            .unwrap();

        assert_eq!(executor.hosts().len(), 2);
        assert_eq!(rollout.status, RolloutStatus::Partial);
        assert_eq!(
            statuses(&orch, &id).await,
            expect(&[
                ("a", NodeStatus::Success),
                ("b", NodeStatus::Failed),
                ("c", NodeStatus::Pending),
                ("d", NodeStatus::Pending),
            ])
        );
    }

    #[tokio::test]
    async fn canary_larger_than_fleet_deploys_everything_once() {
        let (orch, id) = setup(Strategy::Canary, &["a", "b"]).await;
        let executor = Arc::new(ScriptedExecutor::new());
        let rollout = RolloutDriver::new(orch, executor.clone())
            .with_canary_size(5)
            .run(&id)
            .await
            .unwrap();
        assert_eq!(rollout.status, RolloutStatus::Success);
        assert_eq!(executor.hosts().len(), 2);
    }
}

#[tokio::test]
async fn finished_rollout_is_not_rerun() {
    let (orch, id) = setup(Strategy::Parallel, &["a"]).await;
    let executor = Arc::new(ScriptedExecutor::new());
    let driver = RolloutDriver::new(orch, executor.clone());

    driver.run(&id).await.unwrap();
    let again = driver.run(&id).await.unwrap();
    assert_eq!(again.status, RolloutStatus::Success);
    assert_eq!(executor.hosts().len(), 1);
}
