//! ---
//! rm_section: "15-testing-qa-runbook"
//! rm_subsection: "integration-tests"
//! rm_type: "source"
//! rm_scope: "code"
//! rm_description: "End-to-end runs of the orchestrator against the shipped scenarios."
//! rm_version: "v0.0.0-prealpha"
//! rm_owner: "tbd"
//! ---
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use replmgr_common::{HostSpec, ManagerConfig, RunConfig};
use replmgr_core::{LogDisplay, Orchestrator, Phase};
use replmgr_sim::{Scenario, SimulatedCluster};
use replmgr_topology::TopologyError;
use tokio::sync::mpsc;

fn scenario(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../scenarios")
        .join(name)
}

fn config(mode: ManagerConfig) -> Result<Arc<RunConfig>> {
    let base = ManagerConfig {
        hosts: vec!["db1,db2,db3".into()],
        user: Some("replmgr:secret".into()),
        rpluser: Some("repl:secret".into()),
        interactive: Some(false),
        wait_kill_ms: Some(0),
        ..ManagerConfig::default()
    };
    Ok(Arc::new(base.merge(mode).validate()?))
}

#[tokio::test]
async fn forced_failover_promotes_a_surviving_slave() -> Result<()> {
    let cluster = SimulatedCluster::from_path(&scenario("dead-master.toml"))?;
    let config = config(ManagerConfig {
        failover: Some("force".into()),
        ..ManagerConfig::default()
    })?;
    let mut orchestrator = Orchestrator::new(config, cluster.clone(), LogDisplay::new());
    let (_tx, mut events) = mpsc::channel(1);

    let report = orchestrator.run(&mut events).await?;
    assert_eq!(orchestrator.phase(), Phase::Exiting);
    assert_eq!(report.promotions.len(), 1);
    let promotion = &report.promotions[0];
    assert_ne!(promotion.new_master.host(), "db1");
    assert!(promotion.slave_index < 2);

    let survivor = ["db2", "db3"]
        .into_iter()
        .map(|host| HostSpec::new(host, 3306))
        .find(|spec| *spec != promotion.new_master)
        .unwrap();
    assert_eq!(
        cluster.master_of(&survivor).as_deref(),
        Some(promotion.new_master.host())
    );
    assert_eq!(cluster.master_of(&promotion.new_master), None);
    Ok(())
}

#[test]
fn dead_master_is_located_by_host_and_replaced() -> Result<()> {
    let scenario: Scenario = r#"
        [[server]]
        host = "h1"
        server_id = 100
        alive = false

        [[server]]
        host = "h2"
        server_id = 2
        master = "h1"

        [[server]]
        host = "h3"
        server_id = 3
        master = "h1"
    "#
    .parse()?;
    let cluster = SimulatedCluster::from_scenario(&scenario);
    let config = Arc::new(
        ManagerConfig {
            hosts: vec!["h1:3306,h2:3306,h3:3306".into()],
            user: Some("replmgr".into()),
            rpluser: Some("repl".into()),
            failover: Some("force".into()),
            ..ManagerConfig::default()
        }
        .validate()?,
    );
    let mut orchestrator = Orchestrator::new(config, cluster, LogDisplay::new());

    let mut topology = orchestrator.bootstrap()?;
    assert_eq!(topology.master_spec(), Some(&HostSpec::new("h1", 3306)));

    let promotion = orchestrator
        .failover(&mut topology)?
        .expect("a slave is promoted");
    assert_ne!(promotion.new_master, HostSpec::new("h1", 3306));
    assert!(promotion.slave_index <= 1);
    assert_eq!(topology.master_spec(), Some(&promotion.new_master));
    assert_eq!(topology.slave_count(), 1);
    Ok(())
}

#[tokio::test]
async fn switchover_on_healthy_cluster_demotes_old_master() -> Result<()> {
    let cluster = SimulatedCluster::from_path(&scenario("healthy.toml"))?;
    let config = config(ManagerConfig {
        switchover: Some("keep".into()),
        ..ManagerConfig::default()
    })?;
    let mut orchestrator = Orchestrator::new(config, cluster.clone(), LogDisplay::new());
    let (_tx, mut events) = mpsc::channel(1);

    let report = orchestrator.run(&mut events).await?;
    assert_eq!(report.promotions.len(), 1);
    let new_master = &report.promotions[0].new_master;
    assert_eq!(new_master, &HostSpec::new("db2", 3306));
    assert_eq!(
        cluster.master_of(&HostSpec::new("db1", 3306)).as_deref(),
        Some("db2")
    );
    assert!(cluster.is_read_only(&HostSpec::new("db1", 3306)));
    Ok(())
}

#[test]
fn check_mode_on_live_master_finds_nothing() -> Result<()> {
    let cluster = SimulatedCluster::from_path(&scenario("healthy.toml"))?;
    let config = config(ManagerConfig {
        failover: Some("check".into()),
        ..ManagerConfig::default()
    })?;
    let mut orchestrator = Orchestrator::new(config, cluster, LogDisplay::new());

    let err = orchestrator.bootstrap().unwrap_err();
    assert!(matches!(
        err,
        replmgr_core::OrchestratorError::Topology(TopologyError::NoMaster { .. })
    ));
    Ok(())
}
