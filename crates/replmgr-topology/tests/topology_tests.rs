//! ---
//! rm_section: "02-topology"
//! rm_subsection: "module"
//! rm_type: "source"
//! rm_scope: "code"
//! rm_description: "Classification and master location scenarios."
//! rm_version: "v0.0.0-prealpha"
//! rm_owner: "tbd"
//! ---
use std::collections::HashMap;

use replmgr_common::{FailoverMode, HostSpec, OperationMode, SwitchoverMode};
use replmgr_topology::{
    classify, locate_master, verify_slaves, Backend, DiscoveryStrategy, MonitorError,
    NodeMonitor, NodeState, Promotion, PromotionRequest, ReplicationFacts, TopologyError,
};

#[derive(Clone)]
enum Server {
    Dead,
    BrokenRefresh,
    Alive(ReplicationFacts),
}

struct ScriptedMonitor(ReplicationFacts, bool);

impl NodeMonitor for ScriptedMonitor {
    fn refresh(&mut self) -> Result<ReplicationFacts, MonitorError> {
        if self.1 {
            return Err(MonitorError::Query {
                host: "scripted".into(),
                reason: "status query failed".into(),
            });
        }
        Ok(self.0.clone())
    }

    fn is_replicating_from(
        &mut self,
        master: &HostSpec,
        master_ip: &str,
    ) -> Result<bool, MonitorError> {
        Ok(self.0.master_host == master.host() || self.0.master_host == master_ip)
    }
}

#[derive(Default)]
struct ScriptedBackend {
    servers: HashMap<String, Server>,
    ips: HashMap<String, String>,
}

impl ScriptedBackend {
    fn with(mut self, host: &str, server: Server) -> Self {
        self.servers.insert(host.to_owned(), server);
        self
    }

    fn with_ip(mut self, host: &str, ip: &str) -> Self {
        self.ips.insert(host.to_owned(), ip.to_owned());
        self
    }
}

impl Backend for ScriptedBackend {
    fn resolve_ip(&self, spec: &HostSpec) -> Option<String> {
        self.ips.get(spec.host()).cloned()
    }

    fn connect(&self, spec: &HostSpec) -> Result<Box<dyn NodeMonitor>, MonitorError> {
        match self.servers.get(spec.host()) {
            Some(Server::Alive(facts)) => Ok(Box::new(ScriptedMonitor(facts.clone(), false))),
            Some(Server::BrokenRefresh) => {
                Ok(Box::new(ScriptedMonitor(ReplicationFacts::default(), true)))
            }
            _ => Err(MonitorError::Connect {
                host: spec.url(),
                reason: "connection refused".into(),
            }),
        }
    }

    fn failover(&self, _: &PromotionRequest<'_>) -> Result<Option<Promotion>, MonitorError> {
        Ok(None)
    }

    fn switchover(&self, _: &PromotionRequest<'_>) -> Result<Option<Promotion>, MonitorError> {
        Ok(None)
    }
}

fn standalone(server_id: u32) -> Server {
    Server::Alive(ReplicationFacts {
        server_id,
        ..ReplicationFacts::default()
    })
}

fn slave(server_id: u32, master_host: &str, master_server_id: u32) -> Server {
    Server::Alive(ReplicationFacts {
        server_id,
        master_server_id,
        master_host: master_host.to_owned(),
        using_gtid: Some("Slave_Pos".into()),
        seconds_behind_master: Some(0),
        ..ReplicationFacts::default()
    })
}

fn hosts(list: &str) -> Vec<HostSpec> {
    HostSpec::parse_list(list).unwrap()
}

#[test]
fn every_host_is_classified_exactly_once() {
    let backend = ScriptedBackend::default()
        .with("m", standalone(100))
        .with("s1", slave(101, "m", 100))
        .with("s2", slave(102, "m", 100))
        .with("x", Server::Dead)
        .with("y", Server::BrokenRefresh);
    let all_hosts = hosts("m,s1,x,s2,y");
    let topology = classify(&backend, &all_hosts).unwrap();

    assert_eq!(topology.len(), all_hosts.len());
    let states: Vec<NodeState> = topology.nodes().iter().map(|n| n.state()).collect();
    assert_eq!(
        states,
        vec![
            NodeState::Unconnected,
            NodeState::Slave,
            NodeState::Failed,
            NodeState::Slave,
            NodeState::Failed,
        ]
    );
    assert_eq!(topology.slave_specs(), &hosts("s1,s2")[..]);
    assert!(topology.master().is_none());
}

#[test]
fn disagreeing_slaves_are_fatal() {
    let backend = ScriptedBackend::default()
        .with("m1", standalone(100))
        .with("m2", standalone(200))
        .with("s1", slave(101, "m1", 100))
        .with("s2", slave(102, "m2", 200));
    let err = classify(&backend, &hosts("m1,m2,s1,s2")).unwrap_err();
    match err {
        TopologyError::MultiMaster { host, other, .. } => {
            assert_eq!(host, "s1:3306");
            assert_eq!(other, "s2:3306");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn same_server_id_different_host_is_still_multi_master() {
    let backend = ScriptedBackend::default()
        .with("s1", slave(101, "m1", 100))
        .with("s2", slave(102, "m1.example", 100));
    assert!(matches!(
        classify(&backend, &hosts("s1,s2")),
        Err(TopologyError::MultiMaster { .. })
    ));
}

#[test]
fn server_id_discovery_picks_first_matching_unconnected_node() {
    let backend = ScriptedBackend::default()
        .with("a", standalone(7))
        .with("b", standalone(100))
        .with("c", slave(102, "b", 100))
        .with("d", standalone(100))
        .with("e", slave(104, "b", 100));
    let mut topology = classify(&backend, &hosts("a,b,c,d,e")).unwrap();

    let master = locate_master(&mut topology, DiscoveryStrategy::ByServerId).unwrap();
    assert_eq!(master, HostSpec::new("b", 3306));
    assert_eq!(topology.master().unwrap().state(), NodeState::Master);
    assert_eq!(
        topology.node(&HostSpec::new("d", 3306)).unwrap().state(),
        NodeState::Unconnected
    );
    assert_eq!(topology.count_in_state(NodeState::Master), 1);
}

#[test]
fn server_id_discovery_without_match_is_fatal() {
    let backend = ScriptedBackend::default()
        .with("a", standalone(7))
        .with("b", slave(102, "gone", 100));
    let mut topology = classify(&backend, &hosts("a,b")).unwrap();
    let err = locate_master(&mut topology, DiscoveryStrategy::ByServerId).unwrap_err();
    assert!(matches!(err, TopologyError::NoMaster { ref expected, .. } if expected == "100"));
}

#[test]
fn master_host_discovery_matches_failed_node_by_ip() {
    let backend = ScriptedBackend::default()
        .with("db1", Server::Dead)
        .with_ip("db1", "10.0.0.1")
        .with("db2", slave(2, "10.0.0.1", 100))
        .with("db3", slave(3, "10.0.0.1", 100));
    let mut topology = classify(&backend, &hosts("db1,db2,db3")).unwrap();

    let master = locate_master(&mut topology, DiscoveryStrategy::ByMasterHost).unwrap();
    assert_eq!(master.host(), "db1");
    assert_eq!(topology.master().unwrap().state(), NodeState::Master);
}

#[test]
fn master_host_discovery_ignores_live_nodes() {
    let backend = ScriptedBackend::default()
        .with("h1", standalone(100))
        .with("h2", slave(2, "h1", 100));
    let mut topology = classify(&backend, &hosts("h1,h2")).unwrap();
    assert!(matches!(
        locate_master(&mut topology, DiscoveryStrategy::ByMasterHost),
        Err(TopologyError::NoMaster { .. })
    ));
}

#[test]
fn no_slaves_means_no_master() {
    let backend = ScriptedBackend::default()
        .with("a", standalone(1))
        .with("b", standalone(2));
    let mut topology = classify(&backend, &hosts("a,b")).unwrap();
    assert!(matches!(
        locate_master(&mut topology, DiscoveryStrategy::ByServerId),
        Err(TopologyError::NoSlaves)
    ));
}

#[test]
fn slave_pointing_elsewhere_is_only_a_warning() {
    let backend = ScriptedBackend::default()
        .with("m", standalone(100))
        .with_ip("m", "10.0.0.9")
        .with("s1", slave(101, "m", 100))
        .with("s2", slave(102, "m", 100));
    let mut topology = classify(&backend, &hosts("m,s1,s2")).unwrap();
    locate_master(&mut topology, DiscoveryStrategy::ByServerId).unwrap();
    assert!(verify_slaves(&mut topology).is_empty());

    let backend = ScriptedBackend::default()
        .with("m", standalone(100))
        .with("s1", slave(101, "10.9.9.9", 100));
    let mut topology = classify(&backend, &hosts("m,s1")).unwrap();
    locate_master(&mut topology, DiscoveryStrategy::ByServerId).unwrap();
    assert_eq!(verify_slaves(&mut topology), hosts("s1"));
}

#[test]
fn strategy_follows_operation_mode() {
    assert_eq!(
        DiscoveryStrategy::for_mode(OperationMode::Switchover(SwitchoverMode::Kill)),
        DiscoveryStrategy::ByServerId
    );
    assert_eq!(
        DiscoveryStrategy::for_mode(OperationMode::Failover(FailoverMode::Monitor)),
        DiscoveryStrategy::ByServerId
    );
    assert_eq!(
        DiscoveryStrategy::for_mode(OperationMode::Failover(FailoverMode::Force)),
        DiscoveryStrategy::ByMasterHost
    );
    assert_eq!(
        DiscoveryStrategy::for_mode(OperationMode::Failover(FailoverMode::Check)),
        DiscoveryStrategy::ByMasterHost
    );
}
