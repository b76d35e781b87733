//! ---
//! rm_section: "02-topology"
//! rm_subsection: "module"
//! rm_type: "source"
//! rm_scope: "code"
//! rm_description: "Master discovery strategies and slave verification."
//! rm_version: "v0.0.0-prealpha"
//! rm_owner: "tbd"
//! ---
use replmgr_common::{FailoverMode, HostSpec, OperationMode};
use replmgr_logging::{rm_debug, rm_warn, LogContext};
use strum::Display;

use crate::error::TopologyError;
use crate::node::NodeState;
use crate::topology::Topology;

/// How the master is found among classified nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum DiscoveryStrategy {
    /// First unconnected node whose server id is the first slave's master server id.
    ByServerId,
    /// First failed node whose host or IP is the first slave's master host.
    ByMasterHost,
}

impl DiscoveryStrategy {
    pub fn for_mode(mode: OperationMode) -> Self {
        match mode {
            OperationMode::Switchover(_) | OperationMode::Failover(FailoverMode::Monitor) => {
                DiscoveryStrategy::ByServerId
            }
            OperationMode::Failover(FailoverMode::Force | FailoverMode::Check) => {
                DiscoveryStrategy::ByMasterHost
            }
        }
    }
}

/// Elect the master and mark it `Master`.
///
/// Only the first slave's record is consulted; the classifier has already
/// rejected slaves that disagree.
pub fn locate_master(
    topology: &mut Topology,
    strategy: DiscoveryStrategy,
) -> Result<HostSpec, TopologyError> {
    let first = topology.slaves().next().ok_or(TopologyError::NoSlaves)?;
    let facts = first.facts().clone();

    let (candidate_state, expected) = match strategy {
        DiscoveryStrategy::ByServerId => {
            (NodeState::Unconnected, facts.master_server_id.to_string())
        }
        DiscoveryStrategy::ByMasterHost => (NodeState::Failed, facts.master_host.clone()),
    };

    let found = topology
        .nodes()
        .iter()
        .filter(|node| node.state() == candidate_state)
        .find(|node| match strategy {
            DiscoveryStrategy::ByServerId => node.facts().server_id == facts.master_server_id,
            DiscoveryStrategy::ByMasterHost => node.is_located_at(&facts.master_host),
        })
        .map(|node| node.spec().clone());

    let spec = found.ok_or(TopologyError::NoMaster { strategy, expected })?;
    if let Some(node) = topology.node_mut(&spec) {
        node.set_state(NodeState::Master);
    }
    topology.set_master(spec.clone());
    let url = spec.url();
    rm_debug!(
        context = LogContext::new().with_host(&url),
        "server {url} was autodetected as a master"
    );
    Ok(spec)
}

/// Check each slave actually replicates from the elected master.
///
/// Mismatches are warnings only; the identities of the offending slaves are
/// returned.
pub fn verify_slaves(topology: &mut Topology) -> Vec<HostSpec> {
    let Some(master_spec) = topology.master_spec().cloned() else {
        return Vec::new();
    };
    let master_ip = topology
        .master()
        .map(|node| node.ip().to_owned())
        .unwrap_or_default();
    let master_url = master_spec.url();

    let mut mismatched = Vec::new();
    for spec in topology.slave_specs().to_vec() {
        let Some(slave) = topology.node_mut(&spec) else {
            continue;
        };
        let url = slave.url();
        let ctx = LogContext::new().with_host(&url).with_master(&master_url);
        rm_debug!(context = ctx, "checking if server {url} is a slave of {master_url}");
        match slave.is_replicating_from(&master_spec, &master_ip) {
            Ok(true) => {}
            Ok(false) => {
                rm_warn!(context = ctx, "server {url} is not a slave of declared master {master_url}");
                mismatched.push(spec);
            }
            Err(err) => {
                rm_warn!(context = ctx, "unable to verify replication source of {url}: {err}");
                mismatched.push(spec);
            }
        }
    }
    mismatched
}
