//! ---
//! rm_section: "02-topology"
//! rm_subsection: "module"
//! rm_type: "source"
//! rm_scope: "code"
//! rm_description: "Startup classification of configured hosts."
//! rm_version: "v0.0.0-prealpha"
//! rm_owner: "tbd"
//! ---
use replmgr_common::HostSpec;
use replmgr_logging::{rm_debug, rm_info, LogContext};

use crate::backend::Backend;
use crate::error::TopologyError;
use crate::node::{Node, NodeState};
use crate::topology::Topology;

/// Connect to every host and sort it into slave, failed or unconnected.
///
/// Unreachable hosts are recorded as `Failed` and classification carries on.
/// Slaves that disagree on their upstream abort the run.
pub fn classify(backend: &dyn Backend, hosts: &[HostSpec]) -> Result<Topology, TopologyError> {
    let mut topology = Topology::new();
    for spec in hosts {
        let url = spec.url();
        let ctx = LogContext::new().with_host(&url);
        rm_debug!(context = ctx, "creating new server");
        let mut node = Node::open(backend, spec);
        match node.state() {
            NodeState::Failed => rm_info!(context = ctx, "server {url} is dead"),
            _ if node.facts().replication_configured() => {
                rm_debug!(context = ctx, "server {url} is configured as a slave");
                node.set_state(NodeState::Slave);
                topology.add_slave(spec.clone());
            }
            _ => rm_debug!(context = ctx, "server {url} is not a slave, setting aside"),
        }
        topology.push(node);
    }

    let slaves: Vec<&Node> = topology.slaves().collect();
    for &slave in &slaves {
        if !slave.is_sibling_of(&slaves) {
            let other = slaves
                .iter()
                .copied()
                .find(|other| !slave.is_sibling_of(&[*other]))
                .unwrap_or(slave);
            return Err(TopologyError::MultiMaster {
                host: slave.url(),
                upstream: slave.facts().upstream(),
                other: other.url(),
                other_upstream: other.facts().upstream(),
            });
        }
    }
    Ok(topology)
}
