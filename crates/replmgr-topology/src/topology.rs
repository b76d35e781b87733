//! ---
//! rm_section: "02-topology"
//! rm_subsection: "module"
//! rm_type: "source"
//! rm_scope: "code"
//! rm_description: "Ordered node set with slave subset and master reference."
//! rm_version: "v0.0.0-prealpha"
//! rm_owner: "tbd"
//! ---
use replmgr_common::HostSpec;
use serde::Serialize;

use crate::backend::{PromotionPolicy, PromotionRequest};
use crate::node::{Node, NodeState};

/// All configured nodes in host-list order.
///
/// Nodes are never removed. The slave subset and the master are tracked by
/// identity so that reconnecting a node never invalidates either.
#[derive(Debug, Default)]
pub struct Topology {
    nodes: Vec<Node>,
    slaves: Vec<HostSpec>,
    master: Option<HostSpec>,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, node: Node) {
        self.nodes.push(node);
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn nodes_mut(&mut self) -> &mut [Node] {
        &mut self.nodes
    }

    pub fn node(&self, spec: &HostSpec) -> Option<&Node> {
        self.nodes.iter().find(|node| node.spec() == spec)
    }

    pub fn node_mut(&mut self, spec: &HostSpec) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|node| node.spec() == spec)
    }

    /// Swap in a reconnected node for the same identity, returning the old record.
    /// Unknown identities are appended.
    pub fn replace_node(&mut self, node: Node) -> Option<Node> {
        match self.nodes.iter().position(|n| n.spec() == node.spec()) {
            Some(index) => Some(std::mem::replace(&mut self.nodes[index], node)),
            None => {
                self.nodes.push(node);
                None
            }
        }
    }

    pub fn slave_specs(&self) -> &[HostSpec] {
        &self.slaves
    }

    /// Slave nodes in slave-subset order.
    pub fn slaves(&self) -> impl Iterator<Item = &Node> + '_ {
        self.slaves.iter().filter_map(|spec| self.node(spec))
    }

    pub fn slave_count(&self) -> usize {
        self.slaves.len()
    }

    pub fn add_slave(&mut self, spec: HostSpec) {
        if !self.slaves.contains(&spec) {
            self.slaves.push(spec);
        }
    }

    /// Identity of the slave at `index` as reported by a promotion.
    pub fn slave_at(&self, index: usize) -> Option<&HostSpec> {
        self.slaves.get(index)
    }

    pub fn remove_slave(&mut self, spec: &HostSpec) -> bool {
        let before = self.slaves.len();
        self.slaves.retain(|slave| slave != spec);
        before != self.slaves.len()
    }

    /// Put `spec` in the slot currently held by `previous`.
    pub fn replace_slave(&mut self, previous: &HostSpec, spec: HostSpec) -> bool {
        match self.slaves.iter().position(|slave| slave == previous) {
            Some(index) => {
                self.slaves[index] = spec;
                true
            }
            None => false,
        }
    }

    pub fn master_spec(&self) -> Option<&HostSpec> {
        self.master.as_ref()
    }

    pub fn master(&self) -> Option<&Node> {
        self.master.as_ref().and_then(|spec| self.node(spec))
    }

    pub fn master_mut(&mut self) -> Option<&mut Node> {
        let spec = self.master.clone()?;
        self.node_mut(&spec)
    }

    pub fn set_master(&mut self, spec: HostSpec) {
        self.master = Some(spec);
    }

    pub fn count_in_state(&self, state: NodeState) -> usize {
        self.nodes.iter().filter(|node| node.state() == state).count()
    }

    /// Arguments for a backend promotion call, or `None` without a master.
    pub fn promotion_request<'a>(
        &'a self,
        policy: &'a PromotionPolicy,
    ) -> Option<PromotionRequest<'a>> {
        Some(PromotionRequest {
            master: self.master()?,
            slaves: self.slaves().collect(),
            policy,
        })
    }

    pub fn snapshot(&self) -> TopologySnapshot {
        TopologySnapshot {
            master: self.master.as_ref().map(HostSpec::url),
            nodes: self
                .nodes
                .iter()
                .map(|node| NodeSnapshot {
                    url: node.url(),
                    ip: node.ip().to_owned(),
                    state: node.state(),
                    is_slave: self.slaves.contains(node.spec()),
                    server_id: node.facts().server_id,
                    master_server_id: node.facts().master_server_id,
                    master_host: node.facts().master_host.clone(),
                    using_gtid: node.facts().using_gtid.clone(),
                    seconds_behind_master: node.facts().seconds_behind_master,
                    gtid_current_pos: node.facts().gtid_current_pos.clone(),
                    read_only: node.facts().read_only,
                })
                .collect(),
        }
    }
}

/// Owned, serialisable view of a topology for rendering and logging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopologySnapshot {
    pub master: Option<String>,
    pub nodes: Vec<NodeSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeSnapshot {
    pub url: String,
    pub ip: String,
    pub state: NodeState,
    pub is_slave: bool,
    pub server_id: u32,
    pub master_server_id: u32,
    pub master_host: String,
    pub using_gtid: Option<String>,
    pub seconds_behind_master: Option<u64>,
    pub gtid_current_pos: Option<String>,
    pub read_only: bool,
}

impl TopologySnapshot {
    pub fn master_node(&self) -> Option<&NodeSnapshot> {
        let master = self.master.as_ref()?;
        self.nodes.iter().find(|node| &node.url == master)
    }

    pub fn slaves(&self) -> impl Iterator<Item = &NodeSnapshot> + '_ {
        self.nodes.iter().filter(|node| node.is_slave)
    }
}
