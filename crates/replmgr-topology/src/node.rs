//! ---
//! rm_section: "02-topology"
//! rm_subsection: "module"
//! rm_type: "source"
//! rm_scope: "code"
//! rm_description: "Replication node model and the per-node monitor contract."
//! rm_version: "v0.0.0-prealpha"
//! rm_owner: "tbd"
//! ---
use std::fmt;

use replmgr_common::HostSpec;
use serde::{Deserialize, Serialize};
use strum::Display;
use tracing::{debug, warn};

use crate::backend::Backend;
use crate::error::MonitorError;

/// Role of a node as seen by the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum NodeState {
    /// Reachable but not replicating from anyone; a master candidate.
    Unconnected,
    Slave,
    Master,
    Failed,
}

/// Replication status read from a node on its last refresh.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicationFacts {
    pub server_id: u32,
    pub master_server_id: u32,
    pub master_host: String,
    /// `Slave_Pos`, `Current_Pos` or `No`; absent when replication was never configured.
    pub using_gtid: Option<String>,
    pub seconds_behind_master: Option<u64>,
    pub gtid_current_pos: Option<String>,
    pub read_only: bool,
}

impl ReplicationFacts {
    pub fn replication_configured(&self) -> bool {
        self.using_gtid.is_some()
    }

    /// Upstream identity used for siblinghood checks.
    pub fn upstream(&self) -> String {
        format!("{}#{}", self.master_host, self.master_server_id)
    }
}

/// Live handle on a single database server.
///
/// Implementations block on I/O; the orchestrator calls them from its
/// control task without a timeout.
pub trait NodeMonitor: Send {
    /// Re-read the replication status of the server.
    fn refresh(&mut self) -> Result<ReplicationFacts, MonitorError>;

    /// Whether the server's replication source is `master` (matched by host or IP).
    fn is_replicating_from(
        &mut self,
        master: &HostSpec,
        master_ip: &str,
    ) -> Result<bool, MonitorError>;
}

/// One configured host and everything known about it.
pub struct Node {
    spec: HostSpec,
    ip: String,
    state: NodeState,
    facts: ReplicationFacts,
    monitor: Option<Box<dyn NodeMonitor>>,
}

impl Node {
    /// A node whose connection could not be established.
    pub fn failed(spec: HostSpec, ip: impl Into<String>) -> Self {
        Self {
            spec,
            ip: ip.into(),
            state: NodeState::Failed,
            facts: ReplicationFacts::default(),
            monitor: None,
        }
    }

    /// A freshly connected node; its facts are empty until [`Node::refresh`] runs.
    pub fn connected(spec: HostSpec, ip: impl Into<String>, monitor: Box<dyn NodeMonitor>) -> Self {
        Self {
            spec,
            ip: ip.into(),
            state: NodeState::Unconnected,
            facts: ReplicationFacts::default(),
            monitor: Some(monitor),
        }
    }

    /// Connect and refresh through `backend`. Any failure yields a `Failed` node.
    pub fn open(backend: &dyn Backend, spec: &HostSpec) -> Self {
        let ip = backend
            .resolve_ip(spec)
            .unwrap_or_else(|| spec.host().to_owned());
        let monitor = match backend.connect(spec) {
            Ok(monitor) => monitor,
            Err(err) => {
                warn!(host = %spec, error = %err, "server is dead");
                return Node::failed(spec.clone(), ip);
            }
        };
        let mut node = Node::connected(spec.clone(), ip, monitor);
        if let Err(err) = node.refresh() {
            warn!(host = %spec, error = %err, "initial refresh failed; marking server dead");
            node.detach();
            node.state = NodeState::Failed;
        }
        debug!(host = %spec, ip = %node.ip, state = %node.state, "opened node");
        node
    }

    pub fn spec(&self) -> &HostSpec {
        &self.spec
    }

    pub fn host(&self) -> &str {
        self.spec.host()
    }

    pub fn port(&self) -> u16 {
        self.spec.port()
    }

    pub fn ip(&self) -> &str {
        &self.ip
    }

    pub fn url(&self) -> String {
        self.spec.url()
    }

    pub fn state(&self) -> NodeState {
        self.state
    }

    pub fn set_state(&mut self, state: NodeState) {
        self.state = state;
    }

    pub fn facts(&self) -> &ReplicationFacts {
        &self.facts
    }

    pub fn is_connected(&self) -> bool {
        self.monitor.is_some()
    }

    /// Drop the monitor handle, keeping identity and last known facts.
    pub fn detach(&mut self) {
        self.monitor = None;
    }

    /// Re-read replication facts through the node's monitor.
    pub fn refresh(&mut self) -> Result<&ReplicationFacts, MonitorError> {
        let monitor = self
            .monitor
            .as_mut()
            .ok_or_else(|| MonitorError::NotConnected(self.spec.url()))?;
        self.facts = monitor.refresh()?;
        Ok(&self.facts)
    }

    /// True when every node in `others` reports the same upstream as `self`.
    pub fn is_sibling_of(&self, others: &[&Node]) -> bool {
        others.iter().all(|other| {
            other.facts.master_server_id == self.facts.master_server_id
                && other.facts.master_host == self.facts.master_host
        })
    }

    pub fn is_replicating_from(
        &mut self,
        master: &HostSpec,
        master_ip: &str,
    ) -> Result<bool, MonitorError> {
        let monitor = self
            .monitor
            .as_mut()
            .ok_or_else(|| MonitorError::NotConnected(self.spec.url()))?;
        monitor.is_replicating_from(master, master_ip)
    }

    /// Whether `location` names this node by host name or IP.
    pub fn is_located_at(&self, location: &str) -> bool {
        self.spec.host() == location || self.ip == location
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("spec", &self.spec)
            .field("ip", &self.ip)
            .field("state", &self.state)
            .field("facts", &self.facts)
            .field("connected", &self.monitor.is_some())
            .finish()
    }
}
