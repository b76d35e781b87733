//! ---
//! rm_section: "02-topology"
//! rm_subsection: "module"
//! rm_type: "source"
//! rm_scope: "code"
//! rm_description: "Cluster backend contract and promotion types."
//! rm_version: "v0.0.0-prealpha"
//! rm_owner: "tbd"
//! ---
use std::net::ToSocketAddrs;
use std::time::Duration;

use replmgr_common::{Credentials, HostSpec, OperationMode, RunConfig, SwitchoverMode};

use crate::error::MonitorError;
use crate::node::{Node, NodeMonitor};

/// Rules a backend applies when electing and promoting a new master.
#[derive(Debug, Clone)]
pub struct PromotionPolicy {
    pub replication_credentials: Credentials,
    pub ignore_list: Vec<HostSpec>,
    pub preferred_master: Option<HostSpec>,
    pub max_delay: Option<Duration>,
    pub gtid_check: bool,
    pub wait_kill: Duration,
    pub readonly: bool,
    /// Fate of the demoted master on switchover.
    pub switchover: SwitchoverMode,
}

impl PromotionPolicy {
    pub fn from_config(config: &RunConfig) -> Self {
        Self {
            replication_credentials: config.replication_credentials.clone(),
            ignore_list: config.ignore_list.clone(),
            preferred_master: config.preferred_master.clone(),
            max_delay: config.max_delay,
            gtid_check: config.gtid_check,
            wait_kill: config.wait_kill,
            readonly: config.readonly,
            switchover: match config.mode {
                OperationMode::Switchover(mode) => mode,
                OperationMode::Failover(_) => SwitchoverMode::Keep,
            },
        }
    }

    pub fn is_ignored(&self, spec: &HostSpec) -> bool {
        self.ignore_list.contains(spec)
    }
}

/// Inputs of a promotion: the current master and its slaves in slave-subset order.
#[derive(Debug)]
pub struct PromotionRequest<'a> {
    pub master: &'a Node,
    pub slaves: Vec<&'a Node>,
    pub policy: &'a PromotionPolicy,
}

/// A completed promotion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Promotion {
    pub new_master: HostSpec,
    /// Position of the promoted node in the request's slave list.
    pub slave_index: usize,
}

/// Access to a cluster of database servers.
///
/// Promotion lives here rather than on [`NodeMonitor`] because a forced
/// failover starts from a master with no live connection.
pub trait Backend: Send {
    fn resolve_ip(&self, spec: &HostSpec) -> Option<String> {
        (spec.host(), spec.port())
            .to_socket_addrs()
            .ok()?
            .next()
            .map(|addr| addr.ip().to_string())
    }

    fn connect(&self, spec: &HostSpec) -> Result<Box<dyn NodeMonitor>, MonitorError>;

    /// Promote a slave after master failure. `Ok(None)` means no candidate qualified.
    fn failover(&self, request: &PromotionRequest<'_>) -> Result<Option<Promotion>, MonitorError>;

    /// Exchange roles between a healthy master and one of its slaves.
    fn switchover(&self, request: &PromotionRequest<'_>)
        -> Result<Option<Promotion>, MonitorError>;
}
