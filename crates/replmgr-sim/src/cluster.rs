//! ---
//! rm_section: "11-simulation"
//! rm_subsection: "module"
//! rm_type: "source"
//! rm_scope: "code"
//! rm_description: "In-memory cluster implementing the backend contract."
//! rm_version: "v0.0.0-prealpha"
//! rm_owner: "tbd"
//! ---
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use parking_lot::Mutex;
use replmgr_common::{HostSpec, SwitchoverMode};
use replmgr_topology::{
    Backend, MonitorError, NodeMonitor, Promotion, PromotionPolicy, PromotionRequest,
    ReplicationFacts,
};
use tracing::{debug, info, warn};

use crate::scenario::{Scenario, ServerScenario};

const DEFAULT_GTID_MODE: &str = "Slave_Pos";

#[derive(Debug, Clone)]
struct SimServer {
    spec: HostSpec,
    ip: String,
    server_id: u32,
    master: Option<String>,
    using_gtid: Option<String>,
    seconds_behind: u64,
    gtid_pos: String,
    read_only: bool,
    alive: bool,
    refreshes_left: Option<u32>,
}

impl SimServer {
    fn from_scenario(raw: &ServerScenario) -> Self {
        let using_gtid = match (&raw.master, &raw.using_gtid) {
            (_, Some(mode)) => Some(mode.clone()),
            (Some(_), None) => Some(DEFAULT_GTID_MODE.to_owned()),
            (None, None) => None,
        };
        Self {
            spec: raw.spec(),
            ip: raw.ip.clone().unwrap_or_else(|| raw.host.clone()),
            server_id: raw.server_id,
            master: raw.master.clone(),
            using_gtid,
            seconds_behind: raw.seconds_behind,
            gtid_pos: raw.gtid_pos.clone().unwrap_or_default(),
            read_only: raw.read_only,
            alive: raw.alive,
            refreshes_left: raw.fail_after_refreshes,
        }
    }

    fn is_at(&self, location: &str) -> bool {
        self.spec.host() == location || self.ip == location
    }

    fn make_master(&mut self) {
        self.master = None;
        self.using_gtid = None;
        self.seconds_behind = 0;
        self.read_only = false;
    }

    fn replicate_from(&mut self, master: &str) {
        self.master = Some(master.to_owned());
        self.using_gtid = Some(DEFAULT_GTID_MODE.to_owned());
        self.seconds_behind = 0;
    }
}

#[derive(Debug, Default)]
struct ClusterState {
    servers: Vec<SimServer>,
    history: Vec<String>,
}

impl ClusterState {
    fn server(&self, spec: &HostSpec) -> Option<&SimServer> {
        self.servers.iter().find(|server| &server.spec == spec)
    }

    fn server_mut(&mut self, spec: &HostSpec) -> Option<&mut SimServer> {
        self.servers.iter_mut().find(|server| &server.spec == spec)
    }

    fn facts_of(&self, server: &SimServer) -> ReplicationFacts {
        let master_server_id = server
            .master
            .as_deref()
            .and_then(|location| self.servers.iter().find(|s| s.is_at(location)))
            .map(|upstream| upstream.server_id)
            .unwrap_or_default();
        ReplicationFacts {
            server_id: server.server_id,
            master_server_id,
            master_host: server.master.clone().unwrap_or_default(),
            using_gtid: server.using_gtid.clone(),
            seconds_behind_master: server.master.as_ref().map(|_| server.seconds_behind),
            gtid_current_pos: Some(server.gtid_pos.clone()),
            read_only: server.read_only,
        }
    }

    /// Pick the promotion candidate among `request.slaves`.
    fn elect(&self, request: &PromotionRequest<'_>) -> Option<(usize, HostSpec)> {
        let policy = request.policy;
        let alive: Vec<(usize, &SimServer)> = request
            .slaves
            .iter()
            .enumerate()
            .filter_map(|(index, node)| self.server(node.spec()).map(|server| (index, server)))
            .filter(|(_, server)| server.alive)
            .collect();

        if policy.gtid_check {
            let mut positions = alive.iter().map(|(_, server)| server.gtid_pos.as_str());
            if let Some(first) = positions.next() {
                if positions.any(|pos| pos != first) {
                    warn!("slaves disagree on gtid position; refusing to elect a candidate");
                    return None;
                }
            }
        }

        let eligible: Vec<(usize, &SimServer)> = alive
            .into_iter()
            .filter(|(_, server)| {
                if policy.is_ignored(&server.spec) {
                    debug!(host = %server.spec, "candidate is in the ignore list");
                    return false;
                }
                match policy.max_delay {
                    Some(max) if server.seconds_behind > max.as_secs() => {
                        debug!(host = %server.spec, lag = server.seconds_behind, "candidate lags too far behind");
                        false
                    }
                    _ => true,
                }
            })
            .collect();

        let preferred = policy.preferred_master.as_ref().and_then(|preferred| {
            eligible
                .iter()
                .find(|(_, server)| &server.spec == preferred)
                .copied()
        });
        preferred
            .or_else(|| eligible.first().copied())
            .map(|(index, server)| (index, server.spec.clone()))
    }

    /// Make `new_master` the master and re-point every other alive slave at it.
    fn promote(&mut self, new_master: &HostSpec, slaves: &[HostSpec]) {
        let location = new_master.host().to_owned();
        if let Some(server) = self.server_mut(new_master) {
            server.make_master();
        }
        for spec in slaves.iter().filter(|spec| *spec != new_master) {
            if let Some(server) = self.server_mut(spec) {
                if server.alive {
                    server.replicate_from(&location);
                }
            }
        }
    }
}

/// Cluster of simulated servers shared by every monitor handed out.
#[derive(Debug, Clone)]
pub struct SimulatedCluster {
    state: Arc<Mutex<ClusterState>>,
}

impl SimulatedCluster {
    pub fn from_scenario(scenario: &Scenario) -> Self {
        let servers = scenario
            .server
            .iter()
            .map(SimServer::from_scenario)
            .collect();
        Self {
            state: Arc::new(Mutex::new(ClusterState {
                servers,
                history: Vec::new(),
            })),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        Ok(Self::from_scenario(&Scenario::from_path(path)?))
    }

    /// Stop a server. Returns false for unknown hosts.
    pub fn kill(&self, spec: &HostSpec) -> bool {
        let mut state = self.state.lock();
        match state.server_mut(spec) {
            Some(server) => {
                server.alive = false;
                info!(host = %spec, "simulated server killed");
                true
            }
            None => false,
        }
    }

    pub fn is_alive(&self, spec: &HostSpec) -> bool {
        self.state
            .lock()
            .server(spec)
            .map(|server| server.alive)
            .unwrap_or(false)
    }

    /// Current upstream of `spec`, if it replicates.
    pub fn master_of(&self, spec: &HostSpec) -> Option<String> {
        self.state.lock().server(spec).and_then(|server| server.master.clone())
    }

    pub fn is_read_only(&self, spec: &HostSpec) -> bool {
        self.state
            .lock()
            .server(spec)
            .map(|server| server.read_only)
            .unwrap_or(false)
    }

    /// Promotions applied so far, oldest first.
    pub fn history(&self) -> Vec<String> {
        self.state.lock().history.clone()
    }
}

struct SimulatedMonitor {
    spec: HostSpec,
    state: Arc<Mutex<ClusterState>>,
}

impl SimulatedMonitor {
    fn unavailable(&self) -> MonitorError {
        MonitorError::Query {
            host: self.spec.url(),
            reason: "server has gone away".to_owned(),
        }
    }
}

impl NodeMonitor for SimulatedMonitor {
    fn refresh(&mut self) -> Result<ReplicationFacts, MonitorError> {
        let mut state = self.state.lock();
        let server = state
            .server_mut(&self.spec)
            .filter(|server| server.alive)
            .ok_or_else(|| self.unavailable())?;
        match server.refreshes_left {
            Some(0) => {
                server.alive = false;
                info!(host = %self.spec, "simulated server died on schedule");
                return Err(self.unavailable());
            }
            Some(left) => server.refreshes_left = Some(left - 1),
            None => {}
        }
        let snapshot = server.clone();
        Ok(state.facts_of(&snapshot))
    }

    fn is_replicating_from(
        &mut self,
        master: &HostSpec,
        master_ip: &str,
    ) -> Result<bool, MonitorError> {
        let state = self.state.lock();
        let server = state
            .server(&self.spec)
            .filter(|server| server.alive)
            .ok_or_else(|| self.unavailable())?;
        Ok(server
            .master
            .as_deref()
            .is_some_and(|upstream| upstream == master.host() || upstream == master_ip))
    }
}

impl Backend for SimulatedCluster {
    fn resolve_ip(&self, spec: &HostSpec) -> Option<String> {
        self.state.lock().server(spec).map(|server| server.ip.clone())
    }

    fn connect(&self, spec: &HostSpec) -> Result<Box<dyn NodeMonitor>, MonitorError> {
        let alive = self.is_alive(spec);
        if !alive {
            return Err(MonitorError::Connect {
                host: spec.url(),
                reason: "can't connect to server".to_owned(),
            });
        }
        Ok(Box::new(SimulatedMonitor {
            spec: spec.clone(),
            state: Arc::clone(&self.state),
        }))
    }

    fn failover(&self, request: &PromotionRequest<'_>) -> Result<Option<Promotion>, MonitorError> {
        let mut state = self.state.lock();
        let Some((slave_index, new_master)) = state.elect(request) else {
            warn!(master = %request.master.spec(), "no suitable candidate for failover");
            return Ok(None);
        };
        let slaves: Vec<HostSpec> = request.slaves.iter().map(|n| n.spec().clone()).collect();
        state.promote(&new_master, &slaves);
        let entry = format!("failover {} -> {}", request.master.spec(), new_master);
        info!(event = %entry, "simulated promotion applied");
        state.history.push(entry);
        Ok(Some(Promotion {
            new_master,
            slave_index,
        }))
    }

    fn switchover(
        &self,
        request: &PromotionRequest<'_>,
    ) -> Result<Option<Promotion>, MonitorError> {
        let old_master = request.master.spec().clone();
        if !self.is_alive(&old_master) {
            return Err(MonitorError::Promotion {
                host: old_master.url(),
                reason: "master is not reachable".to_owned(),
            });
        }
        let policy: &PromotionPolicy = request.policy;
        let Some((slave_index, new_master)) = self.state.lock().elect(request) else {
            warn!(master = %old_master, "no suitable candidate for switchover");
            return Ok(None);
        };
        if !policy.wait_kill.is_zero() {
            debug!(wait_ms = policy.wait_kill.as_millis() as u64, "waiting before killing threads on demoted master");
            std::thread::sleep(policy.wait_kill);
        }

        let mut state = self.state.lock();
        let slaves: Vec<HostSpec> = request.slaves.iter().map(|n| n.spec().clone()).collect();
        state.promote(&new_master, &slaves);
        let location = new_master.host().to_owned();
        if let Some(server) = state.server_mut(&old_master) {
            match policy.switchover {
                SwitchoverMode::Keep => {
                    server.replicate_from(&location);
                    server.read_only = policy.readonly;
                }
                SwitchoverMode::Kill => server.alive = false,
            }
        }
        for spec in slaves.iter().filter(|spec| **spec != new_master) {
            if let Some(server) = state.server_mut(spec) {
                if server.alive {
                    server.read_only = policy.readonly;
                }
            }
        }
        let entry = format!(
            "switchover {} -> {} ({})",
            old_master, new_master, policy.switchover
        );
        info!(event = %entry, "simulated promotion applied");
        state.history.push(entry);
        Ok(Some(Promotion {
            new_master,
            slave_index,
        }))
    }
}
