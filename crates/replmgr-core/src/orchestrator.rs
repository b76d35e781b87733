//! ---
//! rm_section: "01-core-functionality"
//! rm_subsection: "module"
//! rm_type: "source"
//! rm_scope: "code"
//! rm_description: "Orchestration state machine: bootstrap, promotion, and the monitor loop."
//! rm_version: "v0.0.0-prealpha"
//! rm_owner: "tbd"
//! ---
use std::sync::Arc;
use std::time::Duration;

use replmgr_common::{FailoverMode, OperationMode, RunConfig, SwitchoverMode, VersionInfo};
use replmgr_logging::{
    log_system_event, rm_debug, rm_error, rm_info, rm_warn, LogContext, SystemEventOutcome,
};
use replmgr_topology::{
    classify, locate_master, verify_slaves, Backend, DiscoveryStrategy, Node, NodeState,
    Promotion, PromotionPolicy, Topology,
};
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};

use crate::display::TopologyDisplay;
use crate::error::OrchestratorError;
use crate::events::OperatorEvent;
use crate::hooks::FailoverHooks;

/// Where the orchestrator is in its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Topology classified and master located.
    Bootstrapped,
    DirectForceFailover,
    DirectSwitchover,
    Monitoring,
    Exiting,
}

/// How a single monitor cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Operator quit or the event stream closed.
    Quit,
    /// A failover was attempted; the monitor starts over.
    Restart,
}

/// Summary handed back to the binary when the run ends.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub cycles: u64,
    pub promotions: Vec<Promotion>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingCommand {
    Failover,
}

/// Per-cycle loop flags; rebuilt on every restart.
#[derive(Debug, Default)]
struct LoopState {
    exit: bool,
    pending: Option<PendingCommand>,
}

/// Phase the run takes once the topology is bootstrapped.
pub fn select_phase(config: &RunConfig) -> Phase {
    match config.mode {
        OperationMode::Failover(FailoverMode::Force) => Phase::DirectForceFailover,
        OperationMode::Switchover(_) if !config.interactive => Phase::DirectSwitchover,
        _ => Phase::Monitoring,
    }
}

/// Owns the run: configuration, cluster backend, display and hooks.
///
/// All topology mutation happens on the task driving this value. Backend and
/// display calls block that task, so ticks and operator events queue up while
/// a promotion or a render is in progress.
pub struct Orchestrator<B, D> {
    config: Arc<RunConfig>,
    policy: PromotionPolicy,
    backend: B,
    display: D,
    hooks: FailoverHooks,
    banner: String,
    phase: Phase,
    cycle: u64,
    report: RunReport,
}

impl<B: Backend, D: TopologyDisplay> Orchestrator<B, D> {
    pub fn new(config: Arc<RunConfig>, backend: B, display: D) -> Self {
        Self {
            policy: PromotionPolicy::from_config(&config),
            hooks: FailoverHooks::from_config(&config),
            banner: VersionInfo::current().banner(),
            config,
            backend,
            display,
            phase: Phase::Bootstrapped,
            cycle: 0,
            report: RunReport::default(),
        }
    }

    pub fn with_hooks(mut self, hooks: FailoverHooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn report(&self) -> &RunReport {
        &self.report
    }

    /// Classify every configured host, locate the master and check the slaves.
    pub fn bootstrap(&mut self) -> Result<Topology, OrchestratorError> {
        let mut topology = classify(&self.backend, &self.config.hosts)?;
        let strategy = DiscoveryStrategy::for_mode(self.config.mode);
        let master = locate_master(&mut topology, strategy)?;
        let mismatched = verify_slaves(&mut topology);
        let master_url = master.url();
        rm_info!(
            context = self.log_context(&master_url),
            "topology bootstrapped: {} nodes, {} slaves, {} mismatched, master {master_url}",
            topology.len(),
            topology.slave_count(),
            mismatched.len()
        );
        self.phase = Phase::Bootstrapped;
        Ok(topology)
    }

    /// Drive the whole run until the operator quits or a one-shot action completes.
    ///
    /// In monitor mode every automatic failover restarts the monitor; there is
    /// no limit on the number of restarts.
    pub async fn run(
        &mut self,
        events: &mut mpsc::Receiver<OperatorEvent>,
    ) -> Result<RunReport, OrchestratorError> {
        let mut topology = self.bootstrap()?;
        let phase = select_phase(&self.config);
        self.phase = phase;
        match phase {
            Phase::DirectForceFailover => {
                self.failover(&mut topology)?;
            }
            Phase::DirectSwitchover => {
                self.switchover(&mut topology);
            }
            _ => loop {
                match self.run_monitor_cycle(&mut topology, events).await? {
                    CycleOutcome::Quit => break,
                    CycleOutcome::Restart => continue,
                }
            },
        }
        self.phase = Phase::Exiting;
        self.report.cycles = self.cycle;
        Ok(self.report.clone())
    }

    /// One pass of the monitor: open the display, react to ticks and events
    /// until the exit flag is raised, then fail over if that was requested.
    pub async fn run_monitor_cycle(
        &mut self,
        topology: &mut Topology,
        events: &mut mpsc::Receiver<OperatorEvent>,
    ) -> Result<CycleOutcome, OrchestratorError> {
        self.cycle += 1;
        self.phase = Phase::Monitoring;
        self.display.open(&self.banner)?;
        self.display.append_log_line(format!(
            "Monitor started in {} mode",
            self.config.mode.label()
        ));

        let mut ticker = interval(self.config.tick_interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut state = LoopState::default();

        while !state.exit {
            tokio::select! {
                _ = ticker.tick() => self.on_tick(topology),
                event = events.recv() => self.on_event(event, topology, &mut state),
            }
            if !self.config.interactive
                && topology.master().map(Node::state) == Some(NodeState::Failed)
            {
                self.note("Master has failed, starting automatic failover");
                state.pending = Some(PendingCommand::Failover);
                state.exit = true;
            }
        }
        self.display.close();

        match state.pending {
            Some(PendingCommand::Failover) => {
                self.failover(topology)?;
                let master_url = topology.master_spec().map(|s| s.url()).unwrap_or_default();
                rm_info!(
                    context = self.log_context(&master_url),
                    "restarting monitor in {} ms",
                    self.config.settle_delay.as_millis()
                );
                tokio::time::sleep(self.config.settle_delay).await;
                self.phase = Phase::Bootstrapped;
                Ok(CycleOutcome::Restart)
            }
            None => Ok(CycleOutcome::Quit),
        }
    }

    fn on_tick(&mut self, topology: &mut Topology) {
        for node in topology.nodes_mut() {
            if !node.is_connected() || node.state() == NodeState::Failed {
                continue;
            }
            if let Err(err) = node.refresh() {
                let url = node.url();
                rm_warn!(
                    context = LogContext::new().with_host(&url).with_cycle(self.cycle),
                    "refresh failed: {err}"
                );
                node.set_state(NodeState::Failed);
                node.detach();
                self.display
                    .append_log_line(format!("Server {url} is not responding, marked as failed"));
            }
        }
        if let Err(err) = self.display.render(&topology.snapshot()) {
            rm_warn!("display render failed: {err}");
        }
    }

    fn on_event(
        &mut self,
        event: Option<OperatorEvent>,
        topology: &mut Topology,
        state: &mut LoopState,
    ) {
        match event {
            Some(OperatorEvent::Switchover) => {
                self.switchover(topology);
            }
            Some(OperatorEvent::Failover) => {
                self.note("Manual failover requested");
                state.pending = Some(PendingCommand::Failover);
                state.exit = true;
            }
            Some(OperatorEvent::Quit) => state.exit = true,
            None => {
                rm_debug!("operator event stream closed");
                state.exit = true;
            }
            Some(OperatorEvent::Resync) => {
                if let Err(err) = self.display.resync() {
                    rm_warn!("display resync failed: {err}");
                }
            }
        }
    }

    /// Exchange roles with a slave of the healthy master.
    ///
    /// On success the new master and the affected slave slot are reconnected
    /// in place; on failure nothing changes.
    pub fn switchover(&mut self, topology: &mut Topology) -> Option<Promotion> {
        let Some(old_master) = topology.master_spec().cloned() else {
            rm_error!("switchover requested without an established master");
            return None;
        };
        let old_url = old_master.url();
        self.note(&format!("Starting switchover from {old_url}"));

        let result = match topology.promotion_request(&self.policy) {
            Some(request) => self.backend.switchover(&request),
            None => return None,
        };
        let promotion = match result {
            Ok(Some(promotion)) => promotion,
            Ok(None) => {
                self.promotion_aborted("switchover.aborted", &old_url, "no eligible candidate");
                return None;
            }
            Err(err) => {
                self.promotion_aborted("switchover.aborted", &old_url, &err.to_string());
                return None;
            }
        };
        let Some(slot) = topology.slave_at(promotion.slave_index).cloned() else {
            self.promotion_aborted(
                "switchover.aborted",
                &old_url,
                &format!("slave index {} is out of range", promotion.slave_index),
            );
            return None;
        };

        let new_url = promotion.new_master.url();
        rm_debug!(
            context = self.log_context(&new_url),
            "reinstancing new master {new_url} and slave slot {} [{}]",
            slot,
            promotion.slave_index
        );
        let mut new_master = Node::open(&self.backend, &promotion.new_master);
        if new_master.state() != NodeState::Failed {
            new_master.set_state(NodeState::Master);
        }
        topology.replace_node(new_master);
        topology.set_master(promotion.new_master.clone());

        let mut demoted = Node::open(&self.backend, &old_master);
        match self.policy.switchover {
            SwitchoverMode::Keep => {
                if demoted.state() != NodeState::Failed {
                    demoted.set_state(NodeState::Slave);
                }
                topology.replace_node(demoted);
                topology.replace_slave(&slot, old_master.clone());
            }
            SwitchoverMode::Kill => {
                topology.replace_node(demoted);
                topology.remove_slave(&slot);
            }
        }

        self.note(&format!("Switchover complete, new master is {new_url}"));
        log_system_event(
            Some(&self.log_context(&new_url)),
            "switchover.completed",
            &format!("{old_url} -> {new_url}"),
            SystemEventOutcome::Success,
        );
        self.report.promotions.push(promotion.clone());
        Some(promotion)
    }

    /// Promote a slave in place of the current master.
    ///
    /// An empty backend result leaves the topology untouched; the caller
    /// decides whether to retry.
    pub fn failover(
        &mut self,
        topology: &mut Topology,
    ) -> Result<Option<Promotion>, OrchestratorError> {
        let old_master = topology
            .master_spec()
            .cloned()
            .ok_or(OrchestratorError::NoMaster)?;
        let old_url = old_master.url();
        rm_info!(
            context = self.log_context(&old_url),
            "starting failover from {old_url}"
        );
        self.hooks.run_pre(old_master.host());

        let result = match topology.promotion_request(&self.policy) {
            Some(request) => self.backend.failover(&request),
            None => return Err(OrchestratorError::NoMaster),
        };
        let promotion = match result {
            Ok(Some(promotion)) => promotion,
            Ok(None) => {
                self.promotion_aborted("failover.aborted", &old_url, "no eligible candidate");
                return Ok(None);
            }
            Err(err) => {
                self.promotion_aborted("failover.aborted", &old_url, &err.to_string());
                return Ok(None);
            }
        };

        let new_master = promotion.new_master.clone();
        let new_url = new_master.url();
        if topology.slave_at(promotion.slave_index) != Some(&new_master) {
            rm_warn!(
                context = self.log_context(&new_url),
                "slave index {} does not name {new_url}; removing by identity",
                promotion.slave_index
            );
        }
        topology.remove_slave(&new_master);

        if let Some(old) = topology.node_mut(&old_master) {
            if old.state() == NodeState::Master {
                old.set_state(NodeState::Unconnected);
                old.detach();
            }
        }

        rm_debug!(
            context = self.log_context(&new_url),
            "reinstancing new master {new_url}"
        );
        let mut node = Node::open(&self.backend, &new_master);
        if node.state() != NodeState::Failed {
            node.set_state(NodeState::Master);
        }
        topology.replace_node(node);
        topology.set_master(new_master.clone());

        self.hooks.run_post(old_master.host(), new_master.host());
        self.note(&format!("Failover complete, new master is {new_url}"));
        log_system_event(
            Some(&self.log_context(&new_url)),
            "failover.completed",
            &format!("{old_url} -> {new_url}"),
            SystemEventOutcome::Success,
        );
        self.report.promotions.push(promotion.clone());
        Ok(Some(promotion))
    }

    fn promotion_aborted(&mut self, event: &str, master_url: &str, reason: &str) {
        self.display
            .append_log_line(format!("{event}: {reason}"));
        log_system_event(
            Some(&self.log_context(master_url)),
            event,
            reason,
            SystemEventOutcome::Fault,
        );
    }

    fn note(&mut self, line: &str) {
        rm_info!(context = self.log_context(""), "{line}");
        self.display.append_log_line(line.to_owned());
    }

    fn log_context<'a>(&'a self, master: &'a str) -> LogContext<'a> {
        LogContext::new()
            .with_master(master)
            .with_mode(self.config.mode.label())
            .with_cycle(self.cycle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use replmgr_common::ManagerConfig;

    fn config(failover: Option<&str>, switchover: Option<&str>, interactive: bool) -> RunConfig {
        ManagerConfig {
            hosts: vec!["a,b".into()],
            user: Some("u".into()),
            rpluser: Some("r".into()),
            failover: failover.map(str::to_owned),
            switchover: switchover.map(str::to_owned),
            interactive: Some(interactive),
            ..ManagerConfig::default()
        }
        .validate()
        .unwrap()
    }

    #[test]
    fn phase_selection() {
        assert_eq!(
            select_phase(&config(Some("force"), None, true)),
            Phase::DirectForceFailover
        );
        assert_eq!(
            select_phase(&config(Some("force"), None, false)),
            Phase::DirectForceFailover
        );
        assert_eq!(
            select_phase(&config(None, Some("keep"), false)),
            Phase::DirectSwitchover
        );
        assert_eq!(
            select_phase(&config(None, Some("kill"), true)),
            Phase::Monitoring
        );
        assert_eq!(
            select_phase(&config(Some("monitor"), None, false)),
            Phase::Monitoring
        );
        assert_eq!(
            select_phase(&config(Some("check"), None, true)),
            Phase::Monitoring
        );
    }
}
