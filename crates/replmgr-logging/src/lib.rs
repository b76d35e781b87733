//! ---
//! rm_section: "03-logging"
//! rm_subsection: "module"
//! rm_type: "source"
//! rm_scope: "code"
//! rm_description: "Structured logging context and event helpers."
//! rm_version: "v0.0.0-prealpha"
//! rm_owner: "tbd"
//! ---
#![warn(missing_docs)]

//! Context-enriched logging for the replication manager. Every event carries
//! the node it concerns, the current master, the run mode and the monitor cycle
//! so that log files can be filtered per host after an incident.

#[macro_use]
pub mod macros;

#[doc(hidden)]
pub use tracing;

/// Replication coordinates stamped on events from the `rm_*` macros.
///
/// Unset fields are recorded as empty, so a host filter on the log file also
/// matches lines that predate the master being located.
#[derive(Debug, Default, Clone)]
pub struct LogContext<'a> {
    /// `host:port` of the server a refresh, reconnect or promotion touched.
    pub host: Option<&'a str>,
    /// `host:port` the slaves were expected to follow when the line was written.
    pub master: Option<&'a str>,
    /// `failover` or `switchover`.
    pub mode: Option<&'a str>,
    /// Monitor restarts so far; a promotion ends one cycle and starts the next.
    pub cycle: Option<u64>,
}

impl<'a> LogContext<'a> {
    /// Context with no coordinates.
    pub fn new() -> Self {
        Self::default()
    }

    /// Server the event is about, e.g. a slave whose refresh failed.
    pub fn with_host(mut self, host: &'a str) -> Self {
        self.host = Some(host);
        self
    }

    /// Master as currently recorded in the topology. Before a promotion this
    /// is the outgoing master, after it the new one.
    pub fn with_master(mut self, master: &'a str) -> Self {
        self.master = Some(master);
        self
    }

    /// Operation the run was started for.
    pub fn with_mode(mut self, mode: &'a str) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Monitor cycle.
    pub fn with_cycle(mut self, cycle: u64) -> Self {
        self.cycle = Some(cycle);
        self
    }
}

/// Outcome of a topology-changing operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemEventOutcome {
    /// The operation completed.
    Success,
    /// The operation failed or was aborted.
    Fault,
}

impl SystemEventOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            SystemEventOutcome::Success => "success",
            SystemEventOutcome::Fault => "fault",
        }
    }
}

/// Emit a lifecycle event such as `failover.completed` or `switchover.aborted`.
pub fn log_system_event(
    context: Option<&LogContext>,
    event: &str,
    message: &str,
    outcome: SystemEventOutcome,
) {
    let default = LogContext::default();
    let ctx = context.unwrap_or(&default);
    match outcome {
        SystemEventOutcome::Success => rm_info!(
            context = ctx,
            "{event} [{}]: {message}",
            outcome.as_str()
        ),
        SystemEventOutcome::Fault => rm_error!(
            context = ctx,
            "{event} [{}]: {message}",
            outcome.as_str()
        ),
    }
}
