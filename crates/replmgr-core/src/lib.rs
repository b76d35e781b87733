//! ---
//! rm_section: "01-core-functionality"
//! rm_subsection: "module"
//! rm_type: "source"
//! rm_scope: "code"
//! rm_description: "Orchestration engine exports."
//! rm_version: "v0.0.0-prealpha"
//! rm_owner: "tbd"
//! ---
//! The long-lived control loop of the replication manager: bootstrap the
//! topology, then fail over, switch over, or monitor until told to stop.

pub mod display;
pub mod error;
pub mod events;
pub mod hooks;
pub mod orchestrator;

pub use display::{LogDisplay, TermLog, TopologyDisplay, TERM_LOG_LINES};
pub use error::{DisplayError, HookError, OrchestratorError};
pub use events::{spawn_event_pump, EventSource, OperatorEvent};
pub use hooks::FailoverHooks;
pub use orchestrator::{select_phase, CycleOutcome, Orchestrator, Phase, RunReport};
