//! ---
//! rm_section: "01-core-functionality"
//! rm_subsection: "module"
//! rm_type: "source"
//! rm_scope: "code"
//! rm_description: "Orchestration error types."
//! rm_version: "v0.0.0-prealpha"
//! rm_owner: "tbd"
//! ---
use std::path::PathBuf;
use std::process::ExitStatus;

use replmgr_topology::TopologyError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DisplayError {
    #[error("unable to initialise display: {0}")]
    Init(String),
    #[error("display i/o failure")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum HookError {
    #[error("unable to start {path}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path} exited with {status}")]
    Exit { path: PathBuf, status: ExitStatus },
}

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Topology(#[from] TopologyError),
    #[error(transparent)]
    Display(#[from] DisplayError),
    #[error("no master is established")]
    NoMaster,
}
