//! ---
//! rm_section: "01-core-functionality"
//! rm_subsection: "module"
//! rm_type: "source"
//! rm_scope: "code"
//! rm_description: "Startup configuration errors."
//! rm_version: "v0.0.0-prealpha"
//! rm_owner: "tbd"
//! ---
use std::path::PathBuf;

use thiserror::Error;

/// Fatal configuration problems detected before any connection attempt.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no hosts list specified")]
    MissingHosts,
    #[error("no master user/pair specified")]
    MissingUser,
    #[error("no replication user/pair specified")]
    MissingReplicationUser,
    #[error("none of the switchover or failover modes are set")]
    NoMode,
    #[error("both switchover and failover modes are set")]
    BothModes,
    #[error("host {0} is listed more than once")]
    DuplicateHost(String),
    #[error("incorrect failover mode: {0} (expected monitor, force or check)")]
    InvalidFailoverMode(String),
    #[error("incorrect switchover mode: {0} (expected keep or kill)")]
    InvalidSwitchoverMode(String),
    #[error("preferred master {0} is not included in the hosts option")]
    PreferredMasterNotInHosts(String),
    #[error("invalid host entry '{entry}': {reason}")]
    InvalidHost { entry: String, reason: String },
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),
    #[error("no node backend configured; pass --simulate <scenario.toml>")]
    MissingBackend,
    #[error("unable to read config file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}
