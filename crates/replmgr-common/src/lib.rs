//! ---
//! rm_section: "01-core-functionality"
//! rm_subsection: "module"
//! rm_type: "source"
//! rm_scope: "code"
//! rm_description: "Shared primitives for the replication manager workspace."
//! rm_version: "v0.0.0-prealpha"
//! rm_owner: "tbd"
//! ---
//! Host specifiers, configuration layering, logging bootstrap, and version
//! metadata consumed across the replmgr workspace.

pub mod config;
pub mod error;
pub mod host;
pub mod logging;
pub mod version;

pub use config::{
    FailoverMode, LoggingConfig, ManagerConfig, OperationMode, RunConfig, SwitchoverMode,
};
pub use error::ConfigError;
pub use host::{Credentials, HostSpec, DEFAULT_PORT};
pub use logging::{init_tracing, LogFormat};
pub use version::VersionInfo;
