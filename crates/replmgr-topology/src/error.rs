//! ---
//! rm_section: "02-topology"
//! rm_subsection: "module"
//! rm_type: "source"
//! rm_scope: "code"
//! rm_description: "Node and topology error types."
//! rm_version: "v0.0.0-prealpha"
//! rm_owner: "tbd"
//! ---
use thiserror::Error;

use crate::locator::DiscoveryStrategy;

/// Per-node failures. Recoverable: the node is marked failed and the run continues.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("unable to connect to {host}: {reason}")]
    Connect { host: String, reason: String },
    #[error("query against {host} failed: {reason}")]
    Query { host: String, reason: String },
    #[error("no live connection to {0}")]
    NotConnected(String),
    #[error("promotion on {host} failed: {reason}")]
    Promotion { host: String, reason: String },
}

/// Fatal topology problems detected during bootstrap.
#[derive(Debug, Error)]
pub enum TopologyError {
    #[error(
        "multi-master topologies are not supported: {host} replicates from {upstream}, {other} from {other_upstream}"
    )]
    MultiMaster {
        host: String,
        upstream: String,
        other: String,
        other_upstream: String,
    },
    #[error("could not autodetect a master: no slaves found")]
    NoSlaves,
    #[error("could not autodetect a master: no node matches {expected} (discovery by {strategy})")]
    NoMaster {
        strategy: DiscoveryStrategy,
        expected: String,
    },
}
