//! ---
//! rm_section: "02-topology"
//! rm_subsection: "module"
//! rm_type: "source"
//! rm_scope: "code"
//! rm_description: "Topology discovery and master location."
//! rm_version: "v0.0.0-prealpha"
//! rm_owner: "tbd"
//! ---
//! Node model and the two startup stages of a replication manager run:
//! classifying every configured host, then locating the master the slaves
//! point at.

mod backend;
mod classifier;
mod error;
mod locator;
mod node;
mod topology;

pub use backend::{Backend, Promotion, PromotionPolicy, PromotionRequest};
pub use classifier::classify;
pub use error::{MonitorError, TopologyError};
pub use locator::{locate_master, verify_slaves, DiscoveryStrategy};
pub use node::{Node, NodeMonitor, NodeState, ReplicationFacts};
pub use topology::{NodeSnapshot, Topology, TopologySnapshot};
