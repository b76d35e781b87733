//! ---
//! rm_section: "11-simulation"
//! rm_subsection: "01-bootstrap"
//! rm_type: "source"
//! rm_scope: "code"
//! rm_description: "Simulated cluster module exports."
//! rm_version: "v0.0.0-prealpha"
//! rm_owner: "tbd"
//! ---
//! A replication cluster held in memory, for driving the manager without
//! real database servers. Servers are described in a TOML scenario and can be
//! killed from tests while the manager is running.

pub mod cluster;
pub mod scenario;

pub use cluster::SimulatedCluster;
pub use scenario::{Scenario, ServerScenario};
