//! ---
//! rm_section: "11-simulation"
//! rm_subsection: "module"
//! rm_type: "source"
//! rm_scope: "code"
//! rm_description: "TOML scenario format for the simulated cluster."
//! rm_version: "v0.0.0-prealpha"
//! rm_owner: "tbd"
//! ---
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use replmgr_common::{HostSpec, DEFAULT_PORT};
use serde::Deserialize;

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_alive() -> bool {
    true
}

/// One `[[server]]` table.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerScenario {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub ip: Option<String>,
    pub server_id: u32,
    /// Upstream host; set means replication is configured.
    #[serde(default)]
    pub master: Option<String>,
    #[serde(default)]
    pub using_gtid: Option<String>,
    #[serde(default)]
    pub seconds_behind: u64,
    #[serde(default)]
    pub gtid_pos: Option<String>,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default = "default_alive")]
    pub alive: bool,
    /// The server dies after answering this many refreshes.
    #[serde(default)]
    pub fail_after_refreshes: Option<u32>,
}

impl ServerScenario {
    pub fn spec(&self) -> HostSpec {
        HostSpec::new(self.host.clone(), self.port)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    #[serde(default)]
    pub server: Vec<ServerScenario>,
}

impl Scenario {
    pub fn from_path(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("unable to read scenario file {}", path.display()))?;
        contents
            .parse()
            .with_context(|| format!("invalid scenario {}", path.display()))
    }

    /// Host specifiers in declaration order, handy as a default host list.
    pub fn hosts(&self) -> Vec<HostSpec> {
        self.server.iter().map(ServerScenario::spec).collect()
    }
}

impl FromStr for Scenario {
    type Err = anyhow::Error;

    fn from_str(contents: &str) -> Result<Self> {
        let scenario: Scenario = toml::from_str(contents).context("scenario is not valid TOML")?;
        let mut seen = HashSet::new();
        for server in &scenario.server {
            if !seen.insert(server.spec()) {
                anyhow::bail!("server {} is declared twice", server.spec());
            }
        }
        Ok(scenario)
    }
}
