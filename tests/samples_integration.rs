//! ---
//! rm_section: "15-testing-qa-runbook"
//! rm_subsection: "integration-tests"
//! rm_type: "source"
//! rm_scope: "code"
//! rm_description: "Checks on the shipped sample config, scenarios, and source headers."
//! rm_version: "v0.0.0-prealpha"
//! rm_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};

use replmgr_common::{FailoverMode, HostSpec, ManagerConfig, OperationMode};
use replmgr_sim::{Scenario, SimulatedCluster};

fn root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("..")
}

fn read(path: &str) -> String {
    let full = root().join(path);
    fs::read_to_string(&full)
        .unwrap_or_else(|err| panic!("failed to read {}: {}", full.display(), err))
}

fn rust_sources(dir: &Path, found: &mut Vec<PathBuf>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            rust_sources(&path, found);
        } else if path.extension().is_some_and(|ext| ext == "rs") {
            found.push(path);
        }
    }
}

#[test]
fn example_config_validates() {
    let path = root().join("configs/replmgr.example.toml");
    let config = ManagerConfig::from_path(&path)
        .and_then(|config| config.validate())
        .unwrap_or_else(|err| panic!("example config rejected: {err}"));
    assert_eq!(config.mode, OperationMode::Failover(FailoverMode::Monitor));
    assert_eq!(config.hosts.len(), 3);
    assert_eq!(config.preferred_master, Some(HostSpec::new("db2", 3306)));
    assert_eq!(config.ignore_list, vec![HostSpec::new("db3", 3306)]);
}

#[test]
fn scenarios_load_into_clusters() {
    for name in ["scenarios/healthy.toml", "scenarios/dead-master.toml"] {
        let scenario: Scenario = read(name)
            .parse()
            .unwrap_or_else(|err| panic!("{name} does not parse: {err}"));
        assert_eq!(scenario.hosts().len(), 3, "{name} should describe three servers");
        let cluster = SimulatedCluster::from_scenario(&scenario);
        assert!(cluster.is_alive(&HostSpec::new("db2", 3306)));
    }
}

#[test]
fn sample_files_carry_frontmatter() {
    for file in [
        "configs/replmgr.example.toml",
        "scenarios/healthy.toml",
        "scenarios/dead-master.toml",
        "Cargo.toml",
    ] {
        assert!(
            read(file).starts_with("# ---"),
            "{file} must include frontmatter header"
        );
    }
}

#[test]
fn rust_sources_carry_frontmatter() {
    let mut sources = Vec::new();
    for dir in ["crates", "bin", "tests"] {
        rust_sources(&root().join(dir), &mut sources);
    }
    assert!(!sources.is_empty());
    for source in sources {
        let content = fs::read_to_string(&source).unwrap();
        assert!(
            content.starts_with("//! ---") && content.contains("rm_description:"),
            "{} must include frontmatter header",
            source.display()
        );
    }
}
