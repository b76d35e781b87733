//! ---
//! rm_section: "01-core-functionality"
//! rm_subsection: "binary"
//! rm_type: "source"
//! rm_scope: "code"
//! rm_description: "Replication manager entrypoint."
//! rm_version: "v0.0.0-prealpha"
//! rm_owner: "tbd"
//! ---
mod cli;
mod tui;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use replmgr_common::{init_tracing, ConfigError, ManagerConfig, VersionInfo};
use replmgr_core::{
    spawn_event_pump, LogDisplay, OperatorEvent, Orchestrator, RunReport, TopologyDisplay,
};
use replmgr_sim::SimulatedCluster;
use tokio::signal;
use tokio::sync::mpsc;
use tracing::info;

use crate::cli::Cli;
use crate::tui::{KeyboardEvents, TerminalDisplay};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let version = VersionInfo::current();
    if cli.version {
        println!("{}", version.cli_string());
        return Ok(());
    }

    let mut config = ManagerConfig::load(cli.config.as_deref())?
        .merge(cli.overrides())
        .validate()
        .context("invalid configuration")?;
    let scenario = cli.simulate.clone().ok_or(ConfigError::MissingBackend)?;

    // the full-screen monitor owns stdout; console logging would tear it
    let full_screen = !cli.headless && config.interactive && config.uses_monitor_loop();
    if full_screen {
        config.logging.console = false;
    }
    init_tracing("replmgr", &config.logging, config.verbose)?;
    info!(
        version = %version.cli_string(),
        mode = %config.mode,
        hosts = config.hosts.len(),
        scenario = %scenario.display(),
        "replmgr starting"
    );

    let cluster = SimulatedCluster::from_path(&scenario)
        .with_context(|| format!("unable to load scenario {}", scenario.display()))?;
    let config = Arc::new(config);

    let report = if full_screen {
        let (mut events, _pump) = spawn_event_pump(KeyboardEvents);
        let orchestrator = Orchestrator::new(config, cluster, TerminalDisplay::new());
        drive(orchestrator, &mut events).await?
    } else {
        let (tx, mut events) = mpsc::channel(1);
        tokio::spawn(async move {
            if signal::ctrl_c().await.is_ok() {
                let _ = tx.send(OperatorEvent::Quit).await;
            }
        });
        let orchestrator = Orchestrator::new(config, cluster, LogDisplay::new());
        drive(orchestrator, &mut events).await?
    };

    info!(
        cycles = report.cycles,
        promotions = report.promotions.len(),
        "replmgr exiting"
    );
    for promotion in &report.promotions {
        println!("promoted {}", promotion.new_master.url());
    }
    Ok(())
}

async fn drive<D: TopologyDisplay>(
    mut orchestrator: Orchestrator<SimulatedCluster, D>,
    events: &mut mpsc::Receiver<OperatorEvent>,
) -> Result<RunReport> {
    let report = orchestrator
        .run(events)
        .await
        .context("replication manager run failed")?;
    Ok(report)
}
