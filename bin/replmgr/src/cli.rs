//! ---
//! rm_section: "01-core-functionality"
//! rm_subsection: "binary"
//! rm_type: "source"
//! rm_scope: "code"
//! rm_description: "Command line surface of the replmgr binary."
//! rm_version: "v0.0.0-prealpha"
//! rm_owner: "tbd"
//! ---
use std::path::PathBuf;

use clap::{ArgAction, Parser};
use replmgr_common::ManagerConfig;

#[derive(Parser, Debug)]
#[command(
    author,
    disable_version_flag = true,
    about = "MariaDB replication manager: switchover, failover and topology monitoring",
    long_about = None
)]
pub struct Cli {
    /// Optional TOML config file; command line flags override its values
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// List of MariaDB hosts IP and port (optional), e.g. host:port,host
    #[arg(long, value_name = "HOST[:PORT],..")]
    pub hosts: Option<String>,

    /// User for MariaDB login, specified as user[:password]
    #[arg(long, value_name = "USER[:PASSWORD]")]
    pub user: Option<String>,

    /// Replication user and password, specified as user[:password]
    #[arg(long, value_name = "USER[:PASSWORD]")]
    pub rpluser: Option<String>,

    /// Path of MariaDB unix socket
    #[arg(long, value_name = "PATH")]
    pub socket: Option<PathBuf>,

    /// Failover mode: monitor, force or check
    #[arg(long, value_name = "MODE")]
    pub failover: Option<String>,

    /// Switchover mode: keep or kill the old master
    #[arg(long, value_name = "MODE")]
    pub switchover: Option<String>,

    /// Runtime mode; `--interactive=false` runs one-shot actions and automatic failover
    #[arg(long, value_name = "BOOL", num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    pub interactive: Option<bool>,

    /// Print detailed execution info
    #[arg(long)]
    pub verbose: bool,

    /// Path of pre-failover script, called with the old master host
    #[arg(long = "pre-failover-script", value_name = "PATH")]
    pub pre_failover_script: Option<PathBuf>,

    /// Path of post-failover script, called with the old and new master hosts
    #[arg(long = "post-failover-script", value_name = "PATH")]
    pub post_failover_script: Option<PathBuf>,

    /// Maximum replication delay in seconds before a slave is not promoted (0 disables)
    #[arg(long = "maxdelay", value_name = "SECONDS")]
    pub max_delay: Option<u64>,

    /// Check that GTID sequences are identical before a failover
    #[arg(long = "gtidcheck", value_name = "BOOL", num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    pub gtid_check: Option<bool>,

    /// Preferred candidate server for master failover, in host:[port] format
    #[arg(long = "prefmaster", value_name = "HOST[:PORT]")]
    pub pref_master: Option<String>,

    /// List of servers never promoted, in host:[port] format, comma separated
    #[arg(long = "ignore-servers", value_name = "HOST[:PORT],..")]
    pub ignore_servers: Option<String>,

    /// Wait this many milliseconds before killing threads on demoted master
    #[arg(long = "wait-kill", value_name = "MS")]
    pub wait_kill: Option<u64>,

    /// Set slaves as read-only after switchover
    #[arg(long, value_name = "BOOL", num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    pub readonly: Option<bool>,

    /// Monitor refresh interval in milliseconds
    #[arg(long = "tick-interval-ms", value_name = "MS")]
    pub tick_interval_ms: Option<u64>,

    /// Pause after a failover before the monitor restarts, in milliseconds
    #[arg(long = "settle-delay-ms", value_name = "MS")]
    pub settle_delay_ms: Option<u64>,

    /// Drive a simulated cluster described by this scenario file
    #[arg(long, value_name = "SCENARIO")]
    pub simulate: Option<PathBuf>,

    /// Keep the monitor off the terminal and report through the log pipeline
    #[arg(long)]
    pub headless: bool,

    /// Print extended version information and exit
    #[arg(short = 'V', long = "version", action = ArgAction::SetTrue)]
    pub version: bool,
}

impl Cli {
    /// Flags as a config layer to merge over the file.
    pub fn overrides(&self) -> ManagerConfig {
        ManagerConfig {
            hosts: self.hosts.iter().cloned().collect(),
            user: self.user.clone(),
            rpluser: self.rpluser.clone(),
            socket: self.socket.clone(),
            failover: self.failover.clone(),
            switchover: self.switchover.clone(),
            interactive: self.interactive,
            verbose: self.verbose.then_some(true),
            pre_failover_script: self.pre_failover_script.clone(),
            post_failover_script: self.post_failover_script.clone(),
            max_delay: self.max_delay,
            gtid_check: self.gtid_check,
            pref_master: self.pref_master.clone(),
            ignore_servers: self.ignore_servers.iter().cloned().collect(),
            wait_kill_ms: self.wait_kill,
            readonly: self.readonly,
            tick_interval_ms: self.tick_interval_ms,
            settle_delay_ms: self.settle_delay_ms,
            logging: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use replmgr_common::{FailoverMode, OperationMode};

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_become_a_valid_run_config() {
        let cli = Cli::parse_from([
            "replmgr",
            "--hosts",
            "db1,db2:3307",
            "--user",
            "root:secret",
            "--rpluser",
            "repl:secret",
            "--failover=force",
            "--interactive=false",
            "--gtidcheck",
            "--maxdelay",
            "30",
            "--prefmaster",
            "db2:3307",
        ]);
        let config = cli.overrides().validate().unwrap();
        assert_eq!(config.mode, OperationMode::Failover(FailoverMode::Force));
        assert!(!config.interactive);
        assert!(config.gtid_check);
        assert_eq!(config.max_delay.map(|d| d.as_secs()), Some(30));
        assert_eq!(
            config.preferred_master.map(|spec| spec.url()),
            Some("db2:3307".to_owned())
        );
    }

    #[test]
    fn unset_flags_leave_the_file_layer_alone() {
        let cli = Cli::parse_from(["replmgr", "--switchover=keep"]);
        let file = ManagerConfig {
            hosts: vec!["a,b".into()],
            user: Some("root".into()),
            rpluser: Some("repl".into()),
            readonly: Some(false),
            ..ManagerConfig::default()
        };
        let merged = file.merge(cli.overrides());
        assert_eq!(merged.hosts, vec!["a,b".to_owned()]);
        assert_eq!(merged.readonly, Some(false));
        assert_eq!(merged.switchover.as_deref(), Some("keep"));
        assert_eq!(merged.verbose, None);
    }
}
