//! ---
//! rm_section: "01-core-functionality"
//! rm_subsection: "module"
//! rm_type: "source"
//! rm_scope: "code"
//! rm_description: "Run configuration loading, layering, and validation."
//! rm_version: "v0.0.0-prealpha"
//! rm_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::debug;

use crate::error::ConfigError;
use crate::host::{Credentials, HostSpec};
use crate::logging::LogFormat;

fn default_socket() -> PathBuf {
    PathBuf::from("/var/run/mysqld/mysqld.sock")
}

fn default_wait_kill() -> Duration {
    Duration::from_millis(5000)
}

fn default_tick_interval() -> Duration {
    Duration::from_secs(3)
}

fn default_settle_delay() -> Duration {
    Duration::from_secs(5)
}

fn default_logging_directory() -> PathBuf {
    PathBuf::from("target/logs")
}

fn default_true() -> bool {
    true
}

/// Failover behaviour selected with `--failover`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum FailoverMode {
    Monitor,
    Force,
    Check,
}

/// What happens to the demoted master during `--switchover`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum SwitchoverMode {
    Keep,
    Kill,
}

/// Exactly one of failover or switchover; the type rules out "both" and "neither".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationMode {
    Failover(FailoverMode),
    Switchover(SwitchoverMode),
}

impl OperationMode {
    pub fn label(&self) -> &'static str {
        match self {
            OperationMode::Failover(_) => "failover",
            OperationMode::Switchover(_) => "switchover",
        }
    }
}

impl std::fmt::Display for OperationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationMode::Failover(mode) => write!(f, "failover={mode}"),
            OperationMode::Switchover(mode) => write!(f, "switchover={mode}"),
        }
    }
}

/// Logging sinks for the process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    #[serde(default)]
    pub format: LogFormat,
    #[serde(default)]
    pub file_prefix: Option<String>,
    /// Mirror events to stdout. The binary turns this off while the terminal UI is drawn.
    #[serde(default = "default_true")]
    pub console: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            format: LogFormat::default(),
            file_prefix: None,
            console: true,
        }
    }
}

/// Unvalidated configuration as read from a file and/or the command line.
///
/// Every field is optional so that layers can be merged; [`ManagerConfig::validate`]
/// turns the merged value into an immutable [`RunConfig`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManagerConfig {
    #[serde(default)]
    pub hosts: Vec<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub rpluser: Option<String>,
    #[serde(default)]
    pub socket: Option<PathBuf>,
    #[serde(default)]
    pub failover: Option<String>,
    #[serde(default)]
    pub switchover: Option<String>,
    #[serde(default)]
    pub interactive: Option<bool>,
    #[serde(default)]
    pub verbose: Option<bool>,
    #[serde(default)]
    pub pre_failover_script: Option<PathBuf>,
    #[serde(default)]
    pub post_failover_script: Option<PathBuf>,
    /// Seconds; zero disables the check.
    #[serde(default)]
    pub max_delay: Option<u64>,
    #[serde(default)]
    pub gtid_check: Option<bool>,
    #[serde(default)]
    pub pref_master: Option<String>,
    #[serde(default)]
    pub ignore_servers: Vec<String>,
    #[serde(default)]
    pub wait_kill_ms: Option<u64>,
    #[serde(default)]
    pub readonly: Option<bool>,
    #[serde(default)]
    pub tick_interval_ms: Option<u64>,
    #[serde(default)]
    pub settle_delay_ms: Option<u64>,
    #[serde(default)]
    pub logging: Option<LoggingConfig>,
}

impl ManagerConfig {
    pub const ENV_CONFIG_PATH: &'static str = "REPLMGR_CONFIG";

    /// Load the base layer, respecting the `REPLMGR_CONFIG` override.
    ///
    /// Without an explicit path or environment override an empty layer is returned,
    /// leaving every value to the command line.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                return Self::from_path(Path::new(env_path.trim()));
            }
        }
        match explicit {
            Some(path) => Self::from_path(path),
            None => Ok(Self::default()),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Overlay `overrides` on top of `self`; set values in `overrides` win.
    pub fn merge(self, overrides: ManagerConfig) -> ManagerConfig {
        ManagerConfig {
            hosts: if overrides.hosts.is_empty() {
                self.hosts
            } else {
                overrides.hosts
            },
            user: overrides.user.or(self.user),
            rpluser: overrides.rpluser.or(self.rpluser),
            socket: overrides.socket.or(self.socket),
            failover: overrides.failover.or(self.failover),
            switchover: overrides.switchover.or(self.switchover),
            interactive: overrides.interactive.or(self.interactive),
            verbose: overrides.verbose.or(self.verbose),
            pre_failover_script: overrides.pre_failover_script.or(self.pre_failover_script),
            post_failover_script: overrides.post_failover_script.or(self.post_failover_script),
            max_delay: overrides.max_delay.or(self.max_delay),
            gtid_check: overrides.gtid_check.or(self.gtid_check),
            pref_master: overrides.pref_master.or(self.pref_master),
            ignore_servers: if overrides.ignore_servers.is_empty() {
                self.ignore_servers
            } else {
                overrides.ignore_servers
            },
            wait_kill_ms: overrides.wait_kill_ms.or(self.wait_kill_ms),
            readonly: overrides.readonly.or(self.readonly),
            tick_interval_ms: overrides.tick_interval_ms.or(self.tick_interval_ms),
            settle_delay_ms: overrides.settle_delay_ms.or(self.settle_delay_ms),
            logging: overrides.logging.or(self.logging),
        }
    }

    /// Check the startup invariants, in the order an operator would fix them.
    pub fn validate(&self) -> Result<RunConfig, ConfigError> {
        let hosts = self
            .hosts
            .iter()
            .map(|entry| HostSpec::parse_list(entry))
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .flatten()
            .collect::<Vec<_>>();
        if hosts.is_empty() {
            return Err(ConfigError::MissingHosts);
        }
        // nodes are keyed by host:port, a repeat would shadow the first entry
        if let Some(repeated) = hosts
            .iter()
            .enumerate()
            .find_map(|(index, spec)| hosts[..index].contains(spec).then_some(spec))
        {
            return Err(ConfigError::DuplicateHost(repeated.url()));
        }

        let credentials = match non_empty(&self.user) {
            Some(raw) => Credentials::from_str(raw)?,
            None => return Err(ConfigError::MissingUser),
        };
        let replication_credentials = match non_empty(&self.rpluser) {
            Some(raw) => Credentials::from_str(raw)?,
            None => return Err(ConfigError::MissingReplicationUser),
        };

        let mode = match (non_empty(&self.failover), non_empty(&self.switchover)) {
            (None, None) => return Err(ConfigError::NoMode),
            (Some(_), Some(_)) => return Err(ConfigError::BothModes),
            (Some(raw), None) => OperationMode::Failover(
                FailoverMode::from_str(raw)
                    .map_err(|_| ConfigError::InvalidFailoverMode(raw.to_owned()))?,
            ),
            (None, Some(raw)) => OperationMode::Switchover(
                SwitchoverMode::from_str(raw)
                    .map_err(|_| ConfigError::InvalidSwitchoverMode(raw.to_owned()))?,
            ),
        };

        let ignore_list = self
            .ignore_servers
            .iter()
            .map(|entry| HostSpec::parse_list(entry))
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .flatten()
            .collect();

        let preferred_master = match non_empty(&self.pref_master) {
            Some(raw) => {
                let spec = HostSpec::from_str(raw)?;
                if !hosts.contains(&spec) {
                    return Err(ConfigError::PreferredMasterNotInHosts(raw.to_owned()));
                }
                Some(spec)
            }
            None => None,
        };

        Ok(RunConfig {
            hosts,
            credentials,
            replication_credentials,
            socket: self.socket.clone().unwrap_or_else(default_socket),
            mode,
            interactive: self.interactive.unwrap_or(true),
            verbose: self.verbose.unwrap_or(false),
            max_delay: self
                .max_delay
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            gtid_check: self.gtid_check.unwrap_or(false),
            preferred_master,
            ignore_list,
            pre_failover_script: self.pre_failover_script.clone(),
            post_failover_script: self.post_failover_script.clone(),
            wait_kill: self
                .wait_kill_ms
                .map(Duration::from_millis)
                .unwrap_or_else(default_wait_kill),
            readonly: self.readonly.unwrap_or(true),
            tick_interval: self
                .tick_interval_ms
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis)
                .unwrap_or_else(default_tick_interval),
            settle_delay: self
                .settle_delay_ms
                .map(Duration::from_millis)
                .unwrap_or_else(default_settle_delay),
            logging: self.logging.clone().unwrap_or_default(),
        })
    }
}

impl FromStr for ManagerConfig {
    type Err = toml::de::Error;

    fn from_str(content: &str) -> Result<Self, Self::Err> {
        toml::from_str(content)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// Validated, immutable configuration for one process lifetime.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub hosts: Vec<HostSpec>,
    pub credentials: Credentials,
    pub replication_credentials: Credentials,
    pub socket: PathBuf,
    pub mode: OperationMode,
    pub interactive: bool,
    pub verbose: bool,
    /// Maximum replication delay a promotion candidate may carry.
    pub max_delay: Option<Duration>,
    pub gtid_check: bool,
    pub preferred_master: Option<HostSpec>,
    /// Hosts that must never be promoted.
    pub ignore_list: Vec<HostSpec>,
    pub pre_failover_script: Option<PathBuf>,
    pub post_failover_script: Option<PathBuf>,
    pub wait_kill: Duration,
    pub readonly: bool,
    pub tick_interval: Duration,
    /// Pause after an automatic failover before the monitor restarts.
    pub settle_delay: Duration,
    pub logging: LoggingConfig,
}

impl RunConfig {
    /// Whether this run ends up in the interactive monitoring loop rather than
    /// a one-shot promotion.
    pub fn uses_monitor_loop(&self) -> bool {
        match self.mode {
            OperationMode::Failover(FailoverMode::Force) => false,
            OperationMode::Switchover(_) => self.interactive,
            OperationMode::Failover(_) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use tempfile::NamedTempFile;

    fn base() -> ManagerConfig {
        ManagerConfig {
            hosts: vec!["a,b,c".into()],
            user: Some("monitor:pw".into()),
            rpluser: Some("repl:pw".into()),
            failover: Some("monitor".into()),
            ..ManagerConfig::default()
        }
    }

    #[test]
    fn validates_defaults() {
        let config = base().validate().unwrap();
        assert_eq!(config.hosts.len(), 3);
        assert_eq!(config.mode, OperationMode::Failover(FailoverMode::Monitor));
        assert!(config.interactive);
        assert!(config.readonly);
        assert_eq!(config.wait_kill, Duration::from_millis(5000));
        assert_eq!(config.tick_interval, Duration::from_secs(3));
        assert_eq!(config.settle_delay, Duration::from_secs(5));
        assert_eq!(config.max_delay, None);
        assert_eq!(config.socket, PathBuf::from("/var/run/mysqld/mysqld.sock"));
    }

    #[test]
    fn missing_required_values_are_fatal() {
        let mut config = base();
        config.hosts.clear();
        assert!(matches!(config.validate(), Err(ConfigError::MissingHosts)));

        let mut config = base();
        config.user = None;
        assert!(matches!(config.validate(), Err(ConfigError::MissingUser)));

        let mut config = base();
        config.rpluser = Some("  ".into());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingReplicationUser)
        ));
    }

    #[test]
    fn mode_combinations() {
        let mut config = base();
        config.failover = None;
        assert!(matches!(config.validate(), Err(ConfigError::NoMode)));

        let mut config = base();
        config.switchover = Some("keep".into());
        assert!(matches!(config.validate(), Err(ConfigError::BothModes)));

        let mut config = base();
        config.failover = Some("auto".into());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidFailoverMode(mode)) if mode == "auto"
        ));

        let mut config = base();
        config.failover = None;
        config.switchover = Some("drop".into());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidSwitchoverMode(_))
        ));

        let mut config = base();
        config.failover = None;
        config.switchover = Some("kill".into());
        assert_eq!(
            config.validate().unwrap().mode,
            OperationMode::Switchover(SwitchoverMode::Kill)
        );
    }

    #[test]
    fn repeated_hosts_are_rejected() {
        let mut config = base();
        config.hosts = vec!["a,a".into()];
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DuplicateHost(host)) if host == "a:3306"
        ));

        config.hosts = vec!["db1,db1:3306".into()];
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DuplicateHost(host)) if host == "db1:3306"
        ));

        config.hosts = vec!["db1".into(), "db2,db1".into()];
        assert!(matches!(config.validate(), Err(ConfigError::DuplicateHost(_))));

        config.hosts = vec!["db1,db1:3307".into()];
        assert_eq!(config.validate().unwrap().hosts.len(), 2);
    }

    #[test]
    fn preferred_master_must_be_in_host_list() {
        let mut config = base();
        config.pref_master = Some("d".into());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::PreferredMasterNotInHosts(host)) if host == "d"
        ));

        config.pref_master = Some("b".into());
        let validated = config.validate().unwrap();
        assert_eq!(validated.preferred_master, Some(HostSpec::new("b", 3306)));

        config.pref_master = Some(String::new());
        assert_eq!(config.validate().unwrap().preferred_master, None);
    }

    #[test]
    fn monitor_loop_selection_follows_mode() {
        let mut config = base();
        assert!(config.validate().unwrap().uses_monitor_loop());

        config.failover = Some("force".into());
        assert!(!config.validate().unwrap().uses_monitor_loop());

        config.failover = None;
        config.switchover = Some("keep".into());
        assert!(config.validate().unwrap().uses_monitor_loop());
        config.interactive = Some(false);
        assert!(!config.validate().unwrap().uses_monitor_loop());
    }

    #[test]
    fn command_line_layer_overrides_file() {
        let file = ManagerConfig {
            hosts: vec!["f1,f2".into()],
            user: Some("file".into()),
            readonly: Some(false),
            ..base()
        };
        let cli = ManagerConfig {
            user: Some("cli".into()),
            ignore_servers: vec!["f2".into()],
            ..ManagerConfig::default()
        };
        let merged = file.merge(cli).validate().unwrap();
        assert_eq!(merged.credentials.user, "cli");
        assert_eq!(merged.hosts.len(), 2);
        assert!(!merged.readonly);
        assert_eq!(merged.ignore_list, vec![HostSpec::new("f2", 3306)]);
    }

    #[test]
    fn loads_toml_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
hosts = ["db1:3306", "db2:3306"]
user = "monitor:secret"
rpluser = "repl:secret"
switchover = "keep"
interactive = false
max_delay = 30
tick_interval_ms = 500

[logging]
directory = "logs"
format = "structured-json"
console = false
"#
        )
        .unwrap();
        let config = ManagerConfig::from_path(file.path())
            .unwrap()
            .validate()
            .unwrap();
        assert_eq!(config.mode, OperationMode::Switchover(SwitchoverMode::Keep));
        assert!(!config.interactive);
        assert_eq!(config.max_delay, Some(Duration::from_secs(30)));
        assert_eq!(config.tick_interval, Duration::from_millis(500));
        assert_eq!(config.logging.format, LogFormat::StructuredJson);
        assert!(!config.logging.console);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!("hostz = [\"a\"]".parse::<ManagerConfig>().is_err());
    }
}
