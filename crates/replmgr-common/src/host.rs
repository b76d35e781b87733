//! ---
//! rm_section: "01-core-functionality"
//! rm_subsection: "module"
//! rm_type: "source"
//! rm_scope: "code"
//! rm_description: "Host specifiers and login pairs shared across the workspace."
//! rm_version: "v0.0.0-prealpha"
//! rm_owner: "tbd"
//! ---
use std::fmt;
use std::str::FromStr;

use serde_with::{DeserializeFromStr, SerializeDisplay};

use crate::error::ConfigError;

/// Port assumed when a host entry omits one.
pub const DEFAULT_PORT: u16 = 3306;

/// A `host[:port]` entry from the configured host list.
///
/// Two specifiers are equal when host and port match, so `db1` and
/// `db1:3306` name the same node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, SerializeDisplay, DeserializeFromStr)]
pub struct HostSpec {
    host: String,
    port: u16,
}

impl HostSpec {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Display URL used in logs and on screen.
    pub fn url(&self) -> String {
        self.to_string()
    }

    /// Parse a comma separated list, skipping blank entries.
    pub fn parse_list(raw: &str) -> Result<Vec<HostSpec>, ConfigError> {
        raw.split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(HostSpec::from_str)
            .collect()
    }
}

impl fmt::Display for HostSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl FromStr for HostSpec {
    type Err = ConfigError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let entry = raw.trim();
        let invalid = |reason: &str| ConfigError::InvalidHost {
            entry: raw.to_owned(),
            reason: reason.to_owned(),
        };
        if entry.is_empty() {
            return Err(invalid("empty host entry"));
        }

        // [v6addr]:port or [v6addr]
        if let Some(rest) = entry.strip_prefix('[') {
            let (host, tail) = rest
                .split_once(']')
                .ok_or_else(|| invalid("unterminated '[' in address"))?;
            let port = match tail.strip_prefix(':') {
                Some(port) => parse_port(port).map_err(|reason| invalid(&reason))?,
                None if tail.is_empty() => DEFAULT_PORT,
                None => return Err(invalid("unexpected characters after ']'")),
            };
            return Ok(Self::new(host, port));
        }

        match entry.split_once(':') {
            // a bare IPv6 address carries several colons and no port
            Some((_, rest)) if rest.contains(':') => Ok(Self::new(entry, DEFAULT_PORT)),
            Some((host, port)) => {
                if host.is_empty() {
                    return Err(invalid("missing host name"));
                }
                let port = parse_port(port).map_err(|reason| invalid(&reason))?;
                Ok(Self::new(host, port))
            }
            None => Ok(Self::new(entry, DEFAULT_PORT)),
        }
    }
}

fn parse_port(raw: &str) -> Result<u16, String> {
    match raw.parse::<u16>() {
        Ok(0) => Err("port must be greater than zero".to_owned()),
        Ok(port) => Ok(port),
        Err(err) => Err(format!("invalid port '{raw}': {err}")),
    }
}

/// A `user[:password]` login pair.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl Credentials {
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl FromStr for Credentials {
    type Err = ConfigError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let (user, password) = raw.split_once(':').unwrap_or((raw, ""));
        if user.trim().is_empty() {
            return Err(ConfigError::InvalidCredentials(
                "user name must not be empty".to_owned(),
            ));
        }
        Ok(Self::new(user.trim(), password))
    }
}
