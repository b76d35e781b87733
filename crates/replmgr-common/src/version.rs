//! ---
//! rm_section: "14-versioning"
//! rm_subsection: "module"
//! rm_type: "source"
//! rm_scope: "code"
//! rm_description: "Build version metadata."
//! rm_version: "v0.0.0-prealpha"
//! rm_owner: "tbd"
//! ---
use serde::Serialize;

/// Compile-time version metadata.
#[derive(Debug, Clone, Serialize)]
pub struct VersionInfo {
    pub semver: String,
    /// Commit hash injected through `REPLMGR_GIT_SHA` at build time, if any.
    pub git_sha: String,
    /// `debug` or `release`.
    pub profile: String,
}

impl VersionInfo {
    #[must_use]
    pub fn current() -> Self {
        Self {
            semver: env!("CARGO_PKG_VERSION").to_owned(),
            git_sha: option_env!("REPLMGR_GIT_SHA")
                .unwrap_or("unknown")
                .to_owned(),
            profile: if cfg!(debug_assertions) {
                "debug".to_owned()
            } else {
                "release".to_owned()
            },
        }
    }

    #[must_use]
    pub fn cli_string(&self) -> String {
        format!("replmgr {} ({}, {})", self.semver, self.git_sha, self.profile)
    }

    /// Banner shown in the terminal UI header and startup log.
    #[must_use]
    pub fn banner(&self) -> String {
        format!("replmgr v{} (git {})", self.semver, self.git_sha)
    }
}
