//! ---
//! rm_section: "01-core-functionality"
//! rm_subsection: "module"
//! rm_type: "source"
//! rm_scope: "code"
//! rm_description: "Operator scripts run around a failover."
//! rm_version: "v0.0.0-prealpha"
//! rm_owner: "tbd"
//! ---
use std::path::{Path, PathBuf};
use std::process::Command;

use replmgr_common::RunConfig;
use tracing::{info, warn};

use crate::error::HookError;

/// Pre and post failover scripts. A failing script never stops the failover.
#[derive(Debug, Clone, Default)]
pub struct FailoverHooks {
    pre: Option<PathBuf>,
    post: Option<PathBuf>,
}

impl FailoverHooks {
    pub fn new(pre: Option<PathBuf>, post: Option<PathBuf>) -> Self {
        Self { pre, post }
    }

    pub fn from_config(config: &RunConfig) -> Self {
        Self::new(
            config.pre_failover_script.clone(),
            config.post_failover_script.clone(),
        )
    }

    /// Runs `<pre> <old master host>`.
    pub fn run_pre(&self, old_master: &str) -> Option<Result<(), HookError>> {
        let path = self.pre.as_deref()?;
        Some(report(path, run_script(path, &[old_master])))
    }

    /// Runs `<post> <old master host> <new master host>`.
    pub fn run_post(&self, old_master: &str, new_master: &str) -> Option<Result<(), HookError>> {
        let path = self.post.as_deref()?;
        Some(report(path, run_script(path, &[old_master, new_master])))
    }
}

fn run_script(path: &Path, args: &[&str]) -> Result<(), HookError> {
    info!(script = %path.display(), ?args, "calling failover script");
    let status = Command::new(path)
        .args(args)
        .status()
        .map_err(|source| HookError::Spawn {
            path: path.to_path_buf(),
            source,
        })?;
    if status.success() {
        Ok(())
    } else {
        Err(HookError::Exit {
            path: path.to_path_buf(),
            status,
        })
    }
}

fn report(path: &Path, result: Result<(), HookError>) -> Result<(), HookError> {
    if let Err(err) = &result {
        warn!(script = %path.display(), error = %err, "failover script failed");
    }
    result
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    fn passes_hosts_as_arguments() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("args.txt");
        let post = script(
            dir.path(),
            "post.sh",
            &format!("echo \"$1 $2\" > {}", out.display()),
        );
        let hooks = FailoverHooks::new(None, Some(post));
        assert!(hooks.run_pre("h1").is_none());
        hooks.run_post("h1", "h2").unwrap().unwrap();
        assert_eq!(fs::read_to_string(out).unwrap().trim(), "h1 h2");
    }

    #[test]
    fn failures_are_reported_not_raised() {
        let dir = tempfile::tempdir().unwrap();
        let hooks = FailoverHooks::new(
            Some(PathBuf::from("/bin/false")),
            Some(dir.path().join("missing.sh")),
        );
        assert!(matches!(hooks.run_pre("h1"), Some(Err(HookError::Exit { .. }))));
        assert!(matches!(
            hooks.run_post("h1", "h2"),
            Some(Err(HookError::Spawn { .. }))
        ));
    }
}
