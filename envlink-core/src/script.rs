// envlink-core/src/script.rs
//! Lifecycle scripts shipped inside packages.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use envlink_common::error::{LinkError, Result};
use envlink_common::model::Dist;
use tracing::{debug, error, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptAction {
    PostLink,
    PreUnlink,
}

impl ScriptAction {
    pub fn as_str(self) -> &'static str {
        match self {
            ScriptAction::PostLink => "post-link",
            ScriptAction::PreUnlink => "pre-unlink",
        }
    }
}

impl fmt::Display for ScriptAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened when a script was looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptOutcome {
    NotPresent,
    Skipped,
    Succeeded,
}

/// `<prefix>/bin/.<name>-<action>.sh`, or
/// `<prefix>\Scripts\.<name>-<action>.bat` on Windows.
pub fn script_path(prefix: &Path, dist: &Dist, action: ScriptAction) -> PathBuf {
    let (dir, ext) = if cfg!(windows) {
        ("Scripts", "bat")
    } else {
        ("bin", "sh")
    };
    prefix
        .join(dir)
        .join(format!(".{}-{}.{}", dist.name(), action, ext))
}

/// Runs the `action` script of `dist` if the package installed one, with
/// `PREFIX` set to the environment prefix. A failing script is fatal.
pub fn run_script(
    prefix: &Path,
    dist: &Dist,
    action: ScriptAction,
    skip_scripts: bool,
) -> Result<ScriptOutcome> {
    let path = script_path(prefix, dist, action);
    if !path.is_file() {
        debug!("No {} script for {}", action, dist);
        return Ok(ScriptOutcome::NotPresent);
    }
    if skip_scripts {
        warn!("skipping {} script by user request", action);
        return Ok(ScriptOutcome::Skipped);
    }

    let failed = || LinkError::ScriptFailed {
        dist: dist.to_string(),
        action: action.to_string(),
    };

    let mut cmd = script_command(&path).ok_or_else(failed)?;
    cmd.env("PREFIX", prefix);
    cmd.stdin(Stdio::null());

    debug!("Running {} script {}", action, path.display());
    match cmd.status() {
        Ok(status) if status.success() => {
            debug!("{} script for {} finished successfully", action, dist);
            Ok(ScriptOutcome::Succeeded)
        }
        Ok(status) => {
            error!("{} script for {} exited with {}", action, dist, status);
            Err(failed())
        }
        Err(e) => {
            error!("Failed to execute {}: {}", path.display(), e);
            Err(failed())
        }
    }
}

#[cfg(windows)]
fn script_command(path: &Path) -> Option<Command> {
    let comspec = std::env::var_os("COMSPEC")?;
    let mut cmd = Command::new(comspec);
    cmd.arg("/c").arg(path);
    Some(cmd)
}

#[cfg(not(windows))]
fn script_command(path: &Path) -> Option<Command> {
    let shell = if cfg!(any(
        target_os = "freebsd",
        target_os = "openbsd",
        target_os = "netbsd",
        target_os = "dragonfly"
    )) {
        "/bin/sh"
    } else {
        "/bin/bash"
    };
    let mut cmd = Command::new(shell);
    cmd.arg(path);
    Some(cmd)
}
