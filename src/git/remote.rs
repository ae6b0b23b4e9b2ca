//! Pushing a rewritten branch to a remote.

use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result};
use tracing::info;

/// Default remote used for pushes.
pub const DEFAULT_REMOTE: &str = "origin";

/// Builds the argument list for a forced push of `branch` to `remote`.
pub fn force_push_args(remote: &str, branch: &str) -> Vec<String> {
    vec![
        "push".to_string(),
        "--force-with-lease".to_string(),
        remote.to_string(),
        branch.to_string(),
    ]
}

/// Force-pushes `branch` to `remote` by running `git` directly, without a
/// shell.
pub fn force_push(workdir: &Path, remote: &str, branch: &str) -> Result<()> {
    info!(remote, branch, "Force-pushing rewritten branch");

    let output = Command::new("git")
        .args(force_push_args(remote, branch))
        .current_dir(workdir)
        .output()
        .context("Failed to run git push")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!(
            "git push to {} failed: {}",
            remote,
            crate::redaction::redact(stderr.trim())
        );
    }

    Ok(())
}
