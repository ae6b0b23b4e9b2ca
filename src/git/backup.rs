//! Rollback references created before a rewrite.

use anyhow::Result;
use git2::{ErrorCode, Oid, Repository};
use tracing::{debug, info};

use crate::error::RewriteError;

/// Creates and removes backup branches pointing at a pre-rewrite tip.
pub struct BackupManager<'repo> {
    repo: &'repo Repository,
}

impl<'repo> BackupManager<'repo> {
    /// Creates a backup manager for `repo`.
    pub fn new(repo: &'repo Repository) -> Self {
        Self { repo }
    }

    /// Returns the backup reference name for `branch` at `timestamp`.
    pub fn backup_name(branch: &str, timestamp: i64) -> String {
        format!("refs/heads/backup-{}-{timestamp}", branch.replace('/', "-"))
    }

    /// Creates a backup of `branch` at `tip`, named with the current time.
    pub fn create(&self, branch: &str, tip: Oid) -> Result<String, RewriteError> {
        self.create_at(branch, tip, chrono::Utc::now().timestamp())
    }

    /// Creates a backup of `branch` at `tip` named with `timestamp`.
    ///
    /// Never overwrites an existing reference.
    pub fn create_at(&self, branch: &str, tip: Oid, timestamp: i64) -> Result<String, RewriteError> {
        let name = Self::backup_name(branch, timestamp);
        let log_message = format!("git-rewrite-commits: backup of {branch}");

        match self.repo.reference(&name, tip, false, &log_message) {
            Ok(_) => {
                info!(backup = %name, tip = %tip, "Created backup reference");
                Ok(name)
            }
            Err(e) if e.code() == ErrorCode::Exists => Err(RewriteError::BackupExists(name)),
            Err(e) => Err(RewriteError::BackupFailure {
                name,
                reason: e.message().to_string(),
            }),
        }
    }

    /// Deletes a backup reference that turned out to be unnecessary.
    pub fn remove(&self, name: &str) -> Result<()> {
        let mut reference = self
            .repo
            .find_reference(name)
            .map_err(|e| RewriteError::Repository(format!("{name}: {}", e.message())))?;
        reference
            .delete()
            .map_err(|e| RewriteError::Repository(format!("{name}: {}", e.message())))?;
        debug!(backup = %name, "Removed unused backup reference");
        Ok(())
    }
}
