//! Fatal error taxonomy for a rewrite run.

use thiserror::Error;

/// Errors that abort a rewrite run.
///
/// Per-commit provider failures are not represented here; they degrade to
/// the original message and are tallied in the run result instead.
#[derive(Error, Debug)]
pub enum RewriteError {
    /// The repository or branch could not be read.
    #[error("Repository error: {0}")]
    Repository(String),

    /// The user declined to send diffs to a remote AI provider.
    #[error("Consent to send repository data to the remote AI provider was denied")]
    ConsentDenied,

    /// A backup reference with the generated name already exists.
    #[error("Backup reference already exists: {0}")]
    BackupExists(String),

    /// The backup reference could not be written.
    #[error("Failed to create backup reference {name}: {reason}")]
    BackupFailure {
        /// Reference name that was attempted.
        name: String,
        /// Underlying failure.
        reason: String,
    },

    /// The branch moved between enumeration and the final reference update.
    #[error(
        "Reference {reference} no longer points at {expected}; history was not updated{}",
        backup.as_ref().map(|b| format!(" (backup kept at {b})")).unwrap_or_default()
    )]
    RefUpdateConflict {
        /// Fully qualified branch reference.
        reference: String,
        /// Tip the rewrite was computed against.
        expected: String,
        /// Backup reference left in place, if one was created.
        backup: Option<String>,
    },

    /// A secret-shaped pattern survived redaction.
    #[error("Redaction invariant violated: {pattern} pattern matched after redaction")]
    RedactionInvariantViolation {
        /// Name of the pattern that still matched.
        pattern: &'static str,
    },

    /// A parent hash was neither remapped nor outside the processed window.
    #[error("Commit {commit} references parent {parent} that has not been rewritten yet")]
    UnresolvedParent {
        /// Commit being rebuilt.
        commit: String,
        /// Offending parent.
        parent: String,
    },
}
