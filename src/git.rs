//! Git operations: enumeration, commit reconstruction, backups and the
//! history rewrite state machine.

pub mod backup;
pub mod commit;
pub mod object;
pub mod remote;
pub mod repository;
pub mod rewrite;

pub use backup::BackupManager;
pub use commit::{CommitInfo, Identity};
pub use repository::{BranchTarget, GitRepository};
pub use rewrite::{HistoryRewriter, RemapTable, RewriteMode, RewriteReport, RewriteState};

/// Number of hex characters to show in abbreviated commit hashes.
pub const SHORT_HASH_LEN: usize = 8;

/// Returns the abbreviated form of a commit hash.
pub fn short_hash(oid: git2::Oid) -> String {
    let mut hash = oid.to_string();
    hash.truncate(SHORT_HASH_LEN);
    hash
}
