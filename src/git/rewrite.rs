//! History rewrite state machine.
//!
//! Commits are rebuilt strictly oldest to newest. Each replacement reuses the
//! original tree, author and committer verbatim and differs only in its
//! message and in parents remapped through the [`RemapTable`]. The branch
//! reference moves once, at the end, guarded by the tip observed during
//! enumeration.

use std::collections::{HashMap, HashSet};

use anyhow::Result;
use git2::{Oid, Repository};
use tracing::{debug, info, warn};

use crate::error::RewriteError;
use crate::git::backup::BackupManager;
use crate::git::commit::CommitInfo;
use crate::git::object::CommitObject;
use crate::git::repository::BranchTarget;
use crate::git::short_hash;

/// Mapping from original commit hashes to their replacements.
///
/// Owned by a single rewrite run; entries are only ever added.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemapTable {
    entries: HashMap<Oid, Oid>,
}

impl RemapTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `original` is replaced by `replacement`.
    pub fn insert(&mut self, original: Oid, replacement: Oid) {
        self.entries.insert(original, replacement);
    }

    /// Returns the replacement for `original`, if it was processed.
    pub fn get(&self, original: Oid) -> Option<Oid> {
        self.entries.get(&original).copied()
    }

    /// Returns the replacement for `oid`, or `oid` itself when unmapped.
    pub fn resolve(&self, oid: Oid) -> Oid {
        self.get(oid).unwrap_or(oid)
    }

    /// Number of processed commits.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when no commit has been processed.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of commits whose hash changed.
    pub fn changed_count(&self) -> usize {
        self.entries.iter().filter(|(old, new)| old != new).count()
    }

    /// Iterates over `(original, replacement)` pairs in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (Oid, Oid)> + '_ {
        self.entries.iter().map(|(old, new)| (*old, *new))
    }
}

/// Lifecycle of one rewrite run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewriteState {
    /// Nothing has happened yet.
    Idle,
    /// The rollback reference exists.
    BackedUp,
    /// Replacement commits are being constructed.
    Rewriting,
    /// The branch reference points at the new tip.
    Completed,
    /// A fatal error stopped the run; the branch was not moved.
    Aborted,
}

/// Whether replacement commits are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewriteMode {
    /// Compute hashes in memory only.
    DryRun,
    /// Write objects and move the branch.
    Apply {
        /// Create a rollback reference before mutating anything.
        backup: bool,
    },
}

impl RewriteMode {
    /// Returns true for [`RewriteMode::DryRun`].
    pub fn is_dry_run(self) -> bool {
        matches!(self, Self::DryRun)
    }
}

/// Outcome of a rewrite run.
#[derive(Debug, Clone)]
pub struct RewriteReport {
    /// Final state.
    pub state: RewriteState,
    /// Original to replacement mapping for every processed commit.
    pub remap: RemapTable,
    /// Tip the branch points at (or would point at, for a dry run).
    pub new_tip: Oid,
    /// Backup reference created for this run.
    pub backup_ref: Option<String>,
}

impl RewriteReport {
    /// Number of commits whose hash changed.
    pub fn changed(&self) -> usize {
        self.remap.changed_count()
    }
}

/// Rebuilds a commit chain with new messages and moves the branch.
pub struct HistoryRewriter<'repo> {
    repo: &'repo Repository,
    state: RewriteState,
    transitions: Vec<RewriteState>,
    backup_ref: Option<String>,
}

impl<'repo> HistoryRewriter<'repo> {
    /// Creates an idle rewriter for `repo`.
    pub fn new(repo: &'repo Repository) -> Self {
        Self {
            repo,
            state: RewriteState::Idle,
            transitions: Vec::new(),
            backup_ref: None,
        }
    }

    /// Current state.
    pub fn state(&self) -> RewriteState {
        self.state
    }

    /// States entered so far, in order, excluding the initial `Idle`.
    pub fn transitions(&self) -> &[RewriteState] {
        &self.transitions
    }

    fn transition(&mut self, next: RewriteState) {
        debug!(from = ?self.state, to = ?next, "Rewrite state transition");
        self.state = next;
        self.transitions.push(next);
    }

    /// Runs the rewrite for `commits`, which must be oldest first and end at
    /// `target.tip`. Each commit's `rewritten_hash` is filled in.
    pub fn run(
        &mut self,
        target: &BranchTarget,
        commits: &mut [CommitInfo],
        mode: RewriteMode,
    ) -> Result<RewriteReport> {
        if self.state != RewriteState::Idle {
            anyhow::bail!("Rewriter has already run (state {:?})", self.state);
        }

        match self.execute(target, commits, mode) {
            Ok(report) => Ok(report),
            Err(e) => {
                self.transition(RewriteState::Aborted);
                warn!(branch = %target.name, error = %e, "Rewrite aborted");
                Err(e)
            }
        }
    }

    fn execute(
        &mut self,
        target: &BranchTarget,
        commits: &mut [CommitInfo],
        mode: RewriteMode,
    ) -> Result<RewriteReport> {
        if let RewriteMode::Apply { backup: true } = mode {
            let name = BackupManager::new(self.repo).create(&target.name, target.tip)?;
            self.backup_ref = Some(name);
            self.transition(RewriteState::BackedUp);
        }

        self.transition(RewriteState::Rewriting);
        let remap = self.rebuild(commits, mode)?;

        let new_tip = remap.resolve(target.tip);
        if let RewriteMode::Apply { .. } = mode {
            self.update_reference(target, new_tip)?;
        }

        self.transition(RewriteState::Completed);
        info!(
            branch = %target.name,
            old_tip = %short_hash(target.tip),
            new_tip = %short_hash(new_tip),
            changed = remap.changed_count(),
            dry_run = mode.is_dry_run(),
            "Rewrite completed"
        );

        Ok(RewriteReport {
            state: self.state,
            remap,
            new_tip,
            backup_ref: self.backup_ref.clone(),
        })
    }

    /// Constructs replacement commits oldest first.
    fn rebuild(&self, commits: &mut [CommitInfo], mode: RewriteMode) -> Result<RemapTable> {
        let window: HashSet<Oid> = commits.iter().map(|commit| commit.hash).collect();
        let mut remap = RemapTable::new();

        for commit in commits.iter_mut() {
            let parents = commit
                .parents
                .iter()
                .map(|&parent| match remap.get(parent) {
                    Some(replacement) => Ok(replacement),
                    None if window.contains(&parent) => Err(RewriteError::UnresolvedParent {
                        commit: commit.hash.to_string(),
                        parent: parent.to_string(),
                    }),
                    None => Ok(parent),
                })
                .collect::<Result<Vec<_>, _>>()?;

            let replacement = if parents == commit.parents && !commit.message_changed() {
                commit.hash
            } else {
                let object = CommitObject {
                    tree: commit.tree,
                    parents: &parents,
                    author: &commit.author,
                    committer: &commit.committer,
                    encoding: commit.encoding.as_deref(),
                    message: commit.chosen_message(),
                };
                match mode {
                    RewriteMode::DryRun => object.hash()?,
                    RewriteMode::Apply { .. } => object.write(self.repo)?,
                }
            };

            debug!(
                original = %short_hash(commit.hash),
                replacement = %short_hash(replacement),
                merge = commit.is_merge(),
                "Rebuilt commit"
            );
            remap.insert(commit.hash, replacement);
            commit.rewritten_hash = Some(replacement);
        }

        Ok(remap)
    }

    /// Moves the branch to `new_tip` if it still points at the enumerated tip.
    fn update_reference(&self, target: &BranchTarget, new_tip: Oid) -> Result<(), RewriteError> {
        if new_tip == target.tip {
            debug!(branch = %target.name, "Tip unchanged; reference not updated");
            return Ok(());
        }

        let log_message = format!(
            "git-rewrite-commits: {} -> {}",
            short_hash(target.tip),
            short_hash(new_tip)
        );
        self.repo
            .reference_matching(&target.ref_name, new_tip, true, target.tip, &log_message)
            .map_err(|e| {
                debug!(reference = %target.ref_name, error = %e.message(), "Guarded update failed");
                RewriteError::RefUpdateConflict {
                    reference: target.ref_name.clone(),
                    expected: target.tip.to_string(),
                    backup: self.backup_ref.clone(),
                }
            })?;
        Ok(())
    }
}
