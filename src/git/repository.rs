//! Git repository operations

use anyhow::{Context, Result};
use git2::{Oid, Repository, Sort};
use tracing::debug;

use crate::error::RewriteError;
use crate::git::commit::{render_diff, CommitInfo, Identity};

/// Git repository wrapper
pub struct GitRepository {
    repo: Repository,
}

/// Branch selected for rewriting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchTarget {
    /// Short branch name, e.g. `main`.
    pub name: String,
    /// Fully qualified reference, e.g. `refs/heads/main`.
    pub ref_name: String,
    /// Tip observed when the branch was resolved.
    pub tip: Oid,
}

impl GitRepository {
    /// Open repository at current directory
    pub fn open() -> Result<Self> {
        let repo = Repository::open_from_env()
            .map_err(|e| RewriteError::Repository(format!("Not in a git repository: {}", e.message())))?;

        Ok(Self { repo })
    }

    /// Open repository at specified path
    pub fn open_at<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let repo = Repository::open(path).map_err(|e| {
            RewriteError::Repository(format!(
                "Failed to open git repository at {}: {}",
                path.display(),
                e.message()
            ))
        })?;

        Ok(Self { repo })
    }

    /// Get repository path
    pub fn path(&self) -> &std::path::Path {
        self.repo.path()
    }

    /// Get workdir path
    pub fn workdir(&self) -> Option<&std::path::Path> {
        self.repo.workdir()
    }

    /// Get access to the underlying git2::Repository
    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    /// Resolves `branch`, or the current branch when none is given.
    pub fn resolve_branch(&self, branch: Option<&str>) -> Result<BranchTarget> {
        let reference = match branch {
            Some(name) => self
                .repo
                .find_branch(name, git2::BranchType::Local)
                .map_err(|e| {
                    RewriteError::Repository(format!("Branch '{name}' not found: {}", e.message()))
                })?
                .into_reference(),
            None => {
                let head = self.repo.head().map_err(|e| {
                    RewriteError::Repository(format!("Failed to get HEAD reference: {}", e.message()))
                })?;
                if !head.is_branch() {
                    return Err(RewriteError::Repository(
                        "Repository is in detached HEAD state; pass --branch".to_string(),
                    )
                    .into());
                }
                head
            }
        };

        let ref_name = reference
            .name()
            .ok_or_else(|| RewriteError::Repository("Branch name is not valid UTF-8".to_string()))?
            .to_string();
        let name = reference.shorthand().unwrap_or(&ref_name).to_string();
        let tip = reference
            .peel_to_commit()
            .map_err(|e| {
                RewriteError::Repository(format!("Branch '{name}' has no commits: {}", e.message()))
            })?
            .id();

        Ok(BranchTarget {
            name,
            ref_name,
            tip,
        })
    }

    /// Enumerates the first-parent ancestry of `tip`, oldest first.
    ///
    /// With `max_commits`, only the newest N commits are returned.
    pub fn enumerate(&self, tip: Oid, max_commits: Option<usize>) -> Result<Vec<CommitInfo>> {
        let mut walker = self.repo.revwalk().context("Failed to create revwalk")?;
        walker
            .set_sorting(Sort::TOPOLOGICAL)
            .context("Failed to configure revwalk")?;
        walker
            .simplify_first_parent()
            .context("Failed to configure revwalk")?;
        walker.push(tip).context("Failed to push branch tip")?;

        let limit = max_commits.unwrap_or(usize::MAX);
        let mut commits = Vec::new();
        for oid in walker.take(limit) {
            let oid = oid.context("Failed to get commit OID from walker")?;
            let commit = self
                .repo
                .find_commit(oid)
                .context("Failed to find commit")?;
            commits.push(CommitInfo::from_git_commit(&commit));
        }

        // Reverse to get chronological order (oldest first)
        commits.reverse();
        debug!(count = commits.len(), tip = %tip, "Enumerated commits");
        Ok(commits)
    }

    /// Builds a pseudo-commit describing the staged changes.
    pub fn staged_commit(&self) -> Result<CommitInfo> {
        let head_commit = self.repo.head().ok().and_then(|head| head.peel_to_commit().ok());
        let head_tree = head_commit
            .as_ref()
            .map(|commit| commit.tree())
            .transpose()
            .context("Failed to get HEAD tree")?;
        let index = self.repo.index().context("Failed to read index")?;

        let diff = self
            .repo
            .diff_tree_to_index(head_tree.as_ref(), Some(&index), None)
            .context("Failed to diff index against HEAD")?;
        if diff.deltas().len() == 0 {
            return Err(RewriteError::Repository("No staged changes found".to_string()).into());
        }
        let (files, text) = render_diff(&diff)?;

        let signature = self
            .repo
            .signature()
            .or_else(|_| git2::Signature::now("unknown", "unknown"))
            .context("Failed to determine commit identity")?;
        let identity = Identity::from_signature(&signature);

        Ok(CommitInfo {
            hash: Oid::zero(),
            parents: head_commit.iter().map(|commit| commit.id()).collect(),
            author: identity.clone(),
            committer: identity,
            tree: Oid::zero(),
            encoding: None,
            raw_message: Vec::new(),
            original_message: String::new(),
            diff: Some(text),
            files,
            quality_score: None,
            generated_message: None,
            rewritten_hash: None,
            staged: true,
        })
    }
}
