//! Commit information gathered during enumeration.

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset};
use git2::{Commit, Diff, Oid, Repository, Signature};
use serde::Serialize;

/// A person and timestamp as recorded on a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    /// Name bytes exactly as recorded in the commit.
    pub name: Vec<u8>,
    /// Email bytes exactly as recorded in the commit.
    pub email: Vec<u8>,
    /// Seconds since the Unix epoch.
    pub seconds: i64,
    /// Timezone offset in minutes.
    pub offset_minutes: i32,
    /// Sign of the timezone offset, kept separately so `-0000` survives.
    pub sign: char,
}

impl Identity {
    /// Captures the identity recorded in a git signature.
    pub fn from_signature(signature: &Signature<'_>) -> Self {
        let when = signature.when();
        Self {
            name: signature.name_bytes().to_vec(),
            email: signature.email_bytes().to_vec(),
            seconds: when.seconds(),
            offset_minutes: when.offset_minutes(),
            sign: when.sign(),
        }
    }

    /// Returns the timestamp with its original offset.
    pub fn date(&self) -> Option<DateTime<FixedOffset>> {
        let offset = FixedOffset::east_opt(self.offset_minutes * 60)?;
        DateTime::from_timestamp(self.seconds, 0).map(|utc| utc.with_timezone(&offset))
    }
}

/// One commit in the window being rewritten.
///
/// Created by enumeration, enriched in place by scoring and generation, and
/// finally annotated with its replacement hash by the rewriter.
#[derive(Debug, Clone)]
pub struct CommitInfo {
    /// Original commit hash.
    pub hash: Oid,
    /// Parent hashes in order; the first is the first parent.
    pub parents: Vec<Oid>,
    /// Author identity and authored timestamp.
    pub author: Identity,
    /// Committer identity and commit timestamp.
    pub committer: Identity,
    /// Tree the commit records.
    pub tree: Oid,
    /// Message encoding header, when one was recorded.
    pub encoding: Option<String>,
    /// Message bytes exactly as stored in the commit object.
    pub raw_message: Vec<u8>,
    /// Lossy UTF-8 decoding of the message, for scoring and prompts only.
    pub original_message: String,
    /// Patch text against the first parent, loaded on demand.
    pub diff: Option<String>,
    /// Paths touched by the commit, loaded with the diff.
    pub files: Vec<String>,
    /// Quality score of the original message, when scored.
    pub quality_score: Option<u8>,
    /// AI-generated replacement message, when one was produced.
    pub generated_message: Option<String>,
    /// Hash of the replacement commit once the rewriter has processed it.
    pub rewritten_hash: Option<Oid>,
    /// True for the synthetic entry representing staged changes.
    pub staged: bool,
}

impl CommitInfo {
    /// Creates commit information from a git2 commit without loading its diff.
    pub fn from_git_commit(commit: &Commit<'_>) -> Self {
        Self {
            hash: commit.id(),
            parents: commit.parent_ids().collect(),
            author: Identity::from_signature(&commit.author()),
            committer: Identity::from_signature(&commit.committer()),
            tree: commit.tree_id(),
            encoding: commit.message_encoding().map(str::to_string),
            raw_message: commit.message_raw_bytes().to_vec(),
            original_message: String::from_utf8_lossy(commit.message_raw_bytes()).into_owned(),
            diff: None,
            files: Vec::new(),
            quality_score: None,
            generated_message: None,
            rewritten_hash: None,
            staged: false,
        }
    }

    /// Returns the first line of the original message.
    pub fn subject(&self) -> &str {
        self.original_message.trim().lines().next().unwrap_or("")
    }

    /// Returns true when this commit has more than one parent.
    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }

    /// Returns the message the replacement commit should carry.
    pub fn chosen_message(&self) -> &[u8] {
        self.generated_message
            .as_deref()
            .map_or(self.raw_message.as_slice(), str::as_bytes)
    }

    /// Returns true when a generated message replaces the original.
    pub fn message_changed(&self) -> bool {
        self.generated_message
            .as_deref()
            .is_some_and(|generated| generated.as_bytes() != self.raw_message.as_slice())
    }

    /// Loads the diff against the first parent, if not already loaded.
    pub fn load_diff(&mut self, repo: &Repository) -> Result<&str> {
        if self.diff.is_none() {
            let commit = repo
                .find_commit(self.hash)
                .with_context(|| format!("Commit not found: {}", self.hash))?;
            let commit_tree = commit.tree().context("Failed to get commit tree")?;
            let parent_tree = if commit.parent_count() > 0 {
                Some(
                    commit
                        .parent(0)
                        .context("Failed to get parent commit")?
                        .tree()
                        .context("Failed to get parent tree")?,
                )
            } else {
                None
            };

            let diff = repo
                .diff_tree_to_tree(parent_tree.as_ref(), Some(&commit_tree), None)
                .context("Failed to create diff")?;
            let (files, text) = render_diff(&diff)?;
            self.files = files;
            self.diff = Some(text);
        }

        Ok(self.diff.as_deref().unwrap_or_default())
    }
}

/// Renders a diff as patch text and collects the touched paths.
pub(crate) fn render_diff(diff: &Diff<'_>) -> Result<(Vec<String>, String)> {
    let files = diff
        .deltas()
        .filter_map(|delta| {
            delta
                .new_file()
                .path()
                .or_else(|| delta.old_file().path())
                .map(|path| path.to_string_lossy().into_owned())
        })
        .collect();

    let mut text = String::new();
    diff.print(git2::DiffFormat::Patch, |_delta, _hunk, line| {
        let content = String::from_utf8_lossy(line.content());
        match line.origin() {
            origin @ ('+' | '-' | ' ') => {
                text.push(origin);
                text.push_str(&content);
            }
            _ => text.push_str(&content),
        }
        true
    })
    .context("Failed to format diff")?;

    Ok((files, text))
}
