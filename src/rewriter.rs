//! End-to-end rewrite orchestration.
//!
//! Enumerates the branch, scores every message, generates replacements for
//! the weak ones concurrently and hands the result to the
//! [`HistoryRewriter`], which rebuilds the chain sequentially.

use std::io::{BufRead, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use git2::Oid;
use tracing::{debug, info, warn};

use crate::ai::registry::ProviderSelection;
use crate::ai::{ConsentGate, GenerationContext, MessageGenerator};
use crate::error::RewriteError;
use crate::git::remote::{force_push, DEFAULT_REMOTE};
use crate::git::{
    short_hash, BackupManager, CommitInfo, GitRepository, HistoryRewriter, RemapTable, RewriteMode,
};
use crate::quality::{score_message, DEFAULT_MIN_QUALITY_SCORE};
use crate::redaction::{redact_diff, RedactedDiff};

/// Default number of concurrent AI calls.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Default output language.
pub const DEFAULT_LANGUAGE: &str = "en";

/// Options for one invocation.
#[derive(Debug, Clone)]
pub struct RewriteOptions {
    /// Branch to rewrite; the current branch when `None`.
    pub branch: Option<String>,
    /// Only the newest N commits.
    pub max_commits: Option<usize>,
    /// Report without mutating anything.
    pub dry_run: bool,
    /// Do not create a rollback reference.
    pub skip_backup: bool,
    /// Leave messages that already score well untouched.
    pub skip_well_formed: bool,
    /// Threshold for [`skip_well_formed`](Self::skip_well_formed).
    pub min_quality_score: u8,
    /// Message template.
    pub template: Option<String>,
    /// Output language code.
    pub language: String,
    /// Custom generation instruction.
    pub custom_prompt: Option<String>,
    /// Generate a message for the staged changes instead of rewriting.
    pub staged: bool,
    /// Bypass the remote consent prompt.
    pub skip_remote_consent: bool,
    /// Make consent denial fatal and block the push on any failure.
    pub strict: bool,
    /// Maximum concurrent AI calls.
    pub concurrency: usize,
    /// Force-push the rewritten branch afterwards.
    pub push: bool,
    /// Remote to push to.
    pub remote: String,
    /// AI backend selection.
    pub provider: ProviderSelection,
}

impl Default for RewriteOptions {
    fn default() -> Self {
        Self {
            branch: None,
            max_commits: None,
            dry_run: false,
            skip_backup: false,
            skip_well_formed: true,
            min_quality_score: DEFAULT_MIN_QUALITY_SCORE,
            template: None,
            language: DEFAULT_LANGUAGE.to_string(),
            custom_prompt: None,
            staged: false,
            skip_remote_consent: false,
            strict: false,
            concurrency: DEFAULT_CONCURRENCY,
            push: false,
            remote: DEFAULT_REMOTE.to_string(),
            provider: ProviderSelection::default(),
        }
    }
}

/// A proposed or applied message change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageChange {
    /// Original commit.
    pub original: Oid,
    /// Replacement commit.
    pub rewritten: Oid,
    /// Message before the rewrite.
    pub old_message: String,
    /// Message after the rewrite.
    pub new_message: String,
}

/// Summary of one run.
#[derive(Debug, Clone)]
pub struct RewriteResult {
    /// Short name of the rewritten branch.
    pub branch: String,
    /// Commits that received a new message.
    pub generated: usize,
    /// Commits that kept their original message.
    pub kept_original: usize,
    /// Commits whose generation failed.
    pub failed: usize,
    /// Original to replacement mapping.
    pub remap: RemapTable,
    /// Backup reference kept for this run.
    pub backup_ref: Option<String>,
    /// Message changes in chain order.
    pub changes: Vec<MessageChange>,
    /// Tip before the rewrite.
    pub old_tip: Oid,
    /// Tip after the rewrite (projected for a dry run).
    pub new_tip: Oid,
    /// Whether nothing was persisted.
    pub dry_run: bool,
    /// Whether the user declined to send data to the provider.
    pub consent_denied: bool,
    /// Whether the branch was pushed.
    pub pushed: bool,
}

/// Drives a complete rewrite.
pub struct CommitRewriter {
    repo: GitRepository,
    generator: MessageGenerator,
    options: RewriteOptions,
}

impl CommitRewriter {
    /// Creates a rewriter over `repo` using `generator`.
    pub fn new(repo: GitRepository, generator: MessageGenerator, options: RewriteOptions) -> Self {
        Self {
            repo,
            generator,
            options,
        }
    }

    /// Returns the repository being rewritten.
    pub fn repository(&self) -> &GitRepository {
        &self.repo
    }

    /// Rewrites the selected branch.
    ///
    /// `is_terminal`, `reader` and `out` drive the consent prompt.
    pub async fn run(
        &self,
        is_terminal: bool,
        reader: &mut dyn BufRead,
        out: &mut dyn Write,
    ) -> Result<RewriteResult> {
        let options = &self.options;
        let target = self.repo.resolve_branch(options.branch.as_deref())?;
        let mut commits = self.repo.enumerate(target.tip, options.max_commits)?;
        info!(
            branch = %target.name,
            commits = commits.len(),
            dry_run = options.dry_run,
            "Starting rewrite"
        );

        let candidates = self.select_candidates(&mut commits);
        let mut kept_original = commits.len() - candidates.len();
        let mut generated = 0;
        let mut failed = 0;
        let mut consent_denied = false;

        if !candidates.is_empty() {
            let gate = ConsentGate::new(self.generator.metadata().remote, options.skip_remote_consent);
            match gate.ensure(&self.generator.metadata(), is_terminal, reader, out) {
                Ok(decision) => debug!(?decision, "Consent checked"),
                Err(e)
                    if !options.strict
                        && matches!(
                            e.downcast_ref::<RewriteError>(),
                            Some(RewriteError::ConsentDenied)
                        ) =>
                {
                    warn!("Consent denied; keeping original messages");
                    consent_denied = true;
                }
                Err(e) => return Err(e),
            }
        }

        if consent_denied {
            kept_original += candidates.len();
        } else if !candidates.is_empty() {
            let diffs = self.prepare_diffs(&mut commits, &candidates)?;
            let outcomes = self.generate_all(&commits, &diffs).await;

            for (idx, outcome) in outcomes {
                let commit = &mut commits[idx];
                match outcome {
                    Ok(message) if message.as_bytes() != commit.raw_message.as_slice() => {
                        commit.generated_message = Some(message);
                        generated += 1;
                    }
                    Ok(_) => kept_original += 1,
                    Err(e) => {
                        warn!(
                            commit = %short_hash(commit.hash),
                            error = %format!("{e:#}"),
                            "Generation failed; keeping original message"
                        );
                        failed += 1;
                    }
                }
            }
        }

        let mode = if options.dry_run {
            RewriteMode::DryRun
        } else {
            RewriteMode::Apply {
                backup: !options.skip_backup,
            }
        };
        let report = HistoryRewriter::new(self.repo.repository()).run(&target, &mut commits, mode)?;

        let mut backup_ref = report.backup_ref.clone();
        if !options.dry_run && report.changed() == 0 {
            if let Some(name) = backup_ref.take() {
                BackupManager::new(self.repo.repository()).remove(&name)?;
            }
        }

        let changes = commits
            .iter()
            .filter(|commit| commit.message_changed())
            .filter_map(|commit| {
                Some(MessageChange {
                    original: commit.hash,
                    rewritten: commit.rewritten_hash?,
                    old_message: commit.original_message.clone(),
                    new_message: commit.generated_message.clone()?,
                })
            })
            .collect();

        let mut pushed = false;
        if options.push && !options.dry_run && report.changed() > 0 {
            if options.strict && failed > 0 {
                warn!(failed, "Strict mode: not pushing because some commits failed");
            } else {
                let workdir = self.repo.workdir().unwrap_or_else(|| self.repo.path());
                force_push(workdir, &options.remote, &target.name)?;
                pushed = true;
            }
        }

        Ok(RewriteResult {
            branch: target.name,
            generated,
            kept_original,
            failed,
            remap: report.remap,
            backup_ref,
            changes,
            old_tip: target.tip,
            new_tip: report.new_tip,
            dry_run: options.dry_run,
            consent_denied,
            pushed,
        })
    }

    /// Generates a message for the staged changes.
    pub async fn generate_for_staged(
        &self,
        is_terminal: bool,
        reader: &mut dyn BufRead,
        out: &mut dyn Write,
    ) -> Result<String> {
        let mut staged = self.repo.staged_commit()?;
        let metadata = self.generator.metadata();
        ConsentGate::new(metadata.remote, self.options.skip_remote_consent)
            .ensure(&metadata, is_terminal, reader, out)?;

        let diff = staged.load_diff(self.repo.repository())?;
        let redacted = redact_diff(diff)?;
        self.generator
            .generate(
                &redacted,
                &GenerationContext {
                    files: &staged.files,
                    old_message: "",
                },
            )
            .await
            .context("Failed to generate message for staged changes")
    }

    /// Scores every commit and returns the indices that need a new message.
    fn select_candidates(&self, commits: &mut [CommitInfo]) -> Vec<usize> {
        let mut candidates = Vec::new();
        for (idx, commit) in commits.iter_mut().enumerate() {
            let quality = score_message(&commit.original_message);
            let well_formed = quality.is_well_formed(self.options.min_quality_score);
            debug!(
                commit = %short_hash(commit.hash),
                score = quality.score,
                reason = %quality.reason(),
                "Scored commit message"
            );
            commit.quality_score = Some(quality.score);

            if self.options.skip_well_formed && well_formed {
                continue;
            }
            candidates.push(idx);
        }
        candidates
    }

    /// Loads and redacts the diffs of all candidates.
    fn prepare_diffs(
        &self,
        commits: &mut [CommitInfo],
        candidates: &[usize],
    ) -> Result<Vec<(usize, RedactedDiff)>> {
        candidates
            .iter()
            .map(|&idx| {
                let diff = commits[idx].load_diff(self.repo.repository())?;
                Ok::<_, anyhow::Error>((idx, redact_diff(diff)?))
            })
            .collect()
    }

    /// Runs generation for every prepared diff under the concurrency bound.
    ///
    /// Results come back in chain order.
    async fn generate_all(
        &self,
        commits: &[CommitInfo],
        diffs: &[(usize, RedactedDiff)],
    ) -> Vec<(usize, Result<String>)> {
        let semaphore = Arc::new(tokio::sync::Semaphore::new(self.options.concurrency.max(1)));
        let generator = &self.generator;

        let futs: Vec<_> = diffs
            .iter()
            .map(|(idx, diff)| {
                let sem = semaphore.clone();
                let commit = &commits[*idx];
                async move {
                    let result = async {
                        let _permit = sem
                            .acquire()
                            .await
                            .map_err(|e| anyhow::anyhow!("semaphore closed: {e}"))?;
                        generator
                            .generate(
                                diff,
                                &GenerationContext {
                                    files: &commit.files,
                                    old_message: &commit.original_message,
                                },
                            )
                            .await
                    }
                    .await;
                    (*idx, result)
                }
            })
            .collect();

        futures::future::join_all(futs).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::ai::generator::GenerationOptions;
    use crate::ai::test_utils::ConfigurableMockAiClient;
    use crate::ai::RetryConfig;
    use git2::{Repository, Signature};
    use std::io::Cursor;
    use tempfile::TempDir;

    fn init_repo(messages: &[&str]) -> TempDir {
        let dir = TempDir::new().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        let signature = Signature::now("Test User", "test@example.com").unwrap();
        let mut parent: Option<Oid> = None;
        for (i, message) in messages.iter().enumerate() {
            let name = format!("file{i}.txt");
            std::fs::write(dir.path().join(&name), format!("content {i}\n")).unwrap();
            let mut index = repo.index().unwrap();
            index.add_path(std::path::Path::new(&name)).unwrap();
            index.write().unwrap();
            let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
            let parent_commit = parent.map(|oid| repo.find_commit(oid).unwrap());
            let parents: Vec<_> = parent_commit.iter().collect();
            parent = Some(
                repo.commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)
                    .unwrap(),
            );
        }
        dir
    }

    fn rewriter(dir: &TempDir, responses: Vec<Result<String>>, options: RewriteOptions) -> CommitRewriter {
        let generator = MessageGenerator::new(
            Box::new(ConfigurableMockAiClient::new(responses)),
            RetryConfig::no_retry(),
            GenerationOptions {
                language: "en".to_string(),
                ..Default::default()
            },
        );
        CommitRewriter::new(GitRepository::open_at(dir.path()).unwrap(), generator, options)
    }

    #[tokio::test]
    async fn weak_messages_are_regenerated() {
        let dir = init_repo(&["fix\n", "wip\n", "feat: add login\n"]);
        let rewriter = rewriter(
            &dir,
            vec![
                Ok("fix: handle empty input".to_string()),
                Ok("feat: add second file".to_string()),
            ],
            RewriteOptions::default(),
        );

        let result = rewriter
            .run(false, &mut Cursor::new(""), &mut Vec::new())
            .await
            .unwrap();

        assert_eq!((result.generated, result.kept_original, result.failed), (2, 1, 0));
        assert_eq!(result.changes.len(), 2);
        assert_eq!(result.changes[0].new_message, "fix: handle empty input\n");
        assert!(result.backup_ref.is_some());

        let repo = rewriter.repository().repository();
        let head = repo.head().unwrap().peel_to_commit().unwrap();
        assert_eq!(head.id(), result.new_tip);
        assert_eq!(head.message(), Some("feat: add login\n"));
    }

    #[tokio::test]
    async fn failures_keep_original_message() {
        let dir = init_repo(&["wip\n", "tmp\n"]);
        let rewriter = rewriter(
            &dir,
            vec![Err(anyhow::anyhow!("boom")), Ok("chore: add second file".to_string())],
            RewriteOptions {
                concurrency: 1,
                ..Default::default()
            },
        );

        let result = rewriter
            .run(false, &mut Cursor::new(""), &mut Vec::new())
            .await
            .unwrap();

        assert_eq!((result.generated, result.kept_original, result.failed), (1, 0, 1));
        let repo = rewriter.repository().repository();
        let second = repo.find_commit(result.remap.resolve(result.changes[0].original)).unwrap();
        assert_eq!(second.message(), Some("chore: add second file\n"));
    }

    #[tokio::test]
    async fn unchanged_run_removes_backup() {
        let dir = init_repo(&["feat: add login page\n"]);
        let rewriter = rewriter(&dir, vec![], RewriteOptions::default());

        let result = rewriter
            .run(false, &mut Cursor::new(""), &mut Vec::new())
            .await
            .unwrap();

        assert_eq!(result.remap.changed_count(), 0);
        assert!(result.backup_ref.is_none());
        let repo = rewriter.repository().repository();
        let backups = repo.references_glob("refs/heads/backup-*").unwrap().count();
        assert_eq!(backups, 0);
    }

    #[tokio::test]
    async fn consent_denial_keeps_everything() {
        let dir = init_repo(&["wip\n"]);
        let mock = ConfigurableMockAiClient::new(vec![Ok("feat: x".to_string())]);
        let prompts = mock.prompt_handle();
        let generator = MessageGenerator::new(
            Box::new(RemoteMock(mock)),
            RetryConfig::no_retry(),
            GenerationOptions::default(),
        );
        let rewriter = CommitRewriter::new(
            GitRepository::open_at(dir.path()).unwrap(),
            generator,
            RewriteOptions::default(),
        );

        let result = rewriter
            .run(false, &mut Cursor::new(""), &mut Vec::new())
            .await
            .unwrap();

        assert!(result.consent_denied);
        assert_eq!((result.generated, result.kept_original), (0, 1));
        assert_eq!(prompts.request_count(), 0);
    }

    #[tokio::test]
    async fn strict_consent_denial_is_fatal() {
        let dir = init_repo(&["wip\n"]);
        let generator = MessageGenerator::new(
            Box::new(RemoteMock(ConfigurableMockAiClient::new(vec![]))),
            RetryConfig::no_retry(),
            GenerationOptions::default(),
        );
        let rewriter = CommitRewriter::new(
            GitRepository::open_at(dir.path()).unwrap(),
            generator,
            RewriteOptions {
                strict: true,
                ..Default::default()
            },
        );

        let err = rewriter
            .run(false, &mut Cursor::new(""), &mut Vec::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RewriteError>(),
            Some(RewriteError::ConsentDenied)
        ));
    }

    /// Wraps the mock so it reports itself as a remote provider.
    struct RemoteMock(ConfigurableMockAiClient);

    impl crate::ai::AiClient for RemoteMock {
        fn send_request<'a>(
            &'a self,
            system_prompt: &'a str,
            user_prompt: &'a str,
        ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<String>> + Send + 'a>>
        {
            self.0.send_request(system_prompt, user_prompt)
        }

        fn get_metadata(&self) -> crate::ai::AiClientMetadata {
            crate::ai::AiClientMetadata {
                remote: true,
                ..self.0.get_metadata()
            }
        }
    }
}
