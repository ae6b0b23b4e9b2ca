//! CLI interface for git-rewrite-commits.

use std::fmt::Write as _;
use std::io::{self, IsTerminal};

use anyhow::Result;
use clap::builder::PossibleValuesParser;
use clap::Parser;
use tracing::debug;

use crate::ai::generator::GenerationOptions;
use crate::ai::prompts::find_commit_message_context;
use crate::ai::registry::{provider_names, ProviderSelection};
use crate::ai::{MessageGenerator, RetryConfig};
use crate::git::remote::DEFAULT_REMOTE;
use crate::git::{short_hash, GitRepository};
use crate::quality::DEFAULT_MIN_QUALITY_SCORE;
use crate::rewriter::{
    CommitRewriter, RewriteOptions, RewriteResult, DEFAULT_CONCURRENCY, DEFAULT_LANGUAGE,
};
use crate::utils::Settings;

pub mod hooks;

/// git-rewrite-commits: rewrite commit messages with AI-generated
/// conventional commits while preserving code content.
#[derive(Parser, Debug)]
#[command(name = "git-rewrite-commits")]
#[command(
    about = "Rewrite git commit messages with AI-generated conventional commits",
    long_about = None
)]
#[command(version)]
pub struct Cli {
    /// AI provider to use.
    #[arg(long, value_parser = PossibleValuesParser::new(provider_names()))]
    pub provider: Option<String>,

    /// Model to use instead of the provider default.
    #[arg(long)]
    pub model: Option<String>,

    /// Environment variable holding the API key.
    #[arg(long, value_name = "VAR")]
    pub api_key_env: Option<String>,

    /// Endpoint override, e.g. a remote Ollama server.
    #[arg(long, value_name = "URL")]
    pub base_url: Option<String>,

    /// Branch to rewrite (default: current branch).
    #[arg(short, long)]
    pub branch: Option<String>,

    /// Only rewrite the last N commits.
    #[arg(long, value_name = "N")]
    pub max_commits: Option<usize>,

    /// Show what would change without rewriting anything.
    #[arg(short, long)]
    pub dry_run: bool,

    /// Do not create a backup branch.
    #[arg(long)]
    pub skip_backup: bool,

    /// Regenerate messages even when they already score well.
    #[arg(long)]
    pub no_skip_well_formed: bool,

    /// Minimum score (0-10) for a message to count as well-formed.
    #[arg(
        long,
        default_value_t = DEFAULT_MIN_QUALITY_SCORE,
        value_parser = clap::value_parser!(u8).range(0..=10)
    )]
    pub min_quality_score: u8,

    /// Message template, e.g. "[JIRA-123] feat: message".
    #[arg(short, long)]
    pub template: Option<String>,

    /// Language code for generated messages.
    #[arg(short, long)]
    pub language: Option<String>,

    /// Custom instruction for the AI.
    #[arg(short, long)]
    pub prompt: Option<String>,

    /// Generate a message for staged changes and print it.
    #[arg(long)]
    pub staged: bool,

    /// Do not ask before sending diffs to a remote provider.
    #[arg(long)]
    pub skip_remote_consent: bool,

    /// Treat consent denial as fatal and never push after failures.
    #[arg(long)]
    pub strict: bool,

    /// Maximum number of concurrent AI requests.
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,

    /// Install the pre-commit and prepare-commit-msg hooks.
    #[arg(long)]
    pub install_hooks: bool,

    /// Force-push the rewritten branch.
    #[arg(long)]
    pub push: bool,

    /// Remote to push to.
    #[arg(long, default_value = DEFAULT_REMOTE)]
    pub remote: String,
}

impl Cli {
    /// Executes the CLI command.
    pub async fn execute(self) -> Result<()> {
        let repo = GitRepository::open()?;

        if self.install_hooks {
            let hooks_dir = repo.path().join("hooks");
            let results = hooks::install_hooks(&hooks_dir, chrono::Utc::now().timestamp())?;
            hooks::print_install_summary(&results);
            return Ok(());
        }

        let settings = Settings::load()?;
        let options = self.rewrite_options(&settings);
        let client = options.provider.create_client(&settings)?;
        let project_context = repo.workdir().and_then(find_commit_message_context);
        debug!(
            has_project_context = project_context.is_some(),
            "Resolved generation options"
        );

        let generator = MessageGenerator::new(
            client,
            RetryConfig::default(),
            GenerationOptions {
                template: options.template.clone(),
                language: options.language.clone(),
                custom_prompt: options.custom_prompt.clone(),
                project_context,
            },
        );
        let staged = options.staged;
        let rewriter = CommitRewriter::new(repo, generator, options);

        let stdin = io::stdin();
        let is_terminal = stdin.is_terminal();
        let mut reader = stdin.lock();
        let mut prompt_out = io::stderr();

        if staged {
            let message = rewriter
                .generate_for_staged(is_terminal, &mut reader, &mut prompt_out)
                .await?;
            print!("{message}");
            return Ok(());
        }

        if !self.dry_run {
            println!("🪄 Rewriting commit messages...");
        }
        let result = rewriter
            .run(is_terminal, &mut reader, &mut prompt_out)
            .await?;
        print!("{}", render_summary(&result));
        Ok(())
    }

    /// Combines flags with settings-file defaults.
    pub fn rewrite_options(&self, settings: &Settings) -> RewriteOptions {
        RewriteOptions {
            branch: self.branch.clone(),
            max_commits: self.max_commits,
            dry_run: self.dry_run,
            skip_backup: self.skip_backup,
            skip_well_formed: !self.no_skip_well_formed,
            min_quality_score: self.min_quality_score,
            template: self.template.clone().or_else(|| settings.template.clone()),
            language: self
                .language
                .clone()
                .or_else(|| settings.language.clone())
                .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
            custom_prompt: self.prompt.clone(),
            staged: self.staged,
            skip_remote_consent: self.skip_remote_consent,
            strict: self.strict,
            concurrency: self.concurrency,
            push: self.push,
            remote: self.remote.clone(),
            provider: ProviderSelection {
                provider: self.provider.clone().or_else(|| settings.provider.clone()),
                model: self.model.clone().or_else(|| settings.model.clone()),
                api_key_env: self.api_key_env.clone(),
                base_url: self.base_url.clone(),
            },
        }
    }
}

fn subject(message: &str) -> &str {
    message.trim().lines().next().unwrap_or("")
}

/// Formats the end-of-run report.
pub fn render_summary(result: &RewriteResult) -> String {
    let mut out = String::new();

    if !result.changes.is_empty() {
        let heading = if result.dry_run {
            "Proposed changes"
        } else {
            "Rewritten commits"
        };
        let _ = writeln!(out, "\n📝 {heading} on {}:", result.branch);
        for change in &result.changes {
            let _ = writeln!(
                out,
                "  {} -> {}",
                short_hash(change.original),
                short_hash(change.rewritten)
            );
            let _ = writeln!(out, "    - {}", subject(&change.old_message));
            let _ = writeln!(out, "    + {}", subject(&change.new_message));
        }
    }

    let _ = writeln!(out, "\n📊 Summary:");
    let _ = writeln!(out, "  Generated:      {}", result.generated);
    let _ = writeln!(out, "  Kept original:  {}", result.kept_original);
    let _ = writeln!(out, "  Failed:         {}", result.failed);

    if result.consent_denied {
        let _ = writeln!(out, "  ⚠ Consent denied; original messages kept");
    }

    if result.dry_run {
        let _ = writeln!(out, "\n🔍 Dry run: nothing was changed");
    } else if result.remap.changed_count() == 0 {
        let _ = writeln!(out, "\n✨ History already up to date");
    } else {
        let _ = writeln!(
            out,
            "\n✅ {} now points at {}",
            result.branch,
            short_hash(result.new_tip)
        );
        if let Some(backup) = &result.backup_ref {
            let name = backup.strip_prefix("refs/heads/").unwrap_or(backup);
            let _ = writeln!(out, "💾 Backup: {name}");
            let _ = writeln!(out, "   Restore with: git reset --hard {name}");
        }
        if result.pushed {
            let _ = writeln!(out, "🚀 Pushed {}", result.branch);
        }
    }

    out
}
