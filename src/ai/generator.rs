//! Commit message generation on top of an [`AiClient`].

use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use super::error::ProviderError;
use super::prompts::{build_prompt, PromptInput, MAX_DIFF_CHARS, SYSTEM_PROMPT};
use super::retry::{with_retry, RetryConfig};
use super::{AiClient, AiClientMetadata};
use crate::error::RewriteError;
use crate::git::object::normalize_message;
use crate::redaction::RedactedDiff;

/// Placeholder replaced by the generated subject in templates.
pub const MESSAGE_PLACEHOLDER: &str = "{message}";

/// Settings shared by every generation in a run.
#[derive(Debug, Clone, Default)]
pub struct GenerationOptions {
    /// Message template, e.g. `[JIRA-123] feat: message`.
    pub template: Option<String>,
    /// Target language code.
    pub language: String,
    /// Custom instruction replacing the default rules.
    pub custom_prompt: Option<String>,
    /// Project guidelines from `COMMIT_MESSAGE.md`.
    pub project_context: Option<String>,
}

/// Per-commit inputs besides the diff.
#[derive(Debug, Clone, Copy)]
pub struct GenerationContext<'a> {
    /// Paths touched by the commit.
    pub files: &'a [String],
    /// Existing message; empty for staged changes.
    pub old_message: &'a str,
}

/// Generates commit messages with retries and post-processing.
pub struct MessageGenerator {
    client: Box<dyn AiClient>,
    retry: RetryConfig,
    options: GenerationOptions,
}

impl MessageGenerator {
    /// Creates a generator using `client`.
    pub fn new(client: Box<dyn AiClient>, retry: RetryConfig, options: GenerationOptions) -> Self {
        Self {
            client,
            retry,
            options,
        }
    }

    /// Metadata of the underlying client.
    pub fn metadata(&self) -> AiClientMetadata {
        self.client.get_metadata()
    }

    /// Generates a message for one redacted diff.
    ///
    /// The result is cleaned, has the template applied and ends with a single
    /// newline.
    pub async fn generate(&self, diff: &RedactedDiff, context: &GenerationContext<'_>) -> Result<String> {
        let prompt = build_prompt(&PromptInput {
            diff,
            files: context.files,
            old_message: context.old_message,
            template: self.options.template.as_deref(),
            language: &self.options.language,
            custom_prompt: self.options.custom_prompt.as_deref(),
            project_context: self.options.project_context.as_deref(),
        });
        debug!(prompt_len = prompt.len(), files = context.files.len(), "Built generation prompt");

        let raw = with_retry(&self.retry, "generate commit message", || {
            self.client.send_request(SYSTEM_PROMPT, &prompt)
        })
        .await?;

        let cleaned = clean_response(&raw);
        if cleaned.is_empty() {
            return Err(ProviderError::InvalidResponse("Empty commit message".to_string()).into());
        }

        let message = match self.options.template.as_deref() {
            Some(template) => apply_template(&cleaned, template),
            None => cleaned,
        };
        Ok(normalize_message(&message))
    }
}

/// Strips code fences, surrounding quotes and whitespace from a response.
pub fn clean_response(raw: &str) -> String {
    let mut text = raw.trim();

    if let Some(rest) = text.strip_prefix("```") {
        // Drop an optional language tag on the opening fence.
        text = rest.split_once('\n').map_or("", |(_, body)| body);
        text = text.trim_end();
        text = text.strip_suffix("```").unwrap_or(text).trim();
    }

    for quote in ['"', '\'', '`'] {
        if text.len() >= 2 && text.starts_with(quote) && text.ends_with(quote) {
            text = text[1..text.len() - 1].trim();
        }
    }

    text.lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Returns the leading `[TAG]` of a template, if it has one.
fn leading_tag(template: &str) -> Option<&str> {
    let template = template.trim_start();
    if !template.starts_with('[') {
        return None;
    }
    template.find(']').map(|end| &template[..=end])
}

/// Applies a message template to generated text.
///
/// A template containing `{message}` has the placeholder replaced by the
/// generated subject line. Otherwise the template's leading `[TAG]`, if any,
/// is prepended to the subject when the model left it out.
pub fn apply_template(message: &str, template: &str) -> String {
    let (subject, body) = match message.split_once('\n') {
        Some((subject, body)) => (subject.trim(), Some(body)),
        None => (message.trim(), None),
    };

    let subject = if template.contains(MESSAGE_PLACEHOLDER) {
        let tag = leading_tag(template).unwrap_or("");
        let stripped = subject.strip_prefix(tag).map_or(subject, str::trim_start);
        template.replace(MESSAGE_PLACEHOLDER, stripped)
    } else {
        match leading_tag(template) {
            Some(tag) if !subject.starts_with(tag) => format!("{tag} {subject}"),
            _ => subject.to_string(),
        }
    };

    match body {
        Some(body) => format!("{subject}\n{body}"),
        None => subject,
    }
}

/// Outcome of the consent check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsentDecision {
    /// The provider runs locally.
    NotRequired,
    /// The user passed `--skip-remote-consent`.
    Skipped,
    /// The user agreed interactively.
    Granted,
}

/// One-time gate before diffs are sent to a remote provider.
#[derive(Debug, Clone, Copy)]
pub struct ConsentGate {
    required: bool,
    skip: bool,
}

impl ConsentGate {
    /// Creates a gate for a provider that does or does not need consent.
    pub fn new(required: bool, skip: bool) -> Self {
        Self { required, skip }
    }

    /// Asks for consent when needed.
    ///
    /// `is_terminal` and `reader` are injected so tests can drive the prompt
    /// without blocking on real stdin. A non-interactive stdin or a closed
    /// stream counts as denial.
    pub fn ensure(
        &self,
        metadata: &AiClientMetadata,
        is_terminal: bool,
        reader: &mut dyn BufRead,
        out: &mut dyn Write,
    ) -> Result<ConsentDecision> {
        if !self.required {
            return Ok(ConsentDecision::NotRequired);
        }
        if self.skip {
            info!(provider = %metadata.provider, "Remote consent skipped by flag");
            return Ok(ConsentDecision::Skipped);
        }
        if !is_terminal {
            warn!("stdin is not interactive, cannot ask for consent");
            return Err(RewriteError::ConsentDenied.into());
        }

        writeln!(out, "\nData privacy notice")?;
        writeln!(out, "This tool will send the following to {} ({}):", metadata.provider, metadata.model)?;
        writeln!(out, "  - the list of changed files")?;
        writeln!(out, "  - diff content (up to {MAX_DIFF_CHARS} characters per commit)")?;
        writeln!(out, "Sensitive files are hidden and secrets are redacted before sending.")?;
        write!(out, "Do you consent to sending this data? [y/N] ")?;
        out.flush().context("Failed to flush consent prompt")?;

        let mut input = String::new();
        let bytes = reader
            .read_line(&mut input)
            .context("Failed to read consent answer")?;
        if bytes == 0 {
            warn!("stdin closed while asking for consent");
            return Err(RewriteError::ConsentDenied.into());
        }

        match input.trim().to_lowercase().as_str() {
            "y" | "yes" => Ok(ConsentDecision::Granted),
            _ => Err(RewriteError::ConsentDenied.into()),
        }
    }
}
