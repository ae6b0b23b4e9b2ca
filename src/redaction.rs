//! Sensitive data redaction for diffs before they are sent to an AI provider.
//!
//! Redaction runs in two layers. Whole files whose names look sensitive
//! (`.env`, key material, credential stores) have their body replaced by a
//! single placeholder line while the `diff --git` header stays. Everything
//! else is scanned with an ordered list of secret-shaped patterns, and each
//! match is replaced with a fixed `[REDACTED_*]` placeholder.
//!
//! None of the placeholders match any pattern, so redaction is idempotent.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use tracing::debug;

use crate::error::RewriteError;

/// Placeholder that replaces the body of `.env` style files.
pub const ENV_FILE_PLACEHOLDER: &str = "[.ENV FILE CONTENT COMPLETELY HIDDEN FOR SECURITY]";

/// Placeholder that replaces the body of other sensitive files.
pub const SENSITIVE_FILE_PLACEHOLDER: &str = "[SENSITIVE FILE CONTENT HIDDEN FOR SECURITY]";

const DIFF_HEADER: &str = "diff --git ";

/// Diff text that has been through [`redact_diff`].
///
/// This is the only diff type the AI layer accepts, so a diff cannot reach a
/// provider without having been redacted first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedactedDiff(String);

impl RedactedDiff {
    /// Returns the redacted text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true when the redacted diff has no content.
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

/// How a pattern match is rewritten.
enum Replacement {
    /// Replace the whole match with a fixed placeholder.
    Placeholder(&'static str),
    /// Replacement template that may reference capture groups.
    Template(&'static str),
    /// Replace a multi-line block, keeping the number of lines.
    Block(&'static str),
}

/// A compiled secret pattern.
struct SecretPattern {
    name: &'static str,
    regex: Regex,
    replacement: Replacement,
}

#[allow(clippy::unwrap_used)] // Compile-time constant regex patterns
static SECRET_PATTERNS: LazyLock<Vec<SecretPattern>> = LazyLock::new(|| {
    let specs: [(&'static str, &'static str, Replacement); 12] = [
        (
            "deepseek key",
            r"sk-[a-f0-9]{48,}",
            Replacement::Placeholder("[REDACTED_DEEPSEEK_KEY]"),
        ),
        (
            "openai key",
            r"sk-[a-zA-Z0-9]{32,}|sk_[a-zA-Z0-9_-]{32,}",
            Replacement::Placeholder("[REDACTED_OPENAI_KEY]"),
        ),
        (
            "github token",
            r"gh[pso]_[a-zA-Z0-9]{36,}",
            Replacement::Placeholder("[REDACTED_GITHUB_TOKEN]"),
        ),
        (
            "slack token",
            r"xox[pboa]-[a-zA-Z0-9-]{10,}",
            Replacement::Placeholder("[REDACTED_SLACK_TOKEN]"),
        ),
        (
            "aws access key",
            r"AKIA[0-9A-Z]{16}",
            Replacement::Placeholder("[REDACTED_AWS_ACCESS_KEY]"),
        ),
        (
            "aws secret key",
            r#"(?i)(aws_secret_access_key)(\s*[=:]\s*)['"]?[A-Za-z0-9/+=]{40}['"]?"#,
            Replacement::Template("${1}${2}[REDACTED_AWS_SECRET]"),
        ),
        (
            "stripe key",
            r"(?:sk|pk)_(?:live|test)_[a-zA-Z0-9]{24,}",
            Replacement::Placeholder("[REDACTED_STRIPE_KEY]"),
        ),
        (
            "private key",
            r"-----BEGIN (?:(?:RSA|DSA|EC|OPENSSH) )?PRIVATE KEY-----[\s\S]*?-----END (?:(?:RSA|DSA|EC|OPENSSH) )?PRIVATE KEY-----",
            Replacement::Block("[REDACTED_PRIVATE_KEY]"),
        ),
        (
            "jwt",
            r"eyJ[a-zA-Z0-9_-]+\.eyJ[a-zA-Z0-9_-]+\.[a-zA-Z0-9_-]+",
            Replacement::Placeholder("[REDACTED_JWT_TOKEN]"),
        ),
        (
            "password assignment",
            r#"(?i)(password|passwd|pwd|secret|api_key|apikey|auth_token|access_token|private_key)\s*[=:]\s*['"][^'"]{8,}['"]"#,
            Replacement::Template("${1}=[REDACTED]"),
        ),
        (
            "connection string",
            r"(?i)(mongodb(?:\+srv)?|postgres(?:ql)?|mysql|redis)://[^@\s]+@\S+",
            Replacement::Template("${1}://[REDACTED_CONNECTION_STRING]"),
        ),
        (
            "bearer token",
            r"(?i)bearer\s+[a-zA-Z0-9_.\-]+",
            Replacement::Placeholder("Bearer [REDACTED_TOKEN]"),
        ),
    ];

    specs
        .into_iter()
        .map(|(name, pattern, replacement)| SecretPattern {
            name,
            regex: Regex::new(pattern).unwrap(),
            replacement,
        })
        .collect()
});

/// Sensitive file name patterns and whether they are `.env` style files.
#[allow(clippy::unwrap_used)] // Compile-time constant regex patterns
static SENSITIVE_FILE_PATTERNS: LazyLock<Vec<(Regex, bool)>> = LazyLock::new(|| {
    [
        (r"(?i)\.env(\.[a-z0-9_-]+)?$", true),
        (r"(?i)\.pem$", false),
        (r"(?i)\.key$", false),
        (r"(?i)\.p12$", false),
        (r"(?i)\.pfx$", false),
        (r"(?i)id_rsa", false),
        (r"(?i)credentials", false),
        (r"(?i)secrets?\.(json|ya?ml|toml|ini)$", false),
    ]
    .into_iter()
    .map(|(pattern, is_env)| (Regex::new(pattern).unwrap(), is_env))
    .collect()
});

/// Returns the placeholder for a `diff --git` header naming a sensitive file.
fn sensitive_file_placeholder(header: &str) -> Option<&'static str> {
    let paths = header
        .trim_end()
        .split_whitespace()
        .skip(2)
        .map(|token| {
            token
                .strip_prefix("a/")
                .or_else(|| token.strip_prefix("b/"))
                .unwrap_or(token)
        });

    let mut placeholder = None;
    for path in paths {
        for (regex, is_env) in SENSITIVE_FILE_PATTERNS.iter() {
            if regex.is_match(path) {
                if *is_env {
                    return Some(ENV_FILE_PLACEHOLDER);
                }
                placeholder = Some(SENSITIVE_FILE_PLACEHOLDER);
            }
        }
    }
    placeholder
}

/// Replaces the bodies of sensitive files, keeping their headers.
fn hide_sensitive_files(text: &str) -> String {
    let mut output = String::with_capacity(text.len());
    let mut hiding = false;

    for line in text.split_inclusive('\n') {
        if line.starts_with(DIFF_HEADER) {
            output.push_str(line);
            if !line.ends_with('\n') {
                output.push('\n');
            }
            hiding = match sensitive_file_placeholder(line) {
                Some(placeholder) => {
                    output.push_str(placeholder);
                    output.push('\n');
                    true
                }
                None => false,
            };
        } else if !hiding {
            output.push_str(line);
        }
    }

    output
}

/// Collapses a multi-line match into a placeholder followed by one marker
/// line per removed line, so diff line numbering stays intact.
fn replace_block(placeholder: &str, matched: &str) -> String {
    let mut replaced = placeholder.to_string();
    for line in matched.split('\n').skip(1) {
        replaced.push('\n');
        if let Some(marker @ ('+' | '-' | ' ')) = line.chars().next() {
            replaced.push(marker);
        }
    }
    replaced
}

/// Redacts sensitive content from `text`.
pub fn redact(text: &str) -> String {
    let mut redacted = hide_sensitive_files(text);

    for pattern in SECRET_PATTERNS.iter() {
        let replaced = match pattern.replacement {
            Replacement::Placeholder(placeholder) => {
                pattern.regex.replace_all(&redacted, placeholder)
            }
            Replacement::Template(template) => pattern.regex.replace_all(&redacted, template),
            Replacement::Block(placeholder) => pattern
                .regex
                .replace_all(&redacted, |caps: &Captures<'_>| {
                    replace_block(placeholder, &caps[0])
                }),
        };
        if let std::borrow::Cow::Owned(replaced) = replaced {
            debug!(pattern = pattern.name, "Redacted sensitive content");
            redacted = replaced;
        }
    }

    redacted
}

/// Returns the name of the first secret pattern that matches `text`.
pub fn find_secret(text: &str) -> Option<&'static str> {
    SECRET_PATTERNS
        .iter()
        .find(|pattern| pattern.regex.is_match(text))
        .map(|pattern| pattern.name)
}

/// Redacts a diff and checks that no secret pattern survived.
pub fn redact_diff(diff: &str) -> Result<RedactedDiff, RewriteError> {
    let redacted = redact(diff);
    if let Some(pattern) = find_secret(&redacted) {
        return Err(RewriteError::RedactionInvariantViolation { pattern });
    }
    Ok(RedactedDiff(redacted))
}
