//! Prompt templates and language support for commit message generation

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::redaction::RedactedDiff;

/// System prompt sent with every request.
pub const SYSTEM_PROMPT: &str =
    "You are a helpful assistant that generates clear, conventional git commit messages.";

/// Longest diff excerpt included in a prompt, in characters.
pub const MAX_DIFF_CHARS: usize = 8000;

/// Name of the optional project guideline file.
pub const CONTEXT_FILE_NAME: &str = "COMMIT_MESSAGE.md";

/// Supported language codes and their names.
pub const LANGUAGES: &[(&str, &str)] = &[
    ("en", "English"),
    ("es", "Spanish"),
    ("fr", "French"),
    ("de", "German"),
    ("it", "Italian"),
    ("pt", "Portuguese"),
    ("ru", "Russian"),
    ("ja", "Japanese"),
    ("ko", "Korean"),
    ("zh", "Chinese"),
    ("zh-cn", "Simplified Chinese"),
    ("zh-tw", "Traditional Chinese"),
    ("ar", "Arabic"),
    ("hi", "Hindi"),
    ("nl", "Dutch"),
    ("pl", "Polish"),
    ("tr", "Turkish"),
    ("sv", "Swedish"),
    ("da", "Danish"),
    ("no", "Norwegian"),
    ("fi", "Finnish"),
];

/// Conventional commit instructions used when no template is given.
const DEFAULT_FORMAT_INSTRUCTIONS: &str = "1. Follows the format: <type>(<scope>): <subject>
2. Types can be: feat, fix, docs, style, refactor, test, chore, perf, ci, build, revert
3. Scope is optional but recommended (e.g., auth, api, ui)
4. All should be in lowercase";

/// Resolves a language code to its name; unknown codes pass through.
pub fn language_name(code: &str) -> String {
    let lowered = code.to_lowercase();
    LANGUAGES
        .iter()
        .find(|(known, _)| *known == lowered)
        .map_or_else(|| code.to_string(), |(_, name)| (*name).to_string())
}

/// Returns the instruction that pins the output language.
pub fn language_instruction(code: &str) -> String {
    format!("Write the commit message in {}.", language_name(code))
}

/// A message template split around its first `:` or `-` separator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateParts {
    /// Fixed text before the separator, e.g. `[JIRA-123] feat`.
    pub prefix: String,
    /// The separator including surrounding whitespace.
    pub separator: String,
    /// Example text after the separator.
    pub example: String,
}

/// Splits a template like `[JIRA-123] feat: message` into its parts.
pub fn parse_template(template: &str) -> TemplateParts {
    for (idx, ch) in template.char_indices() {
        if ch != ':' && ch != '-' {
            continue;
        }
        let before = &template[..idx];
        let prefix = before.trim_end();
        let after = &template[idx + ch.len_utf8()..];
        let example = after.trim_start();
        let separator_start = prefix.len();
        let separator_end = template.len() - example.len();
        return TemplateParts {
            prefix: prefix.to_string(),
            separator: template[separator_start..separator_end].to_string(),
            example: example.to_string(),
        };
    }

    TemplateParts {
        prefix: String::new(),
        separator: ": ".to_string(),
        example: template.to_string(),
    }
}

/// Inputs for one generation prompt.
#[derive(Debug, Clone, Copy)]
pub struct PromptInput<'a> {
    /// Redacted diff of the change.
    pub diff: &'a RedactedDiff,
    /// Paths touched by the change.
    pub files: &'a [String],
    /// Existing message; empty for staged changes.
    pub old_message: &'a str,
    /// Optional message template.
    pub template: Option<&'a str>,
    /// Target language code.
    pub language: &'a str,
    /// Optional custom instruction replacing the default rules.
    pub custom_prompt: Option<&'a str>,
    /// Optional project guidelines.
    pub project_context: Option<&'a str>,
}

/// Truncates `text` to at most `max_chars` characters.
fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Builds the user prompt for one commit.
pub fn build_prompt(input: &PromptInput<'_>) -> String {
    let diff = truncate_chars(input.diff.as_str(), MAX_DIFF_CHARS);
    let files = if input.files.is_empty() {
        "(no files)".to_string()
    } else {
        input.files.join("\n")
    };
    let context_section = input
        .project_context
        .map(|context| format!("Project-specific guidelines:\n{context}\n\n"))
        .unwrap_or_default();
    let language_instruction = language_instruction(input.language);
    let old_message = input.old_message.trim();

    if let Some(custom) = input.custom_prompt {
        let format_line = input
            .template
            .map(|template| format!("Format: {template}"))
            .unwrap_or_default();
        return format!(
            "You are a git commit message generator. Analyze the following git diff and file changes, then {custom}

{context_section}Old commit message: \"{old_message}\"

Files changed:
{files}

Git diff (truncated if too long, sensitive data redacted):
{diff}

{format_line}
{language_instruction}

Return ONLY the commit message, nothing else."
        );
    }

    let format_instructions = match input.template {
        Some(template) if !parse_template(template).prefix.is_empty() => format!(
            "Follow this EXACT format: {template}
Where the message part should describe what was changed.
Example: If template is \"(feat): message\", generate something like \"(feat): add user authentication\"
Example: If template is \"[JIRA-XXX] type: message\", generate something like \"[JIRA-123] fix: resolve null pointer exception\""
        ),
        Some(template) => format!("Use this format as a guide: {template}"),
        None => DEFAULT_FORMAT_INSTRUCTIONS.to_string(),
    };

    format!(
        "You are a git commit message generator. Analyze the following git diff and file changes, then generate a clear, concise commit message.

{context_section}Old commit message: \"{old_message}\"

Files changed:
{files}

Git diff (truncated if too long, sensitive data redacted):
{diff}

Generate a commit message that:
{format_instructions}
4. Subject should be clear and descriptive
5. Be concise but informative
6. Focus on WHAT was changed and WHY, not HOW
7. Use present tense (\"add\" not \"added\")
8. Don't end with a period
9. Maximum 72 characters for the first line
10. Lowercase the first letter
11. {language_instruction}

Return ONLY the commit message, nothing else. No explanations, just the message."
    )
}

/// Reads `COMMIT_MESSAGE.md` from the repository root, `.git/` or `.github/`.
pub fn find_commit_message_context(repo_root: &Path) -> Option<String> {
    [
        repo_root.join(CONTEXT_FILE_NAME),
        repo_root.join(".git").join(CONTEXT_FILE_NAME),
        repo_root.join(".github").join(CONTEXT_FILE_NAME),
    ]
    .into_iter()
    .find_map(|path| {
        let content = fs::read_to_string(&path).ok()?;
        debug!(path = %path.display(), "Loaded commit message guidelines");
        Some(content.trim().to_string())
    })
    .filter(|content| !content.is_empty())
}
