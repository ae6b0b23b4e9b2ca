//! Commit message quality scoring.
//!
//! Scores are pure functions of the message text: no repository access and
//! no network, so the same message always yields the same score.

use std::sync::LazyLock;

use regex::Regex;

/// Default minimum score for a message to count as well-formed.
pub const DEFAULT_MIN_QUALITY_SCORE: u8 = 7;

/// Highest possible score.
pub const MAX_SCORE: u8 = 10;

/// Conventional commit types accepted by the scorer.
pub const CONVENTIONAL_TYPES: &[&str] = &[
    "feat", "fix", "docs", "style", "refactor", "test", "chore", "perf", "ci", "build", "revert",
];

/// Messages that say nothing about the change when used on their own.
const GENERIC_MESSAGES: &[&str] = &[
    "update", "fix", "change", "modify", "commit", "initial", "test", "wip", "tmp", "temp", "misc",
];

const MIN_SUBJECT_LEN: usize = 10;
const MAX_SUBJECT_LEN: usize = 72;

/// Result of scoring a commit message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualityScore {
    /// Score in `0..=10`.
    pub score: u8,
    /// Human-readable reasons that contributed to the score.
    pub reasons: Vec<&'static str>,
}

impl QualityScore {
    /// Returns true when the score reaches `threshold`.
    pub fn is_well_formed(&self, threshold: u8) -> bool {
        self.score >= threshold
    }

    /// Joins the reasons into a single line.
    pub fn reason(&self) -> String {
        if self.reasons.is_empty() {
            "no specific issues".to_string()
        } else {
            self.reasons.join(", ")
        }
    }
}

#[allow(clippy::unwrap_used)] // Pattern built from constant type list
static CONVENTIONAL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^({})(\([^)]+\))?: .+", CONVENTIONAL_TYPES.join("|"))).unwrap()
});

#[allow(clippy::unwrap_used)] // Pattern built from constant type list
static IMPERATIVE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^({})?(\([^)]+\))?: [a-z]", CONVENTIONAL_TYPES.join("|"))).unwrap()
});

/// Scores a commit message from 0 to 10.
pub fn score_message(message: &str) -> QualityScore {
    let message = message.trim();
    let subject = message.lines().next().unwrap_or("");
    let mut score = 0;
    let mut reasons = Vec::new();

    if CONVENTIONAL_PATTERN.is_match(subject) {
        score += 4;
        reasons.push("follows conventional format");
    }

    let subject_len = subject.chars().count();
    if (MIN_SUBJECT_LEN..=MAX_SUBJECT_LEN).contains(&subject_len) {
        score += 2;
        reasons.push("appropriate length");
    } else if subject_len < MIN_SUBJECT_LEN {
        reasons.push("too short");
    } else {
        reasons.push("too long");
    }

    if is_generic(message) {
        reasons.push("too generic");
    } else {
        score += 2;
        reasons.push("descriptive");
    }

    if IMPERATIVE_PATTERN.is_match(subject) {
        score += 1;
        reasons.push("uses present tense");
    }

    if !subject.ends_with('.') {
        score += 1;
        reasons.push("no trailing period");
    }

    QualityScore { score, reasons }
}

/// Returns true when the message meets `threshold`.
pub fn is_well_formed(message: &str, threshold: u8) -> bool {
    score_message(message).is_well_formed(threshold)
}

fn is_generic(message: &str) -> bool {
    let lowered = message.to_lowercase();
    let lowered = lowered.trim_matches('.');
    GENERIC_MESSAGES.iter().any(|generic| {
        lowered == *generic
            || lowered
                .strip_suffix(" commit")
                .is_some_and(|head| head == *generic)
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn conventional_message_scores_high() {
        let result = score_message("feat: add new feature");
        assert!(result.score >= 7);
        assert!(result.is_well_formed(DEFAULT_MIN_QUALITY_SCORE));
        assert!(result.reason().contains("follows conventional format"));
    }

    #[test]
    fn full_marks() {
        assert_eq!(score_message("feat(auth): add login endpoint").score, MAX_SCORE);
    }

    #[test]
    fn generic_message_scores_low() {
        let result = score_message("update");
        assert!(result.score < 7);
        assert!(result.reason().contains("too generic"));
    }

    #[test]
    fn placeholder_messages() {
        assert_eq!(score_message("fix").score, 1);
        assert_eq!(score_message("wip").score, 1);
        assert!(score_message("misc.").reasons.contains(&"too generic"));
        assert!(score_message("Initial commit").reasons.contains(&"too generic"));
    }

    #[test]
    fn too_short_subject() {
        let result = score_message("fix: a");
        assert!(result.reasons.contains(&"too short"));
    }

    #[test]
    fn too_long_subject() {
        let subject = format!("feat: {}", "a".repeat(80));
        assert!(score_message(&subject).reasons.contains(&"too long"));
    }

    #[test]
    fn trailing_period_costs_a_point() {
        let with = score_message("feat: add login.").score;
        let without = score_message("feat: add login").score;
        assert_eq!(without, with + 1);
    }

    #[test]
    fn capitalized_description_is_not_imperative() {
        let result = score_message("feat: Add login page");
        assert!(!result.reasons.contains(&"uses present tense"));
    }

    #[test]
    fn only_subject_is_checked_for_format() {
        let result = score_message("feat: add login\n\nLonger body text.");
        assert_eq!(result.score, MAX_SCORE);
    }

    #[test]
    fn well_formed_threshold() {
        assert!(is_well_formed("feat: implementation of something", 7));
        assert!(!is_well_formed("wip", 7));
        assert!(is_well_formed("wip", 0));
    }

    mod prop {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn score_is_deterministic(s in ".*") {
                prop_assert_eq!(score_message(&s), score_message(&s));
            }

            #[test]
            fn score_is_bounded(s in ".*") {
                prop_assert!(score_message(&s).score <= MAX_SCORE);
            }
        }
    }
}
