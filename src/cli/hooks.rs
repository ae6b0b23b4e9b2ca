//! Installation of the opt-in git hooks.
//!
//! Both hooks do nothing unless enabled through `git config`:
//! `hooks.preCommitPreview` for the preview and `hooks.prepareCommitMsg` for
//! automatic message generation.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

/// Text identifying hooks written by this tool.
pub const HOOK_MARKER: &str = "git-rewrite-commits";

const PRE_COMMIT: &str = r#"#!/bin/sh
# git-rewrite-commits pre-commit hook
# Preview the AI-generated commit message before committing.

if [ "$(git config --get hooks.preCommitPreview)" != "true" ]; then
    exit 0
fi

PROVIDER=$(git config --get hooks.commitProvider)
PROVIDER=${PROVIDER:-openai}

echo ""
echo "AI commit message preview:"
echo "=========================="
git-rewrite-commits --staged --provider "$PROVIDER" --skip-remote-consent || true
echo "=========================="
echo ""
"#;

const PREPARE_COMMIT_MSG: &str = r#"#!/bin/sh
# git-rewrite-commits prepare-commit-msg hook
# Generate the commit message automatically.

COMMIT_MSG_FILE=$1
COMMIT_SOURCE=$2

if [ "$(git config --get hooks.prepareCommitMsg)" != "true" ]; then
    exit 0
fi

# Keep messages given with -m, merges and squashes.
case "$COMMIT_SOURCE" in
    message|merge|squash|commit)
        exit 0
        ;;
esac

PROVIDER=$(git config --get hooks.commitProvider)
PROVIDER=${PROVIDER:-openai}
LANGUAGE=$(git config --get hooks.commitLanguage)
LANGUAGE=${LANGUAGE:-en}
TEMPLATE=$(git config --get hooks.commitTemplate)

if [ -n "$TEMPLATE" ]; then
    MESSAGE=$(git-rewrite-commits --staged --provider "$PROVIDER" --language "$LANGUAGE" --template "$TEMPLATE" --skip-remote-consent) || exit 0
else
    MESSAGE=$(git-rewrite-commits --staged --provider "$PROVIDER" --language "$LANGUAGE" --skip-remote-consent) || exit 0
fi

if [ -n "$MESSAGE" ]; then
    printf '%s\n' "$MESSAGE" > "$COMMIT_MSG_FILE"
fi
"#;

/// Hooks installed by [`install_hooks`], with a short description.
pub const HOOKS: &[(&str, &str)] = &[
    ("pre-commit", "Preview AI message before committing"),
    ("prepare-commit-msg", "Generate AI message automatically"),
];

/// What happened to one hook file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookOutcome {
    /// No hook existed before.
    Installed,
    /// One of our hooks was refreshed.
    Updated,
    /// A foreign hook was moved aside first.
    Replaced {
        /// Where the previous hook was copied.
        backup: PathBuf,
    },
}

/// Result for one hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookInstall {
    /// Hook file name.
    pub name: &'static str,
    /// What happened.
    pub outcome: HookOutcome,
}

fn script_for(name: &str) -> &'static str {
    if name == "pre-commit" {
        PRE_COMMIT
    } else {
        PREPARE_COMMIT_MSG
    }
}

/// Writes both hooks into `hooks_dir`.
///
/// Existing hooks that were not written by this tool are copied to
/// `<name>.backup-<timestamp>` first.
pub fn install_hooks(hooks_dir: &Path, timestamp: i64) -> Result<Vec<HookInstall>> {
    fs::create_dir_all(hooks_dir)
        .with_context(|| format!("Failed to create hooks directory: {}", hooks_dir.display()))?;

    let mut results = Vec::with_capacity(HOOKS.len());
    for &(name, _) in HOOKS {
        let path = hooks_dir.join(name);
        let outcome = if path.exists() {
            let existing = fs::read_to_string(&path).unwrap_or_default();
            if existing.contains(HOOK_MARKER) {
                HookOutcome::Updated
            } else {
                let backup = hooks_dir.join(format!("{name}.backup-{timestamp}"));
                fs::copy(&path, &backup).with_context(|| {
                    format!("Failed to back up existing hook: {}", path.display())
                })?;
                HookOutcome::Replaced { backup }
            }
        } else {
            HookOutcome::Installed
        };

        fs::write(&path, script_for(name))
            .with_context(|| format!("Failed to write hook: {}", path.display()))?;
        make_executable(&path)?;
        info!(hook = name, outcome = ?outcome, "Installed hook");

        results.push(HookInstall { name, outcome });
    }

    Ok(results)
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut permissions = fs::metadata(path)
        .with_context(|| format!("Failed to read hook permissions: {}", path.display()))?
        .permissions();
    permissions.set_mode(permissions.mode() | 0o755);
    fs::set_permissions(path, permissions)
        .with_context(|| format!("Failed to make hook executable: {}", path.display()))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}

/// Prints what happened and how to enable the hooks.
pub fn print_install_summary(results: &[HookInstall]) {
    println!("🎯 Installing AI commit message hooks\n");
    for result in results {
        let description = HOOKS
            .iter()
            .find(|(name, _)| *name == result.name)
            .map_or("", |&(_, description)| description);
        match &result.outcome {
            HookOutcome::Installed => println!("  ✓ {} - installed ({description})", result.name),
            HookOutcome::Updated => println!("  ↻ {} - updated ({description})", result.name),
            HookOutcome::Replaced { backup } => println!(
                "  ⚠ {} - installed, previous hook backed up to {}",
                result.name,
                backup.display()
            ),
        }
    }

    println!("\nHooks are opt-in. Enable the ones you want:");
    println!("   git config hooks.preCommitPreview true    # preview before commit");
    println!("   git config hooks.prepareCommitMsg true    # generate automatically");
    println!("\nOptional settings:");
    println!("   git config hooks.commitProvider deepseek");
    println!("   git config hooks.commitTemplate \"type(scope): message\"");
    println!("   git config hooks.commitLanguage en");
}
