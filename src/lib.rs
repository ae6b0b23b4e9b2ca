//! # git-rewrite-commits
//!
//! Rewrites git commit messages with AI-generated conventional commits
//! while preserving trees, authors and dates.
//!
//! ## Features
//!
//! - Quality scoring that leaves well-formed messages alone
//! - Secret redaction before any diff leaves the machine
//! - Deterministic history rebuild with a backup reference
//! - Opt-in git hooks for staged changes
//!
//! ## Quick Start
//!
//! ```rust
//! use git_rewrite_commits::quality::score_message;
//!
//! let score = score_message("feat(auth): add login endpoint");
//! assert!(score.is_well_formed(7));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod ai;
pub mod cli;
pub mod error;
pub mod git;
pub mod quality;
pub mod redaction;
pub mod rewriter;
pub mod utils;

pub use crate::cli::Cli;
pub use crate::error::RewriteError;

/// The current version of git-rewrite-commits.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
