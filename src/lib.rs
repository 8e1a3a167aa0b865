//! # git-origin-rewrite
//!
//! A CLI tool to rewrite the `origin` remote URL of every Git repository
//! under a directory tree.
//!
//! This crate provides functionality to:
//! - Discover repositories, including worktrees and submodule checkouts
//!   whose `.git` is a file
//! - Compute a literal or regex find/replace on each origin URL
//! - Set the new URL and fetch to validate it
//! - Rewrite submodule URLs in `.gitmodules` and local config, then run
//!   `git submodule sync`
//!
//! ## Usage
//!
//! ```bash
//! # Interactive: pick repositories, then confirm
//! git-origin-rewrite ~/src --find github.com --replace gitlab.com
//!
//! # Batch mode with a regex and a backreference
//! git-origin-rewrite ~/src --find 'server-(\d+)' --replace 'host-\1' --regex --batch
//! ```
//!
//! ## Modules
//!
//! - [`cli`] - Command-line interface and main entry point
//! - [`discovery`] - Repository discovery (`fd`, falling back to a directory walk)
//! - [`rewrite`] - URL find/replace computation
//! - [`relink`] - Per-repository origin and submodule updates
//! - [`git`] - Git command wrappers
//! - [`prompt`] - User input abstractions
//! - [`banner`] - Plan summary banner
//! - [`error`] - Input error type

pub mod banner;
pub mod cli;
pub mod discovery;
pub mod error;
pub mod git;
pub mod prompt;
pub mod relink;
pub mod rewrite;
