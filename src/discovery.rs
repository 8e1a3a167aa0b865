//! Locating repositories under a directory tree.
//!
//! A repository root is any directory holding a `.git` entry. The entry
//! may be a directory (regular clone) or a file (linked worktree or
//! submodule checkout). `fd` is used when it is installed; otherwise the
//! tree is walked directly.

use std::collections::BTreeSet;
use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};
use std::process::{Command, Stdio};

use walkdir::WalkDir;

/// Names under which the `fd` search tool is installed, in lookup order.
pub const SEARCH_TOOLS: [&str; 2] = ["fd", "fdfind"];

const GIT_MARKER: &str = ".git";

/// Finds every repository root under `root`.
///
/// The result is absolute, canonical where possible, deduplicated, and
/// sorted.
pub fn find_repositories(root: &Path) -> Vec<PathBuf> {
    let tool = SEARCH_TOOLS.iter().find_map(|name| which::which(name).ok());
    find_repositories_with(root, tool.as_deref())
}

/// Like [`find_repositories`], with an explicit search tool.
///
/// `None`, a tool that cannot be spawned, or one that exits non-zero all
/// fall back to [`walk_for_repositories`].
pub fn find_repositories_with(root: &Path, tool: Option<&Path>) -> Vec<PathBuf> {
    let candidates = match tool.and_then(|t| search_with_tool(t, root)) {
        Some(found) => found,
        None => {
            tracing::debug!(root = %root.display(), "walking directory tree");
            walk_for_repositories(root)
        }
    };

    normalize(candidates)
}

/// Runs `<tool> -H -I "^.git$" <root>` and maps each hit to its parent.
///
/// Returns `None` when the tool is unusable.
fn search_with_tool(tool: &Path, root: &Path) -> Option<Vec<PathBuf>> {
    let mut cmd = Command::new(tool);
    cmd.args(["-H", "-I", "^.git$"]).arg(root);
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    tracing::debug!(cmd = ?cmd, "running");

    match cmd.output() {
        Ok(out) if out.status.success() => {
            Some(repos_from_listing(&String::from_utf8_lossy(&out.stdout)))
        }
        Ok(out) => {
            tracing::debug!(
                status = %out.status,
                stderr = %String::from_utf8_lossy(&out.stderr).trim(),
                "search tool failed, falling back"
            );
            None
        }
        Err(e) => {
            tracing::debug!(error = %e, "search tool unavailable, falling back");
            None
        }
    }
}

/// Maps newline-separated `.git` paths to their parent directories.
///
/// `fd` prints directories with a trailing separator, and its `^.git$`
/// pattern also matches names such as `_git`, so only entries literally
/// named `.git` are kept.
pub(crate) fn repos_from_listing(listing: &str) -> Vec<PathBuf> {
    listing
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(Path::new)
        .filter(|path| path.file_name() == Some(OsStr::new(GIT_MARKER)))
        .filter_map(|path| path.parent().map(Path::to_path_buf))
        .collect()
}

/// Recursively walks `root` for directories holding a `.git` entry.
///
/// `.git` directories are never entered and symlinks are not followed.
/// Unreadable entries are logged and skipped.
pub fn walk_for_repositories(root: &Path) -> Vec<PathBuf> {
    let mut repos = Vec::new();

    for entry in WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| e.file_name() != GIT_MARKER)
    {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!("Error walking directory: {}", e);
                continue;
            }
        };

        if !entry.file_type().is_dir() {
            continue;
        }

        let marker = entry.path().join(GIT_MARKER);
        if marker.is_dir() || marker.is_file() {
            repos.push(entry.into_path());
        }
    }

    repos
}

/// Resolves candidates to absolute paths, drops any that sit inside a
/// `.git` directory, and deduplicates.
fn normalize(candidates: Vec<PathBuf>) -> Vec<PathBuf> {
    let unique: BTreeSet<PathBuf> = candidates
        .into_iter()
        .map(|p| match p.canonicalize() {
            Ok(resolved) => resolved,
            Err(_) => std::path::absolute(&p).unwrap_or(p),
        })
        .filter(|p| !inside_git_dir(p))
        .collect();

    unique.into_iter().collect()
}

fn inside_git_dir(path: &Path) -> bool {
    path.components()
        .any(|c| c == Component::Normal(OsStr::new(GIT_MARKER)))
}
