//! Applying a [`RewriteSpec`] to repositories.
//!
//! Each repository goes through two independent steps: the `origin`
//! remote, then the submodule URLs listed in `.gitmodules`. A failure in
//! either step is printed and counted but never stops the batch.

use crate::git::{GitOps, REMOTE};
use crate::rewrite::RewriteSpec;

use console::style;
use std::path::{Path, PathBuf};

/// Why the origin of a repository was left alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// `git remote get-url origin` failed.
    NoOrigin,
    /// `find` does not occur in the URL.
    NoMatch,
    /// The substitution produced the same URL.
    Unchanged,
}

/// What happened to the `origin` remote of one repository.
///
/// Exactly one of these is recorded per repository, and it decides which
/// of the success, failed and skipped counters moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OriginOutcome {
    /// The new URL was set. `fetched` is false when the validating fetch
    /// failed; the URL change is kept either way.
    Updated { fetched: bool },
    /// Nothing was written; see [`SkipReason`].
    Skipped(SkipReason),
    /// `git remote set-url` failed.
    Failed,
}

/// Result of rewriting the submodule URLs of one repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmoduleOutcome {
    /// No `.gitmodules`, or no submodule URL needed rewriting.
    None,
    /// Every rewrite succeeded and `git submodule sync` ran.
    Synced { updated: usize },
    /// At least one step failed. `updated` counts keys written to both
    /// `.gitmodules` and the local config; `failed` counts failed writes
    /// plus a failed sync.
    PartialFailure { updated: usize, failed: usize },
}

/// Both halves of the work done on a single repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepoReport {
    pub origin: OriginOutcome,
    pub submodules: SubmoduleOutcome,
}

/// Running counters for a batch.
///
/// `success`, `failed` and `skipped` count origin outcomes, one per
/// repository. Submodule work is counted separately.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Tally {
    pub success: usize,
    pub failed: usize,
    pub skipped: usize,
    pub submodules_updated: usize,
    pub submodule_failures: usize,
}

impl Tally {
    /// Adds one repository's report to the counters.
    ///
    /// # Parameters
    /// - `report`: outcome of [`process_repository`] for a single repository.
    ///
    /// # Examples
    /// ```
    /// use git_origin_rewrite::relink::{OriginOutcome, RepoReport, SubmoduleOutcome, Tally};
    ///
    /// let mut tally = Tally::default();
    /// tally.record(&RepoReport {
    ///     origin: OriginOutcome::Updated { fetched: false },
    ///     submodules: SubmoduleOutcome::PartialFailure { updated: 1, failed: 2 },
    /// });
    /// assert_eq!(tally.success, 1);
    /// assert_eq!(tally.submodule_failures, 2);
    /// ```
    pub fn record(&mut self, report: &RepoReport) {
        match report.origin {
            OriginOutcome::Updated { .. } => self.success += 1,
            OriginOutcome::Skipped(_) => self.skipped += 1,
            OriginOutcome::Failed => self.failed += 1,
        }

        match report.submodules {
            SubmoduleOutcome::None => {}
            SubmoduleOutcome::Synced { updated } => self.submodules_updated += updated,
            SubmoduleOutcome::PartialFailure { updated, failed } => {
                self.submodules_updated += updated;
                self.submodule_failures += failed;
            }
        }
    }

    /// The origin counters as printed at the end of a run.
    pub fn summary_line(&self) -> String {
        format!(
            "Success: {}, Failed: {}, Skipped: {}",
            self.success, self.failed, self.skipped
        )
    }

    /// Only present when any submodule was touched.
    pub fn submodule_line(&self) -> Option<String> {
        if self.submodules_updated == 0 && self.submodule_failures == 0 {
            None
        } else {
            Some(format!(
                "Submodule URLs updated: {}, Submodule errors: {}",
                self.submodules_updated, self.submodule_failures
            ))
        }
    }
}

/// Processes `repos` in order and returns the accumulated counters.
pub fn process_all<G: GitOps>(git: &mut G, repos: &[PathBuf], spec: &RewriteSpec) -> Tally {
    let total = repos.len();
    let mut tally = Tally::default();

    for (i, repo) in repos.iter().enumerate() {
        println!(
            "\n{} {} {}",
            style(format!("[{}/{}]", i + 1, total)).dim(),
            style("repo:").blue().bold(),
            repo.display()
        );

        let report = process_repository(git, repo, spec);
        tracing::debug!(repo = %repo.display(), ?report, "processed repository");
        tally.record(&report);
    }

    tally
}

/// Rewrites the origin and then the submodule URLs of one repository.
pub fn process_repository<G: GitOps>(git: &mut G, repo: &Path, spec: &RewriteSpec) -> RepoReport {
    let origin = update_origin(git, repo, spec);
    let submodules = update_submodules(git, repo, spec);
    RepoReport { origin, submodules }
}

fn update_origin<G: GitOps>(git: &mut G, repo: &Path, spec: &RewriteSpec) -> OriginOutcome {
    let current = match git.origin_url(repo) {
        Ok(url) => url,
        Err(e) => {
            println!(
                "  {} no `{}` remote ({})",
                style("Skipping origin:").yellow(),
                REMOTE,
                e
            );
            return OriginOutcome::Skipped(SkipReason::NoOrigin);
        }
    };
    println!("  Current Origin: {}", current);

    if !spec.matches(&current) {
        let what = if spec.is_regex() { "Regex" } else { "Text" };
        println!(
            "  {} {} '{}' not found in URL.",
            style("Skipping:").yellow(),
            what,
            spec.find()
        );
        return OriginOutcome::Skipped(SkipReason::NoMatch);
    }

    let new_url = match spec.apply(&current) {
        Some(url) => url,
        None => {
            println!("  {} URL unchanged.", style("Skipping:").yellow());
            return OriginOutcome::Skipped(SkipReason::Unchanged);
        }
    };
    println!("  New Origin:     {}", new_url);

    if let Err(e) = git.set_origin_url(repo, &new_url) {
        println!("  {} {}", style("Failed to set origin:").red(), e);
        return OriginOutcome::Failed;
    }

    println!("  Fetching...");
    match git.fetch_origin(repo) {
        Ok(()) => {
            println!("  {}", style("Success!").green());
            OriginOutcome::Updated { fetched: true }
        }
        Err(e) => {
            println!("  {} {}", style("Fetch failed:").red(), e);
            println!(
                "  {}",
                style("The origin was changed, but fetch failed. Please check the URL.").red()
            );
            OriginOutcome::Updated { fetched: false }
        }
    }
}

fn update_submodules<G: GitOps>(git: &mut G, repo: &Path, spec: &RewriteSpec) -> SubmoduleOutcome {
    if !repo.join(".gitmodules").is_file() {
        return SubmoduleOutcome::None;
    }

    let entries = match git.submodule_urls(repo) {
        Ok(entries) => entries,
        Err(e) => {
            println!("  {} {}", style("Failed to read .gitmodules:").red(), e);
            return SubmoduleOutcome::PartialFailure {
                updated: 0,
                failed: 1,
            };
        }
    };

    let mut updated = 0;
    let mut failed = 0;
    let mut touched = false;

    for (key, url) in entries {
        let new_url = match spec.apply(&url) {
            Some(u) => u,
            None => {
                tracing::debug!(%key, %url, "submodule url left as is");
                continue;
            }
        };
        println!("  Submodule {}: {} -> {}", key, url, new_url);

        if let Err(e) = git.set_gitmodules_value(repo, &key, &new_url) {
            println!(
                "  {} {} ({})",
                style("Failed to update .gitmodules:").red(),
                key,
                e
            );
            failed += 1;
            continue;
        }
        touched = true;

        if let Err(e) = git.set_config_value(repo, &key, &new_url) {
            println!(
                "  {} {} ({})",
                style("Failed to update local config:").red(),
                key,
                e
            );
            failed += 1;
            continue;
        }
        updated += 1;
    }

    if touched {
        match git.submodule_sync(repo) {
            Ok(()) => println!("  {}", style("Submodules synced.").green()),
            Err(e) => {
                println!("  {} {}", style("Submodule sync failed:").red(), e);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        SubmoduleOutcome::PartialFailure { updated, failed }
    } else if updated > 0 {
        SubmoduleOutcome::Synced { updated }
    } else {
        SubmoduleOutcome::None
    }
}
