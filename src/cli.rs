use crate::{
    banner::print_banner,
    discovery,
    error::InputError,
    git::{GitCli, GitOps},
    prompt::{self, ConfirmPrompter, DialoguerPrompter, SelectPrompter, StringPrompter},
    relink::{self, Tally},
    rewrite::{MatchMode, RewriteSpec},
};

use clap::Parser;
use console::style;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Scans for git repositories in PATH and updates their origin URL.
///
/// Submodule URLs listed in each repository's .gitmodules are rewritten
/// the same way and resynced.
#[derive(Debug, Clone, Parser)]
#[command(name = "git-origin-rewrite", version)]
#[command(after_help = "\
Examples of regex usage:
  --find \"github\\.com\" --replace \"gitlab.com\" --regex
  --find \"server-(\\d+)\" --replace \"host-\\1\" --regex")]
pub struct Args {
    /// Target directory to scan for git repositories
    pub path: PathBuf,

    /// String to find in the origin URL
    #[arg(long)]
    pub find: Option<String>,

    /// String to replace with
    #[arg(long)]
    pub replace: Option<String>,

    /// Enable regex matching. Supports backreferences (e.g. \1) in the replace string
    #[arg(short, long)]
    pub regex: bool,

    /// Run in batch mode without interactive prompts
    #[arg(short, long)]
    pub batch: bool,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

/// How a run ended when no input error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    NothingFound,
    NothingSelected,
    Cancelled,
    Completed(Tally),
}

/// Installs the stderr `tracing` subscriber. `RUST_LOG` overrides the
/// level chosen by `--verbose`.
fn init_logging(verbose: bool) {
    let default = if verbose {
        "git_origin_rewrite=debug"
    } else {
        "git_origin_rewrite=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    // A second init (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Runs discovery, selection, prompting and rewriting for `args`.
///
/// Prompts are only shown when `args.batch` is false. Every repository
/// level failure is reported and counted in the returned [`Tally`]; only
/// input problems are returned as errors.
///
/// # Errors
///
/// * [`InputError::PathNotFound`] if `args.path` does not exist.
/// * [`InputError::EmptyFind`] if the find text is missing in batch mode or
///   blank after trimming.
/// * [`InputError::MissingReplace`] if `--replace` is missing in batch mode.
/// * [`InputError::InvalidRegex`] if `--regex` is set and the pattern does
///   not compile.
/// * [`InputError::Prompt`] if the terminal prompt fails.
pub fn run<P, G>(args: &Args, prompter: &mut P, git: &mut G) -> Result<RunOutcome, InputError>
where
    P: StringPrompter + SelectPrompter + ConfirmPrompter,
    G: GitOps,
{
    if !args.path.exists() {
        return Err(InputError::PathNotFound(args.path.clone()));
    }

    let find = args.find.as_deref().map(|s| s.trim().to_string());
    let replace = args.replace.as_deref().map(|s| s.trim().to_string());

    println!(
        "{}",
        style(format!("Scanning {}...", args.path.display())).green()
    );
    let repos = discovery::find_repositories(&args.path);
    if repos.is_empty() {
        println!("{}", style("No git repositories found.").yellow());
        return Ok(RunOutcome::NothingFound);
    }
    println!("Found {} repositories.", repos.len());

    let selected = if args.batch {
        repos
    } else {
        match prompt::choose_repositories(prompter, &repos).map_err(InputError::Prompt)? {
            Some(picked) => picked,
            None => {
                println!("Operation cancelled.");
                return Ok(RunOutcome::Cancelled);
            }
        }
    };

    if selected.is_empty() {
        println!("No repositories selected.");
        return Ok(RunOutcome::NothingSelected);
    }

    let find = match find {
        Some(f) => f,
        None if args.batch => return Err(InputError::EmptyFind),
        None => prompt::ask_find(prompter).map_err(InputError::Prompt)?,
    };
    let replace = match replace {
        Some(r) => r,
        None if args.batch => return Err(InputError::MissingReplace),
        None => prompt::ask_replace(prompter).map_err(InputError::Prompt)?,
    };

    let spec = RewriteSpec::new(&find, &replace, MatchMode::from_flag(args.regex))?;

    print_banner(&spec, selected.len());

    if !args.batch {
        let proceed = prompt::confirm_process(prompter, selected.len(), spec.is_regex())
            .map_err(InputError::Prompt)?;
        if !proceed {
            println!("Operation cancelled.");
            return Ok(RunOutcome::Cancelled);
        }
    }

    let tally = relink::process_all(git, &selected, &spec);

    println!("\n{} {}", style("Done.").bold(), tally.summary_line());
    if let Some(line) = tally.submodule_line() {
        println!("      {}", line);
    }

    Ok(RunOutcome::Completed(tally))
}

/// Main CLI entry point for `git-origin-rewrite`.
///
/// Parses arguments, installs logging, verifies that `git` is on `PATH`
/// and hands off to [`run`] with the terminal prompter and the `git`
/// executable.
///
/// # Exit Codes
///
/// * `0` – Normal completion, including "nothing found" and cancellation.
/// * `1` – Invalid input, reported once on stderr.
pub fn entry() -> Result<i32, ()> {
    let args = Args::parse();
    init_logging(args.verbose);

    if which::which("git").is_err() {
        eprintln!(
            "{}",
            style(format!("Error: {}", InputError::GitNotFound))
                .red()
                .bold()
        );
        return Err(());
    }

    let mut prompter = DialoguerPrompter;
    let mut git = GitCli::new(args.batch);

    match run(&args, &mut prompter, &mut git) {
        Ok(_) => Ok(0),
        Err(e) => {
            eprintln!("{}", style(format!("Error: {}", e)).red().bold());
            Err(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::fs;
    use std::path::Path;
    use std::process::{Command, Stdio};

    /// Scripted answers for every prompt.
    struct ScriptedPrompter {
        texts: VecDeque<String>,
        selection: Option<Vec<usize>>,
        confirm: bool,
        confirm_asked: bool,
    }

    impl ScriptedPrompter {
        fn new(selection: Option<Vec<usize>>, confirm: bool) -> Self {
            ScriptedPrompter {
                texts: VecDeque::new(),
                selection,
                confirm,
                confirm_asked: false,
            }
        }

        fn with_texts(mut self, texts: &[&str]) -> Self {
            self.texts = texts.iter().map(|s| s.to_string()).collect();
            self
        }
    }

    impl StringPrompter for ScriptedPrompter {
        fn prompt(&mut self, _prompt: &str) -> Result<String, String> {
            self.texts
                .pop_front()
                .ok_or_else(|| String::from("no scripted text left"))
        }
    }

    impl SelectPrompter for ScriptedPrompter {
        fn select(
            &mut self,
            _prompt: &str,
            _items: &[String],
        ) -> Result<Option<Vec<usize>>, String> {
            Ok(self.selection.clone())
        }
    }

    impl ConfirmPrompter for ScriptedPrompter {
        fn confirm(&mut self, _prompt: &str, _default: bool) -> Result<bool, String> {
            self.confirm_asked = true;
            Ok(self.confirm)
        }
    }

    /// Fails the test if the run reaches any git operation.
    struct NoGit;

    impl GitOps for NoGit {
        fn origin_url(&mut self, _repo: &Path) -> Result<String, String> {
            panic!("git must not be called")
        }
        fn set_origin_url(&mut self, _repo: &Path, _url: &str) -> Result<(), String> {
            panic!("git must not be called")
        }
        fn fetch_origin(&mut self, _repo: &Path) -> Result<(), String> {
            panic!("git must not be called")
        }
        fn submodule_urls(&mut self, _repo: &Path) -> Result<Vec<(String, String)>, String> {
            panic!("git must not be called")
        }
        fn set_gitmodules_value(
            &mut self,
            _repo: &Path,
            _key: &str,
            _value: &str,
        ) -> Result<(), String> {
            panic!("git must not be called")
        }
        fn set_config_value(&mut self, _repo: &Path, _key: &str, _value: &str) -> Result<(), String> {
            panic!("git must not be called")
        }
        fn submodule_sync(&mut self, _repo: &Path) -> Result<(), String> {
            panic!("git must not be called")
        }
    }

    fn args(path: &Path, find: Option<&str>, replace: Option<&str>, batch: bool) -> Args {
        Args {
            path: path.to_path_buf(),
            find: find.map(str::to_string),
            replace: replace.map(str::to_string),
            regex: false,
            batch,
            verbose: false,
        }
    }

    /// Two directories that look like repositories to discovery.
    fn fake_repos() -> tempfile::TempDir {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        fs::create_dir_all(dir.path().join("a/.git")).expect("failed to create a");
        fs::create_dir_all(dir.path().join("b/.git")).expect("failed to create b");
        dir
    }

    fn git_available() -> bool {
        which::which("git").is_ok()
    }

    fn git(dir: &Path, args: &[&str]) -> String {
        let out = Command::new("git")
            .current_dir(dir)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .expect("failed to spawn git");
        assert!(out.status.success(), "git {:?} failed", args);
        String::from_utf8_lossy(&out.stdout).trim().to_string()
    }

    /// Creates `work/<name>` repositories with origin pointing at
    /// `remotes/github.com/<name>.git`, plus matching bare repositories
    /// under both `github.com` and `gitlab.com` so that fetch succeeds
    /// before and after the rewrite.
    fn real_repos(names: &[&str]) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let root = dir.path().canonicalize().expect("temp dir exists");
        let work = root.join("work");

        for name in names {
            for host in ["github.com", "gitlab.com"] {
                let bare = root.join("remotes").join(host).join(format!("{name}.git"));
                fs::create_dir_all(&bare).expect("failed to create bare dir");
                git(&bare, &["init", "-q", "--bare"]);
            }

            let repo = work.join(name);
            fs::create_dir_all(&repo).expect("failed to create repo dir");
            git(&repo, &["init", "-q"]);
            let origin = root
                .join("remotes/github.com")
                .join(format!("{name}.git"));
            git(
                &repo,
                &["remote", "add", "origin", &origin.display().to_string()],
            );
        }

        (dir, work)
    }

    #[test]
    fn missing_path_is_an_input_error() {
        let a = args(Path::new("/definitely/not/here"), Some("x"), Some("y"), true);
        let err = run(&a, &mut ScriptedPrompter::new(None, false), &mut NoGit).unwrap_err();
        assert!(matches!(err, InputError::PathNotFound(_)));
    }

    #[test]
    fn empty_tree_ends_cleanly() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let a = args(dir.path(), Some("x"), Some("y"), true);
        let outcome = run(&a, &mut ScriptedPrompter::new(None, false), &mut NoGit).unwrap();
        assert_eq!(outcome, RunOutcome::NothingFound);
    }

    #[test]
    fn cancelled_selection_touches_nothing() {
        let dir = fake_repos();
        let a = args(dir.path(), Some("x"), Some("y"), false);
        let outcome = run(&a, &mut ScriptedPrompter::new(None, true), &mut NoGit).unwrap();
        assert_eq!(outcome, RunOutcome::Cancelled);
    }

    #[test]
    fn unchecking_everything_ends_cleanly() {
        let dir = fake_repos();
        let a = args(dir.path(), Some("x"), Some("y"), false);
        let outcome = run(&a, &mut ScriptedPrompter::new(Some(vec![]), true), &mut NoGit).unwrap();
        assert_eq!(outcome, RunOutcome::NothingSelected);
    }

    #[test]
    fn declined_confirmation_touches_nothing() {
        let dir = fake_repos();
        let a = args(dir.path(), Some("x"), Some("y"), false);
        let mut prompter = ScriptedPrompter::new(Some(vec![0, 1]), false);
        let outcome = run(&a, &mut prompter, &mut NoGit).unwrap();
        assert_eq!(outcome, RunOutcome::Cancelled);
        assert!(prompter.confirm_asked);
    }

    #[test]
    fn batch_mode_requires_find_and_replace() {
        let dir = fake_repos();

        let a = args(dir.path(), None, Some("y"), true);
        let err = run(&a, &mut ScriptedPrompter::new(None, false), &mut NoGit).unwrap_err();
        assert!(matches!(err, InputError::EmptyFind));

        let a = args(dir.path(), Some("x"), None, true);
        let err = run(&a, &mut ScriptedPrompter::new(None, false), &mut NoGit).unwrap_err();
        assert!(matches!(err, InputError::MissingReplace));
    }

    #[test]
    fn blank_prompted_find_is_an_input_error() {
        let dir = fake_repos();
        let a = args(dir.path(), None, None, false);
        let mut prompter = ScriptedPrompter::new(Some(vec![0, 1]), true).with_texts(&["   ", "y"]);
        let err = run(&a, &mut prompter, &mut NoGit).unwrap_err();
        assert!(matches!(err, InputError::EmptyFind));
        assert!(!prompter.confirm_asked);
    }

    #[test]
    fn invalid_regex_is_reported_before_processing() {
        let dir = fake_repos();
        let mut a = args(dir.path(), Some("server-("), Some("y"), true);
        a.regex = true;
        let err = run(&a, &mut ScriptedPrompter::new(None, false), &mut NoGit).unwrap_err();
        assert!(matches!(err, InputError::InvalidRegex(_)));
    }

    #[test]
    fn unknown_group_reference_is_reported_before_processing() {
        let dir = fake_repos();
        let mut a = args(
            dir.path(),
            Some(r"github\.com/(\w+)"),
            Some(r"gitlab.com/\2"),
            true,
        );
        a.regex = true;
        let err = run(&a, &mut ScriptedPrompter::new(None, false), &mut NoGit).unwrap_err();
        assert!(matches!(err, InputError::InvalidReplacement(_)));
    }

    #[test]
    fn batch_rewrites_every_repository() {
        if !git_available() {
            return;
        }
        let (_dir, work) = real_repos(&["one", "two"]);
        let a = args(&work, Some(" github.com "), Some("gitlab.com"), true);

        let outcome = run(
            &a,
            &mut ScriptedPrompter::new(None, false),
            &mut GitCli::new(true),
        )
        .unwrap();

        match outcome {
            RunOutcome::Completed(tally) => {
                assert_eq!(tally.success, 2);
                assert_eq!(tally.failed, 0);
                assert_eq!(tally.skipped, 0);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        for name in ["one", "two"] {
            let url = git(&work.join(name), &["remote", "get-url", "origin"]);
            assert!(url.ends_with(&format!("gitlab.com/{name}.git")), "{url}");
        }
    }

    #[test]
    fn interactive_run_only_touches_checked_repositories() {
        if !git_available() {
            return;
        }
        let (_dir, work) = real_repos(&["a", "b"]);
        let a = args(&work, None, None, false);
        let mut prompter =
            ScriptedPrompter::new(Some(vec![0]), true).with_texts(&["github.com", "gitlab.com"]);

        let outcome = run(&a, &mut prompter, &mut GitCli::new(false)).unwrap();

        assert!(matches!(outcome, RunOutcome::Completed(t) if t.success == 1));
        assert!(git(&work.join("a"), &["remote", "get-url", "origin"]).contains("gitlab.com"));
        assert!(git(&work.join("b"), &["remote", "get-url", "origin"]).contains("github.com"));
    }

    #[test]
    fn submodules_are_rewritten_without_an_origin() {
        if !git_available() {
            return;
        }
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let repo = dir.path().join("host");
        fs::create_dir_all(&repo).expect("failed to create repo dir");
        git(&repo, &["init", "-q"]);
        git(&repo, &["config", "-f", ".gitmodules", "submodule.lib.path", "lib"]);
        git(
            &repo,
            &[
                "config",
                "-f",
                ".gitmodules",
                "submodule.lib.url",
                "https://github.com/u/lib.git",
            ],
        );

        let a = args(dir.path(), Some("github.com"), Some("gitlab.com"), true);
        let outcome = run(
            &a,
            &mut ScriptedPrompter::new(None, false),
            &mut GitCli::new(true),
        )
        .unwrap();

        match outcome {
            RunOutcome::Completed(tally) => {
                assert_eq!(tally.skipped, 1);
                assert_eq!(tally.submodules_updated, 1);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(
            git(&repo, &["config", "-f", ".gitmodules", "--get", "submodule.lib.url"]),
            "https://gitlab.com/u/lib.git"
        );
        assert_eq!(
            git(&repo, &["config", "--get", "submodule.lib.url"]),
            "https://gitlab.com/u/lib.git"
        );
    }
}
