use std::path::Path;
use std::process::{Command, Stdio};

/// Remote whose URL is rewritten.
pub const REMOTE: &str = "origin";

/// Pattern passed to `git config --get-regexp` to list submodule URLs.
const SUBMODULE_URL_PATTERN: &str = r"submodule\..*\.url";

/// Git operations needed to rewrite one repository.
///
/// Every method runs with `repo` as the working directory. Errors carry
/// git's trimmed standard error, or the spawn failure message.
pub trait GitOps {
    /// `git remote get-url origin`
    fn origin_url(&mut self, repo: &Path) -> Result<String, String>;

    /// `git remote set-url origin <url>`
    fn set_origin_url(&mut self, repo: &Path, url: &str) -> Result<(), String>;

    /// `git fetch origin`
    fn fetch_origin(&mut self, repo: &Path) -> Result<(), String>;

    /// Lists `(key, url)` pairs for every `submodule.<name>.url` in `.gitmodules`.
    fn submodule_urls(&mut self, repo: &Path) -> Result<Vec<(String, String)>, String>;

    /// `git config -f .gitmodules <key> <value>`
    fn set_gitmodules_value(&mut self, repo: &Path, key: &str, value: &str)
    -> Result<(), String>;

    /// `git config <key> <value>` in the repository's local config.
    fn set_config_value(&mut self, repo: &Path, key: &str, value: &str) -> Result<(), String>;

    /// `git submodule sync`
    fn submodule_sync(&mut self, repo: &Path) -> Result<(), String>;
}

/// [`GitOps`] backed by the `git` executable.
#[derive(Debug, Default, Clone)]
pub struct GitCli {
    non_interactive: bool,
}

impl GitCli {
    /// When `non_interactive` is set, network commands are told never to
    /// prompt for credentials (`GIT_TERMINAL_PROMPT=0`).
    pub fn new(non_interactive: bool) -> Self {
        GitCli { non_interactive }
    }

    /// A `git` command rooted at `repo`, with stdin closed and both
    /// output streams captured.
    fn command(&self, repo: &Path) -> Command {
        let mut cmd = Command::new("git");
        cmd.current_dir(repo);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd
    }
}

impl GitOps for GitCli {
    fn origin_url(&mut self, repo: &Path) -> Result<String, String> {
        let mut cmd = self.command(repo);
        cmd.args(["remote", "get-url", REMOTE]);
        run_output(cmd)
    }

    fn set_origin_url(&mut self, repo: &Path, url: &str) -> Result<(), String> {
        let mut cmd = self.command(repo);
        cmd.args(["remote", "set-url", REMOTE, url]);
        run_status(cmd)
    }

    fn fetch_origin(&mut self, repo: &Path) -> Result<(), String> {
        let mut cmd = self.command(repo);
        cmd.args(["fetch", REMOTE]);
        if self.non_interactive {
            cmd.env("GIT_TERMINAL_PROMPT", "0");
        }
        run_status(cmd)
    }

    /// Reads `.gitmodules` directly with `git config -f`, so it works
    /// before `git submodule init`. No file, or no `url` keys, is an empty
    /// list rather than an error.
    fn submodule_urls(&mut self, repo: &Path) -> Result<Vec<(String, String)>, String> {
        let mut cmd = self.command(repo);
        cmd.args([
            "config",
            "-f",
            ".gitmodules",
            "-z",
            "--get-regexp",
            SUBMODULE_URL_PATTERN,
        ]);
        tracing::debug!(cmd = ?cmd, "running");

        let out = cmd.output().map_err(|e| format!("{}", e))?;
        if out.status.success() {
            return Ok(parse_config_listing(&String::from_utf8_lossy(&out.stdout)));
        }

        // `--get-regexp` exits 1 when no key matches.
        let stderr = String::from_utf8_lossy(&out.stderr).trim().to_string();
        if out.status.code() == Some(1) && stderr.is_empty() {
            Ok(Vec::new())
        } else {
            Err(non_empty_or(stderr))
        }
    }

    fn set_gitmodules_value(
        &mut self,
        repo: &Path,
        key: &str,
        value: &str,
    ) -> Result<(), String> {
        let mut cmd = self.command(repo);
        cmd.args(["config", "-f", ".gitmodules", key, value]);
        run_status(cmd)
    }

    fn set_config_value(&mut self, repo: &Path, key: &str, value: &str) -> Result<(), String> {
        let mut cmd = self.command(repo);
        cmd.args(["config", key, value]);
        run_status(cmd)
    }

    fn submodule_sync(&mut self, repo: &Path) -> Result<(), String> {
        let mut cmd = self.command(repo);
        cmd.args(["submodule", "sync"]);
        run_status(cmd)
    }
}

/// Runs a command and returns only whether it succeeded.
///
/// # Parameters
/// - `cmd`: a command built by [`GitCli::command`], arguments already set.
///
/// # Returns
/// - `Ok(())` on exit status 0. Standard output is discarded.
/// - `Err(String)` with the trimmed standard error on a non-zero exit, or
///   `"non-zero exit"` when git printed nothing.
/// - `Err(String)` with the I/O error message if the process fails to start.
fn run_status(mut cmd: Command) -> Result<(), String> {
    tracing::debug!(cmd = ?cmd, "running");
    match cmd.output() {
        Ok(out) => {
            if out.status.success() {
                Ok(())
            } else {
                let stderr = String::from_utf8_lossy(&out.stderr).trim().to_string();
                Err(non_empty_or(stderr))
            }
        }
        Err(e) => Err(format!("{}", e)),
    }
}

/// Runs a command and captures what it printed.
///
/// # Parameters
/// - `cmd`: a command built by [`GitCli::command`], arguments already set.
///
/// # Returns
/// - `Ok(String)` with the trimmed standard output on exit status 0.
/// - `Err(String)` with the trimmed standard error otherwise, using the same
///   fallbacks as [`run_status`].
///
/// Output is decoded as UTF-8, replacing invalid sequences.
fn run_output(mut cmd: Command) -> Result<String, String> {
    tracing::debug!(cmd = ?cmd, "running");
    match cmd.output() {
        Ok(out) => {
            if out.status.success() {
                Ok(String::from_utf8_lossy(&out.stdout).trim().to_string())
            } else {
                let stderr = String::from_utf8_lossy(&out.stderr).trim().to_string();
                Err(non_empty_or(stderr))
            }
        }
        Err(e) => Err(format!("{}", e)),
    }
}

fn non_empty_or(stderr: String) -> String {
    if stderr.is_empty() {
        String::from("non-zero exit")
    } else {
        stderr
    }
}

/// Parses `git config -z --get-regexp` output.
///
/// Each record is `key\nvalue` terminated by NUL. A record without a
/// newline is a key with no value and is skipped.
pub(crate) fn parse_config_listing(raw: &str) -> Vec<(String, String)> {
    raw.split('\0')
        .filter(|record| !record.is_empty())
        .filter_map(|record| {
            let (key, value) = record.split_once('\n')?;
            Some((key.to_string(), value.to_string()))
        })
        .collect()
}
