//! Git command driver

use crate::error::{SyncError, SyncResult};
use regex::Regex;
use semver::Version;
use std::path::{Path, PathBuf};
use std::process::Output;
use std::sync::OnceLock;
use tokio::process::Command;
use tracing::debug;

const BACKEND: &str = "git";
const FALLBACK_NAME: &str = "profsync";
const FALLBACK_EMAIL: &str = "profsync@localhost";

fn version_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+)\.(\d+)\.(\d+)").expect("valid regex"))
}

/// Git run inside one working tree
#[derive(Debug, Clone)]
pub struct Git {
    cwd: PathBuf,
}

impl Git {
    #[must_use]
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self { cwd: cwd.into() }
    }

    #[must_use]
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Git command with a stable, non-interactive environment
    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new("git");
        cmd.args(args)
            .current_dir(&self.cwd)
            .env("LC_ALL", "C")
            .env("GIT_TERMINAL_PROMPT", "0")
            .env("GIT_ADVICE", "0")
            .kill_on_drop(true);
        cmd
    }

    async fn output(&self, args: &[&str]) -> SyncResult<Output> {
        debug!(cwd = %self.cwd.display(), ?args, "git");
        self.command(args)
            .output()
            .await
            .map_err(|e| SyncError::transport(BACKEND, format!("can not run git: {e}")))
    }

    /// Run git and return its trimmed stdout
    async fn raw(&self, args: &[&str]) -> SyncResult<String> {
        let output = self.output(args).await?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim_end().to_string())
        } else {
            Err(SyncError::transport(
                BACKEND,
                format!(
                    "`git {}` failed: {}",
                    args.join(" "),
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            ))
        }
    }

    /// Installed git version; 2.0.0 when it cannot be parsed
    ///
    /// # Errors
    /// Returns a transport error if git cannot be run
    pub async fn version(&self) -> SyncResult<Version> {
        let raw = self.raw(&["--version"]).await?;
        Ok(parse_version(&raw))
    }

    /// Whether the working directory is the top level of a git repository
    pub async fn is_repo(&self) -> bool {
        if !self.cwd.exists() {
            return false;
        }
        let Ok(top) = self.raw(&["rev-parse", "--show-toplevel"]).await else {
            return false;
        };

        match (std::fs::canonicalize(top), std::fs::canonicalize(&self.cwd)) {
            (Ok(top), Ok(cwd)) => top == cwd,
            _ => false,
        }
    }

    /// Create a repository whose first branch is `branch`
    ///
    /// # Errors
    /// Returns a transport error if a git command fails
    pub async fn init(&self, branch: &str) -> SyncResult<()> {
        let version = self.version().await?;
        if version >= Version::new(2, 28, 0) {
            self.raw(&["init", "--initial-branch", branch]).await?;
        } else {
            self.raw(&["init"]).await?;
            self.raw(&["checkout", "-b", branch]).await?;
        }
        Ok(())
    }

    /// Stage everything, deletions included
    ///
    /// # Errors
    /// Returns a transport error if git fails
    pub async fn add_all(&self) -> SyncResult<()> {
        self.raw(&["add", "--all", "."]).await.map(|_| ())
    }

    /// Whether the index differs from `HEAD`
    ///
    /// # Errors
    /// Returns a transport error if git cannot be run
    pub async fn has_staged(&self) -> SyncResult<bool> {
        let output = self.output(&["status", "--porcelain"]).await?;
        if !output.status.success() {
            return Err(SyncError::transport(BACKEND, "`git status` failed"));
        }

        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .any(|line| line.chars().next().is_some_and(|c| c != ' ' && c != '?')))
    }

    /// Commit the index, supplying an identity when none is configured
    ///
    /// # Errors
    /// Returns a transport error if the commit fails
    pub async fn commit(&self, message: &str) -> SyncResult<()> {
        let mut args: Vec<String> = Vec::new();
        if self.raw(&["config", "user.name"]).await.is_err() {
            args.extend(["-c".to_string(), format!("user.name={FALLBACK_NAME}")]);
        }
        if self.raw(&["config", "user.email"]).await.is_err() {
            args.extend(["-c".to_string(), format!("user.email={FALLBACK_EMAIL}")]);
        }
        args.extend(["commit".to_string(), "--message".to_string(), message.to_string()]);

        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        self.raw(&args).await.map(|_| ())
    }

    /// Output of `git remote show origin`, `None` when it fails
    pub async fn remote_show_origin(&self) -> Option<String> {
        self.raw(&["remote", "show", "origin"])
            .await
            .ok()
            .filter(|status| !status.trim().is_empty())
    }

    /// # Errors
    /// Returns a transport error if git fails
    pub async fn add_remote(&self, url: &str) -> SyncResult<()> {
        self.raw(&["remote", "add", "origin", url]).await.map(|_| ())
    }

    /// # Errors
    /// Returns a transport error if the remote cannot be reached
    pub async fn fetch(&self) -> SyncResult<()> {
        self.raw(&["fetch", "origin"]).await.map(|_| ())
    }

    /// Every local and remote-tracking branch, as printed by `git branch --all`
    ///
    /// # Errors
    /// Returns a transport error if git fails
    pub async fn branches(&self) -> SyncResult<Vec<String>> {
        let raw = self.raw(&["branch", "--all", "--no-color"]).await?;
        Ok(raw
            .lines()
            .map(|line| line.trim_start_matches('*').trim())
            .map(|line| line.split(" -> ").next().unwrap_or(line).to_string())
            .filter(|line| !line.is_empty())
            .collect())
    }

    /// Name of the checked-out branch, born or not
    ///
    /// # Errors
    /// Returns a transport error if `HEAD` is detached or git fails
    pub async fn current_branch(&self) -> SyncResult<String> {
        self.raw(&["symbolic-ref", "--short", "HEAD"]).await
    }

    /// # Errors
    /// Returns a transport error if the pull fails
    pub async fn pull(&self, branch: &str) -> SyncResult<()> {
        self.raw(&["pull", "origin", branch]).await.map(|_| ())
    }

    /// # Errors
    /// Returns a transport error if the push fails
    pub async fn push_force(&self, branch: &str) -> SyncResult<()> {
        self.raw(&["push", "--force", "origin", branch]).await.map(|_| ())
    }

    /// # Errors
    /// Returns a transport error if git fails
    pub async fn reset_hard(&self) -> SyncResult<()> {
        self.raw(&["reset", "--hard"]).await.map(|_| ())
    }
}

fn parse_version(raw: &str) -> Version {
    version_re()
        .captures(raw)
        .and_then(|caps| {
            Some(Version::new(
                caps[1].parse().ok()?,
                caps[2].parse().ok()?,
                caps[3].parse().ok()?,
            ))
        })
        .unwrap_or_else(|| Version::new(2, 0, 0))
}

/// `Fetch URL:` line of `git remote show origin`
#[must_use]
pub fn fetch_url(status: &str) -> Option<&str> {
    status
        .lines()
        .find_map(|line| line.trim().strip_prefix("Fetch URL:"))
        .map(str::trim)
}
