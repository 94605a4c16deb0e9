//! Version-control collaborator
//!
//! Every call names the repository explicitly; nothing here reads or changes
//! the process working directory.

use crate::scanner::error::{ScanError, ScanResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// Queries and working-tree changes the evolution walk needs
#[async_trait]
pub trait VersionControl: Send + Sync {
    /// Timestamp of the earliest root commit reachable from HEAD
    async fn first_commit_time(&self, repo: &Path) -> ScanResult<DateTime<Utc>>;

    /// The newest commit on `branch` older than `before`
    async fn commit_before(
        &self,
        repo: &Path,
        branch: &str,
        before: DateTime<Utc>,
    ) -> ScanResult<Option<String>>;

    /// Replace the index and working tree with `commit`, leaving HEAD alone
    async fn materialize(&self, repo: &Path, commit: &str) -> ScanResult<()>;

    /// Put the index and working tree back to HEAD
    async fn restore(&self, repo: &Path) -> ScanResult<()>;

    /// Short name of the checked-out branch, `None` when detached
    async fn current_branch(&self, repo: &Path) -> ScanResult<Option<String>>;
}

/// `git` command line, plus gix for reference lookups
#[derive(Debug, Clone)]
pub struct GitCli {
    program: String,
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new("git")
    }
}

impl GitCli {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn git(&self, repo: &Path, args: &[&str]) -> ScanResult<String> {
        let output = Command::new(&self.program)
            .arg("-C")
            .arg(repo)
            .args(args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ScanError::Io {
                message: format!("Could not run {}: {}", self.program, e),
            })?;

        if !output.status.success() {
            return Err(ScanError::Io {
                message: format!(
                    "git {} in {} exited with {}: {}",
                    args.first().copied().unwrap_or_default(),
                    repo.display(),
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl VersionControl for GitCli {
    async fn first_commit_time(&self, repo: &Path) -> ScanResult<DateTime<Utc>> {
        let stdout = self
            .git(repo, &["log", "--max-parents=0", "--pretty=format:%ct", "HEAD"])
            .await?;

        stdout
            .lines()
            .filter_map(|line| line.trim().parse::<i64>().ok())
            .min()
            .and_then(|seconds| DateTime::from_timestamp(seconds, 0))
            .ok_or_else(|| ScanError::RepositoryState {
                message: format!("No commits found in {}", repo.display()),
            })
    }

    async fn commit_before(
        &self,
        repo: &Path,
        branch: &str,
        before: DateTime<Utc>,
    ) -> ScanResult<Option<String>> {
        let before_arg = format!("--before={}", before.format("%Y-%m-%d %H:%M:%S +0000"));
        let stdout = self
            .git(repo, &["rev-list", "-n", "1", &before_arg, branch, "--"])
            .await?;
        let sha = stdout.trim();
        Ok((!sha.is_empty()).then(|| sha.to_string()))
    }

    async fn materialize(&self, repo: &Path, commit: &str) -> ScanResult<()> {
        self.git(repo, &["read-tree", "-u", "--reset", commit])
            .await
            .map(|_| ())
    }

    async fn restore(&self, repo: &Path) -> ScanResult<()> {
        self.git(repo, &["read-tree", "-u", "--reset", "HEAD"])
            .await
            .map(|_| ())
    }

    async fn current_branch(&self, repo: &Path) -> ScanResult<Option<String>> {
        let repo_path: PathBuf = repo.to_path_buf();
        tokio::task::spawn_blocking(move || {
            let repo = gix::open(&repo_path).map_err(|e| ScanError::RepositoryState {
                message: format!("Failed to open repository {}: {}", repo_path.display(), e),
            })?;
            Ok(repo
                .head_name()
                .ok()
                .flatten()
                .map(|head_name| head_name.shorten().to_string()))
        })
        .await
        .map_err(|e| ScanError::Internal {
            message: format!("Branch lookup task failed: {}", e),
        })?
    }
}
