//! Branch resolution for a target date

use crate::scanner::error::ScanResult;
use crate::scanner::evolution::vcs::VersionControl;
use chrono::{DateTime, Utc};
use std::path::Path;

/// Picks the line of history to measure at a given instant
#[derive(Debug, Clone)]
pub struct BranchResolver {
    default_branch: String,
}

impl Default for BranchResolver {
    fn default() -> Self {
        Self::new("master")
    }
}

impl BranchResolver {
    pub fn new(default_branch: impl Into<String>) -> Self {
        Self {
            default_branch: default_branch.into(),
        }
    }

    pub fn default_branch(&self) -> &str {
        &self.default_branch
    }

    /// The default branch when it has history before `at`, else the
    /// checked-out branch, else `None`
    pub async fn resolve(
        &self,
        vcs: &dyn VersionControl,
        repo: &Path,
        at: DateTime<Utc>,
    ) -> ScanResult<Option<String>> {
        match vcs.commit_before(repo, &self.default_branch, at).await {
            Ok(Some(_)) => return Ok(Some(self.default_branch.clone())),
            Ok(None) => log::debug!(
                "No history on {} before {} in {}",
                self.default_branch,
                at,
                repo.display()
            ),
            Err(err) => log::debug!(
                "Branch {} not usable in {}: {}",
                self.default_branch,
                repo.display(),
                err
            ),
        }

        let current = vcs.current_branch(repo).await?;
        if current.is_none() {
            log::debug!("No checked-out branch in {}", repo.display());
        }
        Ok(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::error::ScanError;
    use async_trait::async_trait;
    use chrono::TimeZone;

    struct Branches {
        with_history: &'static [&'static str],
        current: Option<&'static str>,
    }

    #[async_trait]
    impl VersionControl for Branches {
        async fn first_commit_time(&self, _repo: &Path) -> ScanResult<DateTime<Utc>> {
            unreachable!()
        }

        async fn commit_before(
            &self,
            _repo: &Path,
            branch: &str,
            _before: DateTime<Utc>,
        ) -> ScanResult<Option<String>> {
            if branch == "gone" {
                return Err(ScanError::Io {
                    message: "unknown revision".into(),
                });
            }
            Ok(self
                .with_history
                .contains(&branch)
                .then(|| format!("{}-sha", branch)))
        }

        async fn materialize(&self, _repo: &Path, _commit: &str) -> ScanResult<()> {
            unreachable!()
        }

        async fn restore(&self, _repo: &Path) -> ScanResult<()> {
            unreachable!()
        }

        async fn current_branch(&self, _repo: &Path) -> ScanResult<Option<String>> {
            Ok(self.current.map(str::to_string))
        }
    }

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_prefers_default_branch_with_history() {
        let vcs = Branches {
            with_history: &["master", "main"],
            current: Some("main"),
        };
        let resolved = BranchResolver::default()
            .resolve(&vcs, Path::new("/repo"), at())
            .await
            .unwrap();
        assert_eq!(resolved.as_deref(), Some("master"));
    }

    #[tokio::test]
    async fn test_falls_back_to_current_branch() {
        let vcs = Branches {
            with_history: &["main"],
            current: Some("main"),
        };
        let resolved = BranchResolver::default()
            .resolve(&vcs, Path::new("/repo"), at())
            .await
            .unwrap();
        assert_eq!(resolved.as_deref(), Some("main"));

        let resolved = BranchResolver::new("gone")
            .resolve(&vcs, Path::new("/repo"), at())
            .await
            .unwrap();
        assert_eq!(resolved.as_deref(), Some("main"));
    }

    #[tokio::test]
    async fn test_none_when_nothing_resolves() {
        let vcs = Branches {
            with_history: &[],
            current: None,
        };
        let resolved = BranchResolver::default()
            .resolve(&vcs, Path::new("/repo"), at())
            .await
            .unwrap();
        assert_eq!(resolved, None);
    }
}
