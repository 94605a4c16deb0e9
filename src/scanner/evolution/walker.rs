//! Interval Walker
//!
//! Visits quarter boundaries from newest to oldest. Each boundary already
//! recorded is skipped before anything else happens; each new one is
//! resolved to a commit, materialized, measured and written under its key.
//! The first failure stops the walk. Checkpoints written before it stay
//! valid, so running the walk again resumes where it stopped. A requested
//! shutdown is honoured between boundaries the same way.

use crate::core::keys::{KeyScheme, KeySubject};
use crate::core::shutdown::ShutdownFlag;
use crate::scanner::error::{ScanError, ScanResult};
use crate::scanner::evolution::branch::BranchResolver;
use crate::scanner::evolution::measure::Measurer;
use crate::scanner::evolution::quarters::Quarters;
use crate::scanner::evolution::vcs::VersionControl;
use crate::scanner::types::{Checkpoint, SourceIdentity};
use crate::store::{DocumentStore, EVOLUTION};
use chrono::{DateTime, Utc};
use std::path::Path;

/// Counters of one walk
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalkSummary {
    pub candidates: usize,
    pub skipped: usize,
    pub written: usize,
}

pub struct IntervalWalker<'a> {
    vcs: &'a dyn VersionControl,
    measurer: &'a dyn Measurer,
    store: &'a dyn DocumentStore,
    resolver: BranchResolver,
    key_scheme: KeyScheme,
    shutdown: ShutdownFlag,
}

impl<'a> IntervalWalker<'a> {
    pub fn new(
        vcs: &'a dyn VersionControl,
        measurer: &'a dyn Measurer,
        store: &'a dyn DocumentStore,
    ) -> Self {
        Self {
            vcs,
            measurer,
            store,
            resolver: BranchResolver::default(),
            key_scheme: KeyScheme::default(),
            shutdown: ShutdownFlag::new(),
        }
    }

    pub fn with_resolver(mut self, resolver: BranchResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_key_scheme(mut self, key_scheme: KeyScheme) -> Self {
        self.key_scheme = key_scheme;
        self
    }

    pub fn with_shutdown(mut self, shutdown: ShutdownFlag) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Write every missing checkpoint between `now` and `origin`
    ///
    /// The working tree is put back to HEAD afterwards whenever it was
    /// touched, on success and on failure alike.
    pub async fn walk(
        &self,
        repo: &Path,
        origin: DateTime<Utc>,
        now: DateTime<Utc>,
        identity: &SourceIdentity,
    ) -> ScanResult<WalkSummary> {
        let mut materialized = false;
        let result = self
            .walk_quarters(repo, origin, now, identity, &mut materialized)
            .await;

        if !materialized {
            return result;
        }

        match (result, self.vcs.restore(repo).await) {
            (Ok(summary), Ok(())) => Ok(summary),
            (Ok(_), Err(restore_err)) => Err(restore_err),
            (Err(err), restore) => {
                if let Err(restore_err) = restore {
                    log::warn!(
                        "[{}] Could not restore working tree: {}",
                        identity.source_id,
                        restore_err
                    );
                }
                Err(err)
            }
        }
    }

    async fn walk_quarters(
        &self,
        repo: &Path,
        origin: DateTime<Utc>,
        now: DateTime<Utc>,
        identity: &SourceIdentity,
        materialized: &mut bool,
    ) -> ScanResult<WalkSummary> {
        let quarters = Quarters::new(origin, now);
        let floor = quarters.floor();
        let mut summary = WalkSummary::default();

        for instant in quarters {
            if self.shutdown.is_requested() {
                log::warn!(
                    "[{}] Stopping before {}, shutdown requested",
                    identity.source_id,
                    instant.format("%Y-%m-%d")
                );
                return Err(ScanError::Interrupted);
            }
            summary.candidates += 1;

            let key = self.key_scheme.key(&KeySubject::Checkpoint {
                organisation: &identity.organisation,
                source_id: &identity.source_id,
                instant,
            });
            if self.store.exists(EVOLUTION, &key).await? {
                log::debug!(
                    "[{}] Checkpoint {} already recorded",
                    identity.source_id,
                    instant.format("%Y-%m-%d")
                );
                summary.skipped += 1;
                continue;
            }

            let branch = self
                .resolver
                .resolve(self.vcs, repo, instant)
                .await?
                .ok_or_else(|| ScanError::RepositoryState {
                    message: "No default branch was found in this repository".to_string(),
                })?;
            if branch != self.resolver.default_branch() {
                log::debug!(
                    "[{}] {} has no history before {}, using {}",
                    identity.source_id,
                    self.resolver.default_branch(),
                    instant.format("%Y-%m-%d"),
                    branch
                );
            }

            let Some(commit) = self.vcs.commit_before(repo, &branch, instant).await? else {
                if instant <= floor {
                    log::debug!(
                        "[{}] No history before {}, origin reached",
                        identity.source_id,
                        instant.format("%Y-%m-%d")
                    );
                    break;
                }
                return Err(ScanError::RepositoryState {
                    message: format!(
                        "No commit on {} before {}",
                        branch,
                        instant.format("%Y-%m-%d")
                    ),
                });
            };

            log::debug!(
                "[{}] Measuring {} at {} ({})",
                identity.source_id,
                branch,
                instant.format("%Y-%m-%d"),
                commit
            );
            self.vcs.materialize(repo, &commit).await?;
            *materialized = true;

            let measured = self.measurer.measure(repo).await?;
            let checkpoint = Checkpoint::new(key.clone(), instant.timestamp(), identity, measured);
            self.store
                .index(EVOLUTION, &key, serde_json::to_value(&checkpoint)?)
                .await?;
            summary.written += 1;
        }

        Ok(summary)
    }
}
