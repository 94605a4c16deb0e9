//! Evolution scanner
//!
//! Measures a local clone once per quarter of its history and keeps one
//! checkpoint per quarter.

pub mod branch;
pub mod measure;
pub mod quarters;
pub mod vcs;
pub mod walker;

#[cfg(test)]
mod tests;

use crate::scanner::context::ScanContext;
use crate::scanner::error::ScanError;
use crate::scanner::registry::{Collaborators, Scanner};
use crate::scanner::types::{ScanStep, SourceDescriptor, SourceKind};
use async_trait::async_trait;
use branch::BranchResolver;
use measure::Measurer;
use std::path::PathBuf;
use std::sync::Arc;
use vcs::VersionControl;
use walker::IntervalWalker;

pub const STEP_NAME: &str = "evolution";

pub struct EvolutionScanner {
    vcs: Arc<dyn VersionControl>,
    measurer: Arc<dyn Measurer>,
}

impl EvolutionScanner {
    pub fn new(vcs: Arc<dyn VersionControl>, measurer: Arc<dyn Measurer>) -> Self {
        Self { vcs, measurer }
    }

    /// Local clone of a source: the explicit path, or the scratch layout
    pub fn clone_path(ctx: &ScanContext, source: &SourceDescriptor) -> PathBuf {
        source.path.clone().unwrap_or_else(|| {
            ctx.settings
                .scratch_dir
                .join(&source.organisation)
                .join("git")
                .join(&source.source_id)
        })
    }
}

fn factory(collaborators: &Collaborators) -> Box<dyn Scanner> {
    Box::new(EvolutionScanner::new(
        collaborators.vcs.clone(),
        collaborators.measurer.clone(),
    ))
}

crate::register_scanner!(factory);

#[async_trait]
impl Scanner for EvolutionScanner {
    fn name(&self) -> &'static str {
        "git-evolution"
    }

    fn step_name(&self) -> &'static str {
        STEP_NAME
    }

    fn accepts(&self, source: &SourceDescriptor) -> bool {
        match source.kind {
            SourceKind::Git => true,
            SourceKind::Github => !source.issues_only,
            SourceKind::Travis => false,
        }
    }

    async fn scan(&self, ctx: &ScanContext, source: &SourceDescriptor) -> ScanStep {
        let identity = source.identity();
        let reporter = ctx.reporter(&identity.source_id, STEP_NAME);
        let repo = Self::clone_path(ctx, source);

        if !repo.is_dir() {
            log::warn!(
                "[{}] No local clone at {}, skipping evolution scan",
                identity.source_id,
                repo.display()
            );
            return reporter
                .release(
                    "Could not do evolutionary scan of code",
                    Some(format!("Repository not synced to {}", repo.display())),
                    false,
                )
                .await;
        }

        reporter
            .acquire(format!("Evolution scan started at {}", reporter.timestamp()))
            .await;
        log::info!("[{}] Evolution scan of {}", identity.source_id, repo.display());

        let now = ctx.clock.now();
        let walker = IntervalWalker::new(self.vcs.as_ref(), self.measurer.as_ref(), ctx.store.as_ref())
            .with_resolver(BranchResolver::new(&ctx.settings.default_branch))
            .with_key_scheme(ctx.settings.key_scheme)
            .with_shutdown(ctx.shutdown.clone());

        let outcome = match self.vcs.first_commit_time(&repo).await {
            Ok(origin) => walker.walk(&repo, origin, now, &identity).await,
            Err(err) => Err(err),
        };

        match outcome {
            Ok(summary) => {
                log::info!(
                    "[{}] Evolution scan done: {} quarters, {} new, {} already recorded",
                    identity.source_id,
                    summary.candidates,
                    summary.written,
                    summary.skipped
                );
                reporter
                    .release(
                        format!("Evolution scan completed at {}", reporter.timestamp()),
                        None,
                        true,
                    )
                    .await
            }
            Err(err @ ScanError::RepositoryState { .. }) => {
                log::error!("[{}] {}", identity.source_id, err);
                reporter
                    .release(
                        "Could not do evolutionary scan of code",
                        Some(err.to_string()),
                        false,
                    )
                    .await
            }
            Err(ScanError::Interrupted) => {
                reporter
                    .release(
                        format!("Evolution scan interrupted at {}", reporter.timestamp()),
                        Some(ScanError::Interrupted.to_string()),
                        false,
                    )
                    .await
            }
            Err(err) => {
                log::error!("[{}] Evolution scan failed: {}", identity.source_id, err);
                reporter
                    .release(
                        format!("Evolution scan failed at {}", reporter.timestamp()),
                        Some(err.to_string()),
                        false,
                    )
                    .await
            }
        }
    }
}
