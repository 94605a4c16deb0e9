//! CI scanner
//!
//! One pass lists every active repository of the organisation, records a
//! queue snapshot, then has the worker pool reconcile each repository's
//! recent builds.

pub mod api;
pub mod enumerate;
pub mod reconcile;
pub mod travis;

#[cfg(test)]
mod tests;

use crate::core::keys::KeyScheme;
use crate::core::retry::{retry_async, RetryPolicy};
use crate::scanner::context::ScanContext;
use crate::scanner::error::{ScanError, ScanResult};
use crate::scanner::pool::WorkerPool;
use crate::scanner::registry::{Collaborators, Scanner};
use crate::scanner::types::{ScanStep, SourceDescriptor, SourceIdentity, SourceKind};
use crate::store::{DocumentStore, CI_QUEUE};
use api::{ApiError, CiApi, CiConnector};
use async_trait::async_trait;
use enumerate::{enumerate_jobs, queue_snapshot};
use reconcile::{Reconciled, Reconciler};
use std::sync::Arc;

pub const STEP_NAME: &str = "travis";

pub struct TravisScanner {
    connector: Arc<dyn CiConnector>,
}

impl TravisScanner {
    pub fn new(connector: Arc<dyn CiConnector>) -> Self {
        Self { connector }
    }
}

fn factory(collaborators: &Collaborators) -> Box<dyn Scanner> {
    Box::new(TravisScanner::new(collaborators.ci.clone()))
}

crate::register_scanner!(factory);

/// Handles one task: a remote repository and its recent builds
pub struct JobScanner {
    api: Arc<dyn CiApi>,
    store: Arc<dyn DocumentStore>,
    identity: SourceIdentity,
    key_scheme: KeyScheme,
    retry: RetryPolicy,
}

impl JobScanner {
    pub fn new(
        api: Arc<dyn CiApi>,
        store: Arc<dyn DocumentStore>,
        identity: SourceIdentity,
        key_scheme: KeyScheme,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            api,
            store,
            identity,
            key_scheme,
            retry,
        }
    }

    pub async fn scan_job(&self, job_id: u64) -> ScanResult<usize> {
        let url = self.api.builds_url(job_id);
        let page = retry_async("list builds", &self.retry, ApiError::is_transient, || {
            self.api.builds(job_id)
        })
        .await
        .map_err(|e| ScanError::task(job_id, e))?;
        log::debug!("{} has {} builds listed", url, page.builds.len());

        let reconciler = Reconciler::new(self.store.as_ref(), &self.identity, self.key_scheme);
        let mut written = 0;
        for build in page.builds {
            let build_id = build.id;
            let outcome = reconciler
                .reconcile(job_id, build_id, &url, move || async move { Ok(build) })
                .await
                .map_err(|e| ScanError::task(job_id, e))?;
            if let Reconciled::Written(_) = outcome {
                written += 1;
            }
        }
        Ok(written)
    }
}

#[async_trait]
impl Scanner for TravisScanner {
    fn name(&self) -> &'static str {
        "travis"
    }

    fn step_name(&self) -> &'static str {
        STEP_NAME
    }

    fn accepts(&self, source: &SourceDescriptor) -> bool {
        source.kind == SourceKind::Travis && travis::endpoint_for(&source.url).is_some()
    }

    async fn scan(&self, ctx: &ScanContext, source: &SourceDescriptor) -> ScanStep {
        let identity = source.identity();
        let reporter = Arc::new(ctx.reporter(&identity.source_id, STEP_NAME));

        reporter.acquire("Parsing Travis job changes...").await;

        let Some(endpoint) = travis::endpoint_for(&identity.source_url) else {
            return reporter
                .release(
                    format!("Travis CI scan failed at {}", reporter.timestamp()),
                    Some(format!("Not a Travis CI URL: {}", identity.source_url)),
                    false,
                )
                .await;
        };

        let Some(credential) = identity.credential.clone() else {
            log::error!("[{}] Travis CI requires a token to work!", identity.source_id);
            return reporter
                .release(
                    format!("Travis CI scan failed at {}", reporter.timestamp()),
                    Some("Travis CI requires a token to work!".to_string()),
                    false,
                )
                .await;
        };

        reporter.progress("Downloading changeset").await;

        let enumerated = match self.connector.connect(&endpoint, &credential) {
            Ok(api) => enumerate_jobs(api.as_ref()).await.map(|jobs| (api, jobs)),
            Err(err) => Err(err),
        };
        let (api, enumeration) = match enumerated {
            Ok(found) => found,
            Err(err) => {
                log::error!("[{}] {}", identity.source_id, err);
                return reporter
                    .release(
                        format!(
                            "Travis CI scan failed at {} Bad token??!",
                            reporter.timestamp()
                        ),
                        Some(err.to_string()),
                        false,
                    )
                    .await;
            }
        };

        let snapshot = queue_snapshot(
            &identity,
            enumeration.counters,
            ctx.clock.now(),
            ctx.settings.key_scheme,
        );
        let stored = match serde_json::to_value(&snapshot) {
            Ok(document) => ctx.store.append(CI_QUEUE, document).await.map_err(ScanError::from),
            Err(err) => Err(ScanError::from(err)),
        };
        if let Err(err) = stored {
            log::error!("[{}] Could not store queue snapshot: {}", identity.source_id, err);
            return reporter
                .release(
                    format!("Travis CI scan failed at {}", reporter.timestamp()),
                    Some(err.to_string()),
                    false,
                )
                .await;
        }

        log::info!(
            "[{}] Found {} jobs in Travis, {} building",
            identity.source_id,
            enumeration.counters.total,
            enumeration.counters.building
        );

        let pool =
            WorkerPool::new(ctx.settings.pool_config()).with_shutdown(ctx.shutdown.clone());
        log::info!(
            "[{}] Scanning jobs using {} workers",
            identity.source_id,
            pool.config().workers
        );

        let jobs = Arc::new(JobScanner::new(
            api,
            ctx.store.clone(),
            identity.clone(),
            ctx.settings.key_scheme,
            ctx.settings.retry.clone(),
        ));
        let outcome = pool
            .run(
                enumeration.tasks,
                move |job_id: u64| {
                    let jobs = jobs.clone();
                    async move { jobs.scan_job(job_id).await.map(|_| ()) }
                },
                Some(reporter.clone()),
            )
            .await;

        log::info!(
            "[{}] Travis scan done: {} jobs, {} ok, {} failed",
            identity.source_id,
            outcome.dispatched,
            outcome.succeeded,
            outcome.failed
        );

        if outcome.poisoned {
            if let Some(step) = reporter.last_step() {
                return step;
            }
        }
        if outcome.interrupted {
            log::warn!(
                "[{}] Interrupted with {} jobs left",
                identity.source_id,
                outcome.enumerated - outcome.dispatched
            );
            return reporter
                .release(
                    format!("Travis CI scan interrupted at {}", reporter.timestamp()),
                    Some(ScanError::Interrupted.to_string()),
                    false,
                )
                .await;
        }

        reporter
            .release(
                format!("Travis successfully scanned at {}", reporter.timestamp()),
                None,
                true,
            )
            .await
    }
}
