//! Job State Reconciler
//!
//! A build record may be rewritten until it is completed. The existing
//! record is checked before the remote detail is fetched, so a completed
//! build costs one store read and nothing else.

use crate::core::keys::{KeyScheme, KeySubject};
use crate::core::time::format_document_date;
use crate::scanner::ci::api::RemoteBuild;
use crate::scanner::error::ScanResult;
use crate::scanner::types::{BuildRecord, BuildStatus, SourceIdentity, Tally};
use crate::store::{DocumentStore, CI_BUILD};
use chrono::DateTime;
use serde_json::Value;
use std::future::Future;

#[derive(Debug, Clone, PartialEq)]
pub enum Reconciled {
    /// The stored record is terminal; nothing was fetched or written
    Terminal,
    Written(BuildRecord),
}

pub struct Reconciler<'a> {
    store: &'a dyn DocumentStore,
    identity: &'a SourceIdentity,
    key_scheme: KeyScheme,
}

impl<'a> Reconciler<'a> {
    pub fn new(store: &'a dyn DocumentStore, identity: &'a SourceIdentity, key_scheme: KeyScheme) -> Self {
        Self {
            store,
            identity,
            key_scheme,
        }
    }

    pub fn build_key(&self, job_id: u64, build_id: u64) -> String {
        let job = job_id.to_string();
        self.key_scheme.key(&KeySubject::Build {
            organisation: &self.identity.organisation,
            source_url: &self.identity.source_url,
            job_id: &job,
            build_id,
        })
    }

    /// Bring one build's record up to date
    ///
    /// `fetch` is only awaited when the stored record is absent or still
    /// running.
    pub async fn reconcile<F, Fut>(
        &self,
        job_id: u64,
        build_id: u64,
        job_url: &str,
        fetch: F,
    ) -> ScanResult<Reconciled>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ScanResult<RemoteBuild>>,
    {
        let key = self.build_key(job_id, build_id);

        if let Some(existing) = self.store.get(CI_BUILD, &key).await? {
            if is_completed(&existing) {
                log::trace!("Build {} of job {} is complete, skipping", build_id, job_id);
                return Ok(Reconciled::Terminal);
            }
        }

        let build = fetch().await?;
        let record = build_record(key, &build, job_url, self.identity);
        self.store
            .append(CI_BUILD, serde_json::to_value(&record)?)
            .await?;
        Ok(Reconciled::Written(record))
    }
}

fn is_completed(document: &Value) -> bool {
    document.get("completed").and_then(Value::as_bool) == Some(true)
}

/// Epoch seconds of an ISO-8601 timestamp; absent or unreadable is 0
pub fn parse_timestamp(raw: Option<&str>) -> i64 {
    let Some(raw) = raw.filter(|text| !text.is_empty()) else {
        return 0;
    };
    match DateTime::parse_from_rfc3339(raw) {
        Ok(parsed) => parsed.timestamp(),
        Err(err) => {
            log::debug!("Unreadable timestamp {:?}: {}", raw, err);
            0
        }
    }
}

/// Canonical record for a remote build
pub fn build_record(
    key: String,
    build: &RemoteBuild,
    job_url: &str,
    identity: &SourceIdentity,
) -> BuildRecord {
    let finished_at = parse_timestamp(build.finished_at.as_deref());
    BuildRecord {
        id: key,
        build_id: build.id,
        job_slug: build
            .repository
            .as_ref()
            .map(|repository| repository.slug.clone())
            .unwrap_or_default(),
        job_url: job_url.to_string(),
        started_at: parse_timestamp(build.started_at.as_deref()),
        finished_at,
        duration_ms: build.duration.unwrap_or(0).saturating_mul(1000),
        date: DateTime::from_timestamp(finished_at, 0)
            .map(format_document_date)
            .unwrap_or_default(),
        status: BuildStatus::from_raw(&build.state),
        completed: build.duration.is_some(),
        ci: "travis".to_string(),
        queuetime: Tally::Unknown,
        source_id: identity.source_id.clone(),
        organisation: identity.organisation.clone(),
    }
}
