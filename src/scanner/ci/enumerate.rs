//! Remote Job Enumerator
//!
//! Pages through the repository listing, collecting task ids and folding
//! per-item state into counters. A short page ends the listing. A failed
//! page ends the scan: the credential and host are assumed fixed for one
//! pass, so there is nothing to retry.

use crate::core::keys::{KeyScheme, KeySubject};
use crate::core::time::format_document_date;
use crate::scanner::ci::api::CiApi;
use crate::scanner::error::{ScanError, ScanResult};
use crate::scanner::types::{QueueSnapshot, SourceIdentity, Tally};
use chrono::{DateTime, Utc};

pub const PAGE_SIZE: usize = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobCounters {
    pub total: u64,
    pub building: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Enumeration {
    pub tasks: Vec<u64>,
    pub counters: JobCounters,
    pub pages: usize,
}

/// List every active repository
pub async fn enumerate_jobs(api: &dyn CiApi) -> ScanResult<Enumeration> {
    let mut enumeration = Enumeration::default();
    let mut offset = 0;

    loop {
        let page = api
            .repositories(offset, PAGE_SIZE)
            .await
            .map_err(|e| ScanError::Configuration {
                message: format!("CI API did not return success (bad token?): {}", e),
            })?;
        enumeration.pages += 1;
        offset += PAGE_SIZE;

        let received = page.repositories.len();
        for repository in page.repositories {
            enumeration.counters.total += 1;
            if repository.is_building() {
                enumeration.counters.building += 1;
            }
            enumeration.tasks.push(repository.id);
        }
        log::debug!(
            "Page {}: {} repositories, {} so far",
            enumeration.pages,
            received,
            enumeration.tasks.len()
        );

        if received < PAGE_SIZE {
            break;
        }
    }

    Ok(enumeration)
}

/// The queue snapshot for one pass; counters the API does not expose stay unknown
pub fn queue_snapshot(
    identity: &SourceIdentity,
    counters: JobCounters,
    taken_at: DateTime<Utc>,
    key_scheme: KeyScheme,
) -> QueueSnapshot {
    let id = key_scheme.key(&KeySubject::Queue {
        organisation: &identity.organisation,
        source_url: &identity.source_url,
        taken_at: taken_at.timestamp(),
    });
    QueueSnapshot {
        id,
        time: taken_at.timestamp(),
        date: format_document_date(taken_at),
        jobs: counters.total,
        building: counters.building,
        size: Tally::Unknown,
        blocked: Tally::Unknown,
        stuck: Tally::Unknown,
        avgwait: Tally::Unknown,
        ci: "travis".to_string(),
        source_id: identity.source_id.clone(),
        organisation: identity.organisation.clone(),
    }
}
