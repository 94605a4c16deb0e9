//! Shared fakes for the integration tests
//!
//! Everything here goes through the public collaborator traits, so the tests
//! run without git, cloc or network access.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use repoharvest::core::shutdown::ShutdownFlag;
use repoharvest::core::time::FixedClock;
use repoharvest::scanner::ci::api::{
    ApiError, BuildPage, BuildState, CiApi, CiConnector, CiEndpoint, RemoteBuild,
    RemoteRepository, RepositoryPage, RepositoryRef,
};
use repoharvest::scanner::evolution::measure::Measurer;
use repoharvest::scanner::evolution::vcs::VersionControl;
use repoharvest::scanner::{
    Credential, MemoryStepSink, Measurement, ScanContext, ScanResult, ScanSettings,
};
use repoharvest::store::MemoryStore;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub fn utc(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).unwrap()
}

/// Store, step sink and clock wired into one context
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub steps: Arc<MemoryStepSink>,
    pub clock: Arc<FixedClock>,
    pub ctx: ScanContext,
}

pub fn harness(now: DateTime<Utc>, settings: ScanSettings) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let steps = Arc::new(MemoryStepSink::new());
    let clock = Arc::new(FixedClock::new(now));
    let ctx = ScanContext::new(store.clone(), steps.clone(), clock.clone(), settings);
    Harness {
        store,
        steps,
        clock,
        ctx,
    }
}

/// A single `master` branch with commits at the given instants
pub struct LinearHistory {
    pub commits: Vec<DateTime<Utc>>,
    pub materialized: Mutex<Vec<String>>,
    pub restores: AtomicUsize,
}

impl LinearHistory {
    pub fn new(commits: Vec<DateTime<Utc>>) -> Self {
        Self {
            commits,
            materialized: Mutex::new(Vec::new()),
            restores: AtomicUsize::new(0),
        }
    }

    pub fn materialized(&self) -> Vec<String> {
        self.materialized.lock().unwrap().clone()
    }

    pub fn restores(&self) -> usize {
        self.restores.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VersionControl for LinearHistory {
    async fn first_commit_time(&self, _repo: &Path) -> ScanResult<DateTime<Utc>> {
        Ok(self.commits.iter().min().copied().unwrap_or_else(Utc::now))
    }

    async fn commit_before(
        &self,
        _repo: &Path,
        branch: &str,
        before: DateTime<Utc>,
    ) -> ScanResult<Option<String>> {
        if branch != "master" {
            return Ok(None);
        }
        Ok(self
            .commits
            .iter()
            .filter(|at| **at < before)
            .max()
            .map(|at| format!("{:x}", at.timestamp())))
    }

    async fn materialize(&self, _repo: &Path, commit: &str) -> ScanResult<()> {
        self.materialized.lock().unwrap().push(commit.to_string());
        Ok(())
    }

    async fn restore(&self, _repo: &Path) -> ScanResult<()> {
        self.restores.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn current_branch(&self, _repo: &Path) -> ScanResult<Option<String>> {
        Ok(Some("master".to_string()))
    }
}

/// Same measurement every time, counting calls
#[derive(Default)]
pub struct CountingMeasurer {
    pub calls: AtomicUsize,
    /// Raised on the first measurement when set
    pub interrupt: Option<ShutdownFlag>,
}

impl CountingMeasurer {
    pub fn interrupting(shutdown: ShutdownFlag) -> Self {
        Self {
            interrupt: Some(shutdown),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Measurer for CountingMeasurer {
    async fn measure(&self, _tree: &Path) -> ScanResult<Measurement> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(shutdown) = &self.interrupt {
            shutdown.trigger();
        }
        Ok(Measurement {
            code_lines: 420,
            comment_lines: 42,
            blank_lines: 7,
            person_years: 0.08,
            estimated_cost: 5_600.0,
            ..Measurement::default()
        })
    }
}

/// Jobs 1..=N, each with one build in the given raw state
#[derive(Default)]
pub struct PagedCi {
    pub jobs: u64,
    pub building: Vec<u64>,
    pub builds: HashMap<u64, RemoteBuild>,
    pub failing: bool,
    pub page_requests: AtomicUsize,
    pub build_requests: AtomicUsize,
}

impl PagedCi {
    pub fn new(jobs: u64) -> Self {
        let builds = (1..=jobs)
            .map(|job| (job, remote_build(job * 10, "passed", Some(60))))
            .collect();
        Self {
            jobs,
            builds,
            ..Self::default()
        }
    }

    pub fn page_requests(&self) -> usize {
        self.page_requests.load(Ordering::SeqCst)
    }

    pub fn build_requests(&self) -> usize {
        self.build_requests.load(Ordering::SeqCst)
    }
}

pub fn remote_build(id: u64, state: &str, duration: Option<u64>) -> RemoteBuild {
    RemoteBuild {
        id,
        repository: Some(RepositoryRef {
            slug: "apache/thing".into(),
        }),
        started_at: Some("2021-03-01T10:00:00Z".into()),
        finished_at: duration.map(|_| "2021-03-01T10:02:00Z".to_string()),
        duration,
        state: state.into(),
    }
}

#[async_trait]
impl CiApi for PagedCi {
    async fn repositories(&self, offset: usize, limit: usize) -> Result<RepositoryPage, ApiError> {
        self.page_requests.fetch_add(1, Ordering::SeqCst);
        let first = offset as u64 + 1;
        let last = (offset + limit) as u64;
        Ok(RepositoryPage {
            repositories: (first..=last.min(self.jobs))
                .map(|id| RemoteRepository {
                    id,
                    last_started_build: Some(BuildState {
                        state: Some(
                            if self.building.contains(&id) { "started" } else { "passed" }
                                .to_string(),
                        ),
                    }),
                })
                .collect(),
        })
    }

    async fn builds(&self, job_id: u64) -> Result<BuildPage, ApiError> {
        self.build_requests.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            return Err(ApiError::Status {
                status: 404,
                url: self.builds_url(job_id),
            });
        }
        Ok(BuildPage {
            builds: self.builds.get(&job_id).cloned().into_iter().collect(),
        })
    }

    fn builds_url(&self, job_id: u64) -> String {
        format!("fake://repo/{}/builds", job_id)
    }
}

/// Hands out one shared API regardless of endpoint
pub struct StaticConnector(pub Arc<PagedCi>);

impl CiConnector for StaticConnector {
    fn connect(&self, _endpoint: &CiEndpoint, _credential: &Credential) -> ScanResult<Arc<dyn CiApi>> {
        Ok(self.0.clone())
    }
}
