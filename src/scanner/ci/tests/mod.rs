//! CI scanner tests
//!
//! A paged fake API answers from a script and counts requests.


use crate::scanner::ci::api::{
    ApiError, BuildPage, BuildState, CiApi, CiConnector, CiEndpoint, RemoteBuild,
    RemoteRepository, RepositoryPage, RepositoryRef,
};
use crate::scanner::error::{ScanError, ScanResult};
use crate::scanner::types::Credential;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Default)]
pub(super) struct FakeCiApi {
    /// Repository ids per page, in request order
    pub pages: Vec<Vec<u64>>,
    /// Ids whose latest build is running
    pub building: HashSet<u64>,
    pub builds: HashMap<u64, Vec<RemoteBuild>>,
    /// Status returned for the repository listing, instead of pages
    pub listing_status: Option<u16>,
    /// Jobs whose build listing always fails with this error
    pub failing_jobs: HashMap<u64, ApiError>,
    /// Jobs whose build listing fails once with a transport error
    pub flaky_jobs: Mutex<HashSet<u64>>,
    pub page_requests: AtomicUsize,
    pub build_requests: AtomicUsize,
}

impl FakeCiApi {
    /// Repository ids 1..=total split into pages of `page_size`
    pub fn with_repositories(total: u64, page_size: usize) -> Self {
        let ids: Vec<u64> = (1..=total).collect();
        let mut pages: Vec<Vec<u64>> = ids.chunks(page_size).map(<[u64]>::to_vec).collect();
        if pages.last().map(|page| page.len() == page_size).unwrap_or(true) {
            pages.push(Vec::new());
        }
        Self {
            pages,
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

pub(super) fn build(id: u64, state: &str, duration: Option<u64>) -> RemoteBuild {
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
impl CiApi for FakeCiApi {
    async fn repositories(&self, offset: usize, limit: usize) -> Result<RepositoryPage, ApiError> {
        let request = self.page_requests.fetch_add(1, Ordering::SeqCst);
        let url = format!("fake://repos?offset={}&limit={}", offset, limit);
        if let Some(status) = self.listing_status {
            return Err(ApiError::Status { status, url });
        }
        let ids = self.pages.get(request).cloned().unwrap_or_default();
        Ok(RepositoryPage {
            repositories: ids
                .into_iter()
                .map(|id| RemoteRepository {
                    id,
                    last_started_build: Some(BuildState {
                        state: Some(
                            if self.building.contains(&id) {
                                "started"
                            } else {
                                "passed"
                            }
                            .to_string(),
                        ),
                    }),
                })
                .collect(),
        })
    }

    async fn builds(&self, job_id: u64) -> Result<BuildPage, ApiError> {
        self.build_requests.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.failing_jobs.get(&job_id) {
            return Err(err.clone());
        }
        if self.flaky_jobs.lock().unwrap().remove(&job_id) {
            return Err(ApiError::Transport {
                url: self.builds_url(job_id),
                message: "connection reset".into(),
            });
        }
        Ok(BuildPage {
            builds: self.builds.get(&job_id).cloned().unwrap_or_default(),
        })
    }

    fn builds_url(&self, job_id: u64) -> String {
        format!("fake://repo/{}/builds", job_id)
    }
}

/// Hands out the same fake API and remembers the credential it was given
pub(super) struct FakeConnector {
    pub api: Arc<FakeCiApi>,
    pub seen_tokens: Mutex<Vec<String>>,
    pub seen_endpoints: Mutex<Vec<CiEndpoint>>,
}

impl FakeConnector {
    pub fn new(api: FakeCiApi) -> Self {
        Self {
            api: Arc::new(api),
            seen_tokens: Mutex::new(Vec::new()),
            seen_endpoints: Mutex::new(Vec::new()),
        }
    }
}

impl CiConnector for FakeConnector {
    fn connect(&self, endpoint: &CiEndpoint, credential: &Credential) -> ScanResult<Arc<dyn CiApi>> {
        self.seen_tokens
            .lock()
            .map_err(|_| ScanError::Internal {
                message: "poisoned".into(),
            })?
            .push(credential.expose().to_string());
        self.seen_endpoints.lock().unwrap().push(endpoint.clone());
        Ok(self.api.clone())
    }
}
