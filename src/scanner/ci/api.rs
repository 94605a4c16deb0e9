//! Remote CI API boundary
//!
//! Payload types cover only the fields the scanner reads. Unknown fields are
//! ignored and missing optional fields default.

use crate::scanner::error::ScanResult;
use crate::scanner::types::Credential;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

/// One page of the repository listing
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RepositoryPage {
    #[serde(default)]
    pub repositories: Vec<RemoteRepository>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteRepository {
    pub id: u64,
    #[serde(default)]
    pub last_started_build: Option<BuildState>,
}

impl RemoteRepository {
    /// Whether the latest build of this repository is still running
    pub fn is_building(&self) -> bool {
        self.last_started_build
            .as_ref()
            .and_then(|build| build.state.as_deref())
            == Some("started")
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BuildState {
    #[serde(default)]
    pub state: Option<String>,
}

/// Recent builds of one repository
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BuildPage {
    #[serde(default)]
    pub builds: Vec<RemoteBuild>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RemoteBuild {
    pub id: u64,
    #[serde(default)]
    pub repository: Option<RepositoryRef>,
    #[serde(default)]
    pub started_at: Option<String>,
    #[serde(default)]
    pub finished_at: Option<String>,
    #[serde(default)]
    pub duration: Option<u64>,
    #[serde(default)]
    pub state: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RepositoryRef {
    #[serde(default)]
    pub slug: String,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("Unexpected response from {url}: {message}")]
    Decode { url: String, message: String },
}

impl ApiError {
    /// Failures worth another attempt: network trouble and server errors
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Transport { .. } => true,
            ApiError::Status { status, .. } => *status >= 500,
            ApiError::Decode { .. } => false,
        }
    }
}

/// Remote CI service
#[async_trait]
pub trait CiApi: Send + Sync {
    /// One page of active repositories, most recently built first
    async fn repositories(&self, offset: usize, limit: usize) -> Result<RepositoryPage, ApiError>;

    /// Recent builds of one repository
    async fn builds(&self, job_id: u64) -> Result<BuildPage, ApiError>;

    /// Address of a repository's build listing, stored on each record
    fn builds_url(&self, job_id: u64) -> String;
}

/// Which CI host a source talks to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CiEndpoint {
    pub api_base: String,
}

/// Builds an authenticated API client for an endpoint
pub trait CiConnector: Send + Sync {
    fn connect(&self, endpoint: &CiEndpoint, credential: &Credential) -> ScanResult<Arc<dyn CiApi>>;
}
