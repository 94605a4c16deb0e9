//! Travis CI client (API v3)

use crate::scanner::ci::api::{ApiError, BuildPage, CiApi, CiConnector, CiEndpoint, RepositoryPage};
use crate::scanner::error::{ScanError, ScanResult};
use crate::scanner::types::Credential;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

static TRAVIS_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https?://travis-ci\.(org|com)(/|$)").expect("travis url regex should compile")
});

/// The API endpoint for a Travis source URL, `None` for other hosts
pub fn endpoint_for(source_url: &str) -> Option<CiEndpoint> {
    let captures = TRAVIS_URL.captures(source_url)?;
    let tld = captures.get(1)?.as_str();
    Some(CiEndpoint {
        api_base: format!("https://api.travis-ci.{}", tld),
    })
}

pub struct TravisClient {
    client: reqwest::Client,
    api_base: String,
    token: Credential,
}

impl TravisClient {
    pub fn new(client: reqwest::Client, endpoint: &CiEndpoint, token: Credential) -> Self {
        Self {
            client,
            api_base: endpoint.api_base.trim_end_matches('/').to_string(),
            token,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: String) -> Result<T, ApiError> {
        let response = self
            .client
            .get(&url)
            .header("Travis-API-Version", "3")
            .header("Authorization", format!("token {}", self.token.expose()))
            .send()
            .await
            .map_err(|e| ApiError::Transport {
                url: url.clone(),
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(ApiError::Status {
                status: response.status().as_u16(),
                url,
            });
        }

        response.json::<T>().await.map_err(|e| ApiError::Decode {
            url,
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl CiApi for TravisClient {
    async fn repositories(&self, offset: usize, limit: usize) -> Result<RepositoryPage, ApiError> {
        let url = format!(
            "{}/repos?repository.active=true&sort_by=current_build:desc&offset={}&limit={}&include=repository.last_started_build",
            self.api_base, offset, limit
        );
        self.get_json(url).await
    }

    async fn builds(&self, job_id: u64) -> Result<BuildPage, ApiError> {
        self.get_json(format!("{}?limit=100", self.builds_url(job_id)))
            .await
    }

    fn builds_url(&self, job_id: u64) -> String {
        format!("{}/repo/{}/builds", self.api_base, job_id)
    }
}

/// Creates reqwest-backed Travis clients
#[derive(Debug, Clone)]
pub struct TravisConnector {
    request_timeout: Duration,
}

impl Default for TravisConnector {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl TravisConnector {
    pub fn new(request_timeout: Duration) -> Self {
        Self { request_timeout }
    }
}

impl CiConnector for TravisConnector {
    fn connect(&self, endpoint: &CiEndpoint, credential: &Credential) -> ScanResult<Arc<dyn CiApi>> {
        let client = reqwest::Client::builder()
            .timeout(self.request_timeout)
            .user_agent(concat!("repoharvest/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ScanError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })?;
        Ok(Arc::new(TravisClient::new(client, endpoint, credential.clone())))
    }
}
