use std::collections::HashMap;
use std::env;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use thiserror::Error;

use crate::error::AppError;

/// Fallback used when a display name cannot be resolved.
pub const UNKNOWN_NAME: &str = "unknown";

const DEFAULT_TIMEOUT_MS: u64 = 3000;

/// Resolution failures. `NotFound` is a definitive answer from the peer
/// service; `Transport` covers timeouts and remote errors.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("name not found")]
    NotFound,

    #[error("transport error: {0}")]
    Transport(String),
}

#[derive(Clone, Debug)]
pub struct ResolverConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl ResolverConfig {
    pub fn new_from_env() -> Result<Self, AppError> {
        let base_url = env::var("RESOLVER_BASE_URL")
            .map_err(|_| AppError::BadRequest("RESOLVER_BASE_URL is not set".to_string()))?;
        let timeout_ms = env::var("RESOLVER_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_MS);

        Ok(Self {
            base_url,
            timeout: Duration::from_millis(timeout_ms),
        })
    }
}

/// Display-name lookups against the sibling common-data service.
#[async_trait]
pub trait NameResolver: Send + Sync {
    async fn resolve_hospital_name(&self, hoscode: &str) -> Result<String, ResolveError>;
    async fn resolve_department_name(
        &self,
        hoscode: &str,
        depcode: &str,
    ) -> Result<String, ResolveError>;
}

pub struct HttpNameResolver {
    client: Client,
    config: ResolverConfig,
}

impl HttpNameResolver {
    pub fn new(config: ResolverConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AppError::BadRequest(format!("Failed to build http client: {}", e)))?;
        Ok(Self { client, config })
    }

    async fn get_name(&self, path: &str) -> Result<String, ResolveError> {
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), path);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ResolveError::Transport(e.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(ResolveError::NotFound);
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ResolveError::Transport(format!(
                "resolver error {}: {}",
                status, body
            )));
        }

        let name = response
            .text()
            .await
            .map_err(|e| ResolveError::Transport(e.to_string()))?;
        if name.is_empty() {
            return Err(ResolveError::NotFound);
        }
        Ok(name)
    }
}

#[async_trait]
impl NameResolver for HttpNameResolver {
    async fn resolve_hospital_name(&self, hoscode: &str) -> Result<String, ResolveError> {
        self.get_name(&format!("/api/cmn/name/hospital/{}", hoscode))
            .await
    }

    async fn resolve_department_name(
        &self,
        hoscode: &str,
        depcode: &str,
    ) -> Result<String, ResolveError> {
        self.get_name(&format!("/api/cmn/name/department/{}/{}", hoscode, depcode))
            .await
    }
}

/// In-memory resolver for tests and offline runs. Hospital names key on
/// `hoscode`, department names on `hoscode:depcode`.
#[derive(Default)]
pub struct StaticNameResolver {
    hospitals: HashMap<String, String>,
    departments: HashMap<String, String>,
}

impl StaticNameResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hospital(mut self, hoscode: &str, name: &str) -> Self {
        self.hospitals.insert(hoscode.to_string(), name.to_string());
        self
    }

    pub fn with_department(mut self, hoscode: &str, depcode: &str, name: &str) -> Self {
        self.departments
            .insert(format!("{}:{}", hoscode, depcode), name.to_string());
        self
    }
}

#[async_trait]
impl NameResolver for StaticNameResolver {
    async fn resolve_hospital_name(&self, hoscode: &str) -> Result<String, ResolveError> {
        self.hospitals
            .get(hoscode)
            .cloned()
            .ok_or(ResolveError::NotFound)
    }

    async fn resolve_department_name(
        &self,
        hoscode: &str,
        depcode: &str,
    ) -> Result<String, ResolveError> {
        self.departments
            .get(&format!("{}:{}", hoscode, depcode))
            .cloned()
            .ok_or(ResolveError::NotFound)
    }
}
