//! Query client for the directory service
//!
//! Two layers. [`DirectoryClient`] is the plain HTTP client: it speaks the
//! wire contract and reports every failure. [`QuerySession`] wraps it with
//! the behavior a catalog compilation wants: repeated questions are
//! answered from memory, the first connection-level failure trips a
//! breaker so a down directory costs one timeout instead of hundreds, and
//! failures degrade to empty answers rather than aborting the compilation.
//!
//! Sessions own their cache and breaker state. Start one per compilation;
//! nothing is shared between sessions, so no answer can leak from one
//! compilation into a later one.

use reqwest::{Client, StatusCode};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use thiserror::Error;

use crate::catalog::ParameterMap;

use super::api::CONTENT_TYPE_YAML;

/// Parameter mapping answered by the service: qualified title to
/// parameter map.
pub type ParameterMapping = BTreeMap<String, ParameterMap>;

/// Configuration for the directory client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the directory service, e.g. `http://puppet:8141`
    pub base_url: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Client-side errors
#[derive(Debug, Error)]
pub enum ClientError {
    /// Connection-level failure: refused, timed out, reset mid-body
    #[error("connection failed: {0}")]
    Connection(String),

    /// Service answered with an unexpected status
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    /// Response body was not the expected YAML shape
    #[error("undecodable response: {0}")]
    Decode(String),

    /// Client construction failed
    #[error("client initialization failed: {0}")]
    Init(String),
}

impl ClientError {
    /// True for failures that mean the service itself is unreachable.
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }
}

// ============================================================================
// HTTP Client
// ============================================================================

/// HTTP client for the directory service.
pub struct DirectoryClient {
    http: Client,
    base_url: String,
}

impl DirectoryClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ClientError::Init(e.to_string()))?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Hostnames currently declaring `resource`.
    pub async fn hosts(&self, resource: &str) -> Result<Vec<String>, ClientError> {
        let body = self.get_yaml(&[("resource", resource)]).await?;
        serde_yaml_ng::from_str(&body).map_err(|e| ClientError::Decode(e.to_string()))
    }

    /// Qualified title to parameter map for `resource`.
    pub async fn parameters(&self, resource: &str) -> Result<ParameterMapping, ClientError> {
        let body = self
            .get_yaml(&[("resource", resource), ("parameters", "1")])
            .await?;
        serde_yaml_ng::from_str(&body).map_err(|e| ClientError::Decode(e.to_string()))
    }

    /// Upload a catalog document for `hostname`.
    pub async fn put_catalog(&self, hostname: &str, document: Vec<u8>) -> Result<(), ClientError> {
        let url = format!("{}/{hostname}", self.base_url);
        let response = self
            .http
            .put(&url)
            .header(reqwest::header::CONTENT_TYPE, CONTENT_TYPE_YAML)
            .body(document)
            .send()
            .await
            .map_err(connection_error)?;
        expect_no_content(response).await
    }

    /// Remove the stored catalog for `hostname`.
    pub async fn delete_catalog(&self, hostname: &str) -> Result<(), ClientError> {
        let url = format!("{}/{hostname}", self.base_url);
        let response = self
            .http
            .delete(&url)
            .send()
            .await
            .map_err(connection_error)?;
        expect_no_content(response).await
    }

    async fn get_yaml(&self, query: &[(&str, &str)]) -> Result<String, ClientError> {
        let url = format!("{}/", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(connection_error)?;
        let status = response.status();
        let body = response.text().await.map_err(connection_error)?;
        if status != StatusCode::OK {
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }
}

fn connection_error(e: reqwest::Error) -> ClientError {
    ClientError::Connection(e.to_string())
}

async fn expect_no_content(response: reqwest::Response) -> Result<(), ClientError> {
    let status = response.status();
    if status == StatusCode::NO_CONTENT {
        Ok(())
    } else {
        let body = response.text().await.unwrap_or_default();
        Err(ClientError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

// ============================================================================
// Query Session
// ============================================================================

/// One memoized answer, keyed by the full argument tuple.
#[derive(Debug, Clone)]
enum CachedAnswer {
    Hosts(Vec<String>),
    Parameters(ParameterMapping),
}

/// Per-compilation query session with memoization and fail-fast.
pub struct QuerySession {
    client: DirectoryClient,
    cache: HashMap<(String, bool), CachedAnswer>,
    degraded: bool,
}

impl QuerySession {
    pub fn new(client: DirectoryClient) -> Self {
        Self {
            client,
            cache: HashMap::new(),
            degraded: false,
        }
    }

    /// Whether the fail-fast breaker has tripped.
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Hostnames declaring `resource`; empty once the session is degraded
    /// or when the query fails.
    pub async fn hosts(&mut self, resource: &str) -> Vec<String> {
        if self.degraded {
            return Vec::new();
        }
        let memo_key = (resource.to_string(), false);
        if let Some(CachedAnswer::Hosts(hosts)) = self.cache.get(&memo_key) {
            return hosts.clone();
        }
        match self.client.hosts(resource).await {
            Ok(hosts) => {
                self.cache.insert(memo_key, CachedAnswer::Hosts(hosts.clone()));
                hosts
            }
            Err(e) => {
                self.note_failure(resource, &e);
                Vec::new()
            }
        }
    }

    /// Parameter mapping for `resource`; empty once the session is
    /// degraded or when the query fails.
    pub async fn parameters(&mut self, resource: &str) -> ParameterMapping {
        if self.degraded {
            return ParameterMapping::new();
        }
        let memo_key = (resource.to_string(), true);
        if let Some(CachedAnswer::Parameters(mapping)) = self.cache.get(&memo_key) {
            return mapping.clone();
        }
        match self.client.parameters(resource).await {
            Ok(mapping) => {
                self.cache
                    .insert(memo_key, CachedAnswer::Parameters(mapping.clone()));
                mapping
            }
            Err(e) => {
                self.note_failure(resource, &e);
                ParameterMapping::new()
            }
        }
    }

    fn note_failure(&mut self, resource: &str, error: &ClientError) {
        if error.is_connection() {
            self.degraded = true;
            tracing::warn!(
                resource,
                error = %error,
                "directory unreachable, failing fast for the rest of this session"
            );
        } else {
            tracing::warn!(resource, error = %error, "directory query failed");
        }
    }
}
