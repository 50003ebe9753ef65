//! CrowdStrike Falcon API connectors.
//!
//! All three services (asset inventory, CSPM registration, Container
//! Security) live behind the same base URL and OAuth2 session, so the
//! connectors share a single [`HttpClient`].

mod assets;
mod container_security;
mod cspm;

pub use assets::FalconAssetInventory;
pub use container_security::FalconRegistryStore;
pub use cspm::FalconCspmAccounts;

use crate::error::{AuthConfig, ConnectorConfig, ConnectorResult};
use crate::http::{HttpClient, RateLimitConfig};
use crate::secret::Secret;
use crate::traits::AuthProvider;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Default Falcon API base URL (US-1 region).
pub const DEFAULT_BASE_URL: &str = "https://api.crowdstrike.com";

/// Falcon API configuration.
#[derive(Debug, Clone)]
pub struct FalconConfig {
    /// API base URL.
    pub base_url: String,
    /// OAuth2 client ID.
    pub client_id: String,
    /// OAuth2 client secret (zeroized on drop).
    pub client_secret: Secret,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl FalconConfig {
    /// Builds the shared HTTP client for this configuration.
    ///
    /// Falcon rate limits most endpoints at roughly 5000 requests/hour; the
    /// limiter here stays far inside that.
    pub fn build_client(&self) -> ConnectorResult<Arc<HttpClient>> {
        let base = self.base_url.trim_end_matches('/');
        let mut config = ConnectorConfig::new(
            "falcon",
            base,
            AuthConfig::OAuth2 {
                client_id: self.client_id.clone(),
                client_secret: self.client_secret.clone(),
                token_url: format!("{}/oauth2/token", base),
            },
        );
        config.timeout_secs = self.timeout_secs;

        let rate_limit = RateLimitConfig {
            max_requests: 100,
            period: Duration::from_secs(60),
            burst_size: 20,
        };

        let client = HttpClient::with_rate_limit(config, Some(rate_limit))?;
        info!(base_url = %base, "Falcon client initialized");
        Ok(Arc::new(client))
    }
}

/// Session verifier for the shared Falcon client.
pub struct FalconAuth {
    client: Arc<HttpClient>,
}

impl FalconAuth {
    /// Wraps the shared client.
    pub fn new(client: Arc<HttpClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AuthProvider for FalconAuth {
    async fn verify_credentials(&self) -> ConnectorResult<()> {
        self.client.ensure_authenticated().await
    }
}

/// Query-endpoint response: a list of opaque identifiers.
#[derive(Debug, Deserialize)]
pub(crate) struct IdsResponse {
    #[serde(default)]
    pub resources: Vec<String>,
}

/// Error body shape shared by the Falcon APIs.
#[derive(Debug, Deserialize)]
struct ApiErrors {
    #[serde(default)]
    errors: Vec<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: Option<String>,
}

/// Extracts the first server-provided error message from a response body,
/// falling back to the HTTP status.
pub(crate) fn api_error_message(status: reqwest::StatusCode, body: &str) -> String {
    serde_json::from_str::<ApiErrors>(body)
        .ok()
        .and_then(|e| e.errors.into_iter().next())
        .and_then(|e| e.message)
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()))
}

/// Builds a `?ids=a&ids=b` query suffix for entity endpoints.
pub(crate) fn ids_query(ids: &[String]) -> String {
    ids.iter()
        .map(|id| format!("ids={}", urlencoding::encode(id)))
        .collect::<Vec<_>>()
        .join("&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_message_from_body() {
        let body = r#"{"errors":[{"message":"registry already exists"}]}"#;
        let msg = api_error_message(reqwest::StatusCode::BAD_REQUEST, body);
        assert_eq!(msg, "registry already exists");
    }

    #[test]
    fn error_message_falls_back_to_status() {
        let msg = api_error_message(reqwest::StatusCode::BAD_GATEWAY, "not json");
        assert_eq!(msg, "HTTP 502");

        let msg = api_error_message(reqwest::StatusCode::CONFLICT, r#"{"errors":[]}"#);
        assert_eq!(msg, "HTTP 409");
    }

    #[test]
    fn ids_query_joins_and_encodes() {
        let ids = vec!["a b".to_string(), "c".to_string()];
        assert_eq!(ids_query(&ids), "ids=a%20b&ids=c");
    }

    #[test]
    fn token_url_derived_from_base() {
        let config = FalconConfig {
            base_url: "https://api.crowdstrike.com/".to_string(),
            client_id: "id".to_string(),
            client_secret: Secret::from("secret"),
            timeout_secs: 30,
        };
        let client = config.build_client().unwrap();
        assert_eq!(client.base_url(), "https://api.crowdstrike.com");
    }
}
