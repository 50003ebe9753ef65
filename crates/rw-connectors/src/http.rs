//! Shared HTTP client for the Falcon connectors.
//!
//! Handles OAuth2 token acquisition and caching, request timeouts, rate
//! limiting, and the mapping from transport/status failures onto the
//! [`ConnectorError`] taxonomy. Each request is sent exactly once: the job
//! runs on a schedule and a full rerun is the retry mechanism, so there is
//! no per-request retry loop.

use crate::error::{AuthConfig, ConnectorConfig, ConnectorError, ConnectorResult};
use crate::secret::Secret;
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter as GovernorRateLimiter,
};
use reqwest::{Client, Response, StatusCode};
use serde::Serialize;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

type RateLimiterType = GovernorRateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// HTTP client with OAuth2 token caching and rate limiting.
pub struct HttpClient {
    client: Client,
    config: ConnectorConfig,
    /// Current OAuth2 token (if using OAuth2 auth).
    oauth_token: Arc<RwLock<Option<OAuthToken>>>,
    rate_limiter: Option<Arc<RateLimiterType>>,
}

/// OAuth2 token with expiration. The access token is zeroized on drop.
#[derive(Clone)]
struct OAuthToken {
    access_token: Secret,
    expires_at: std::time::Instant,
}

impl std::fmt::Debug for OAuthToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthToken")
            .field("access_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Rate limiter configuration.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum requests per period.
    pub max_requests: u32,
    /// Period duration.
    pub period: Duration,
    /// Maximum burst size.
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 100,
            period: Duration::from_secs(60),
            burst_size: 10,
        }
    }
}

impl HttpClient {
    /// Creates a new HTTP client from connector configuration.
    pub fn new(config: ConnectorConfig) -> ConnectorResult<Self> {
        Self::with_rate_limit(config, None)
    }

    /// Creates a new HTTP client with rate limiting.
    pub fn with_rate_limit(
        config: ConnectorConfig,
        rate_limit: Option<RateLimitConfig>,
    ) -> ConnectorResult<Self> {
        // TLS verification cannot be disabled in release builds.
        let verify_tls = if !config.verify_tls {
            #[cfg(debug_assertions)]
            {
                warn!(
                    base_url = %config.base_url,
                    connector_name = %config.name,
                    "TLS certificate verification DISABLED in development mode"
                );
                false
            }
            #[cfg(not(debug_assertions))]
            {
                warn!(
                    base_url = %config.base_url,
                    connector_name = %config.name,
                    "Attempted to disable TLS verification in production - request IGNORED"
                );
                true
            }
        } else {
            true
        };

        let mut builder = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .danger_accept_invalid_certs(!verify_tls)
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90));

        let mut headers = reqwest::header::HeaderMap::new();
        for (key, value) in &config.headers {
            if let (Ok(name), Ok(val)) = (
                reqwest::header::HeaderName::try_from(key.as_str()),
                reqwest::header::HeaderValue::try_from(value.as_str()),
            ) {
                headers.insert(name, val);
            }
        }
        builder = builder.default_headers(headers);

        let client = builder
            .build()
            .map_err(|e| ConnectorError::ConfigError(e.to_string()))?;

        let rate_limiter = rate_limit.map(|rl| {
            let quota = Quota::with_period(rl.period / rl.max_requests)
                .expect("Invalid rate limit period")
                .allow_burst(NonZeroU32::new(rl.burst_size).unwrap_or(NonZeroU32::MIN));
            Arc::new(GovernorRateLimiter::direct(quota))
        });

        Ok(Self {
            client,
            config,
            oauth_token: Arc::new(RwLock::new(None)),
            rate_limiter,
        })
    }

    /// Builds a URL from a path.
    pub fn build_url(&self, path: &str) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{}/{}", base, path)
    }

    /// Gets the base URL.
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Executes a GET request.
    pub async fn get(&self, path: &str) -> ConnectorResult<Response> {
        let url = self.build_url(path);
        self.execute(self.client.get(&url)).await
    }

    /// Executes a POST request with a JSON body.
    pub async fn post<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> ConnectorResult<Response> {
        let url = self.build_url(path);
        self.execute(self.client.post(&url).json(body)).await
    }

    /// Executes a DELETE request.
    pub async fn delete(&self, path: &str) -> ConnectorResult<Response> {
        let url = self.build_url(path);
        self.execute(self.client.delete(&url)).await
    }

    /// Forces token acquisition for OAuth2-configured clients, so callers
    /// can verify credentials before starting real work. A no-op for other
    /// auth modes.
    pub async fn ensure_authenticated(&self) -> ConnectorResult<()> {
        if let AuthConfig::OAuth2 {
            client_id,
            client_secret,
            token_url,
        } = &self.config.auth
        {
            self.get_oauth_token(client_id, client_secret, token_url)
                .await?;
        }
        Ok(())
    }

    /// Executes a request once: rate limiting, authentication, transport
    /// error mapping. Auth and rate-limit statuses are mapped to their error
    /// variants; other statuses are returned to the caller, which owns the
    /// interpretation of the response body.
    async fn execute(&self, mut request: reqwest::RequestBuilder) -> ConnectorResult<Response> {
        if let Some(limiter) = &self.rate_limiter {
            limiter.until_ready().await;
        }

        request = self.add_auth(request).await?;

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ConnectorError::Timeout(e.to_string())
            } else if e.is_connect() {
                ConnectorError::ConnectionFailed(e.to_string())
            } else {
                ConnectorError::RequestFailed(e.to_string())
            }
        })?;

        match response.status() {
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(60);
                Err(ConnectorError::RateLimited(retry_after))
            }
            StatusCode::UNAUTHORIZED => {
                Err(ConnectorError::AuthenticationFailed("Unauthorized".into()))
            }
            StatusCode::FORBIDDEN => Err(ConnectorError::AuthorizationDenied("Forbidden".into())),
            _ => Ok(response),
        }
    }

    /// Adds authentication to a request.
    async fn add_auth(
        &self,
        request: reqwest::RequestBuilder,
    ) -> ConnectorResult<reqwest::RequestBuilder> {
        match &self.config.auth {
            AuthConfig::None => Ok(request),

            AuthConfig::BearerToken { token } => {
                Ok(request.header("Authorization", format!("Bearer {}", token.expose())))
            }

            AuthConfig::OAuth2 {
                client_id,
                client_secret,
                token_url,
            } => {
                let token = self
                    .get_oauth_token(client_id, client_secret, token_url)
                    .await?;
                Ok(request.header("Authorization", format!("Bearer {}", token.expose())))
            }
        }
    }

    /// Gets or refreshes an OAuth2 token via the client-credentials grant.
    async fn get_oauth_token(
        &self,
        client_id: &str,
        client_secret: &Secret,
        token_url: &str,
    ) -> ConnectorResult<Secret> {
        {
            let token = self.oauth_token.read().await;
            if let Some(t) = &*token {
                if t.expires_at > std::time::Instant::now() + Duration::from_secs(60) {
                    debug!("Reusing cached OAuth2 token");
                    return Ok(t.access_token.clone());
                }
            }
        }

        info!("Fetching new OAuth2 token");

        let params = [
            ("client_id", client_id),
            ("client_secret", client_secret.expose()),
        ];

        let response = self
            .client
            .post(token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| ConnectorError::AuthenticationFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ConnectorError::AuthenticationFailed(format!(
                "OAuth2 token request failed: {}",
                response.status()
            )));
        }

        #[derive(serde::Deserialize)]
        struct TokenResponse {
            access_token: String,
            expires_in: u64,
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e| ConnectorError::InvalidResponse(e.to_string()))?;

        let access_token = Secret::new(token_response.access_token);

        let oauth_token = OAuthToken {
            access_token: access_token.clone(),
            expires_at: std::time::Instant::now() + Duration::from_secs(token_response.expires_in),
        };

        {
            let mut token = self.oauth_token.write().await;
            *token = Some(oauth_token);
        }

        Ok(access_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuthConfig;

    fn test_config() -> ConnectorConfig {
        ConnectorConfig::new("test", "https://api.example.com", AuthConfig::None)
    }

    #[test]
    fn build_url_normalizes_slashes() {
        let client = HttpClient::new(test_config()).unwrap();
        assert_eq!(
            client.build_url("/queries/registries/v1"),
            "https://api.example.com/queries/registries/v1"
        );
        assert_eq!(
            client.build_url("queries/registries/v1"),
            "https://api.example.com/queries/registries/v1"
        );
    }

    #[test]
    fn build_url_trims_trailing_base_slash() {
        let mut config = test_config();
        config.base_url = "https://api.example.com/".to_string();
        let client = HttpClient::new(config).unwrap();
        assert_eq!(client.build_url("/hub"), "https://api.example.com/hub");
    }

    #[test]
    fn rate_limit_config_default() {
        let config = RateLimitConfig::default();
        assert_eq!(config.max_requests, 100);
        assert_eq!(config.period, Duration::from_secs(60));
        assert_eq!(config.burst_size, 10);
    }

    #[tokio::test]
    async fn ensure_authenticated_is_noop_without_oauth() {
        let client = HttpClient::new(test_config()).unwrap();
        assert!(client.ensure_authenticated().await.is_ok());
    }
}
