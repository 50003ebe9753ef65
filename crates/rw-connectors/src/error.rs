//! Connector error taxonomy and shared configuration types.

use crate::secret::Secret;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur while talking to an external service.
#[derive(Error, Debug, Clone)]
pub enum ConnectorError {
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Authorization denied: {0}")]
    AuthorizationDenied(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Rate limited: retry after {0} seconds")]
    RateLimited(u64),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for connector operations.
pub type ConnectorResult<T> = Result<T, ConnectorError>;

/// Configuration for an HTTP connector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectorConfig {
    /// Connector name, used in logs.
    pub name: String,
    /// Base URL for the API.
    pub base_url: String,
    /// Authentication configuration.
    pub auth: AuthConfig,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Whether to verify TLS certificates.
    pub verify_tls: bool,
    /// Additional headers to include on every request.
    pub headers: HashMap<String, String>,
}

impl ConnectorConfig {
    /// Creates a config with the defaults used by every connector in this
    /// workspace: 30 second timeout, TLS verification on, no extra headers.
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, auth: AuthConfig) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            auth,
            timeout_secs: 30,
            verify_tls: true,
            headers: HashMap::new(),
        }
    }
}

/// Authentication configuration.
///
/// Credential fields use [`Secret`] so sensitive data is zeroized when no
/// longer needed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthConfig {
    /// No authentication.
    None,
    /// Static bearer token.
    BearerToken {
        /// The bearer token (zeroized on drop).
        token: Secret,
    },
    /// OAuth2 client-credentials grant.
    OAuth2 {
        /// The client ID.
        client_id: String,
        /// The client secret (zeroized on drop).
        client_secret: Secret,
        /// The token endpoint URL.
        token_url: String,
    },
}
