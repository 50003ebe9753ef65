//! Configuration loading for the registry-warden CLI.
//!
//! Configuration comes from a YAML file with per-field environment
//! variable fallbacks, so the same binary works both as a locally-run tool
//! (file) and as a scheduled job (environment). The loaded config is
//! constructed once and passed by reference; there are no global flags.

use anyhow::{Context, Result};
use rw_connectors::Secret;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Falcon API access.
    #[serde(default)]
    pub falcon: FalconSection,

    /// Engine behavior.
    #[serde(default)]
    pub settings: Settings,

    /// Notification targets.
    #[serde(default)]
    pub notifications: Notifications,
}

/// Falcon API access configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FalconSection {
    /// API base URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// OAuth2 client ID.
    #[serde(default)]
    pub client_id: String,

    /// OAuth2 client secret (zeroized on drop).
    #[serde(default)]
    pub client_secret: Secret,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    rw_connectors::falcon::DEFAULT_BASE_URL.to_string()
}

fn default_timeout() -> u64 {
    30
}

impl Default for FalconSection {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            client_id: String::new(),
            client_secret: Secret::default(),
            timeout_secs: default_timeout(),
        }
    }
}

/// Engine behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Compute and report the diff without performing mutating calls.
    #[serde(default)]
    pub dry_run: bool,

    /// Deregister registrations offline past the threshold.
    #[serde(default = "default_true")]
    pub cleanup_enabled: bool,

    /// Offline age, in days, past which a registration is deleted.
    #[serde(default = "default_cleanup_days")]
    pub cleanup_offline_days: i64,

    /// Result ceiling for the inventory query.
    #[serde(default = "default_discovery_limit")]
    pub discovery_limit: u32,
}

fn default_true() -> bool {
    true
}

fn default_cleanup_days() -> i64 {
    7
}

fn default_discovery_limit() -> u32 {
    1000
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            dry_run: false,
            cleanup_enabled: default_true(),
            cleanup_offline_days: default_cleanup_days(),
            discovery_limit: default_discovery_limit(),
        }
    }
}

/// Notification targets. Both channels are optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Notifications {
    /// Slack incoming-webhook URL.
    #[serde(default)]
    pub slack_webhook_url: Option<String>,

    /// Generic webhook endpoint receiving the structured run result.
    #[serde(default)]
    pub webhook_url: Option<String>,
}

impl AppConfig {
    /// Loads configuration from a YAML file, then applies environment
    /// variable overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config: Self = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.apply_env_overrides();
        Ok(config)
    }

    /// Builds configuration from defaults and the environment alone.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    /// Applies environment variable overrides to every field that has one.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(value) = std::env::var("FALCON_BASE_URL") {
            self.falcon.base_url = value;
        }
        if let Ok(value) = std::env::var("FALCON_CLIENT_ID") {
            self.falcon.client_id = value;
        }
        if let Ok(value) = std::env::var("FALCON_CLIENT_SECRET") {
            self.falcon.client_secret = Secret::new(value);
        }
        if let Ok(value) = std::env::var("DRY_RUN_MODE") {
            self.settings.dry_run = value.eq_ignore_ascii_case("true");
        }
        if let Ok(value) = std::env::var("ENABLE_CLEANUP") {
            self.settings.cleanup_enabled = value.eq_ignore_ascii_case("true");
        }
        if let Ok(value) = std::env::var("CLEANUP_OFFLINE_DAYS") {
            if let Ok(days) = value.parse() {
                self.settings.cleanup_offline_days = days;
            }
        }
        if let Ok(value) = std::env::var("SLACK_WEBHOOK_URL") {
            self.notifications.slack_webhook_url = Some(value);
        }
        if let Ok(value) = std::env::var("NOTIFY_WEBHOOK_URL") {
            self.notifications.webhook_url = Some(value);
        }
    }

    /// Validates the configuration, returning every problem found.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.falcon.client_id.is_empty() {
            problems.push(
                "falcon.client_id is not set (config file or FALCON_CLIENT_ID)".to_string(),
            );
        }
        if self.falcon.client_secret.is_empty() {
            problems.push(
                "falcon.client_secret is not set (config file or FALCON_CLIENT_SECRET)"
                    .to_string(),
            );
        }
        if self.falcon.base_url.is_empty() {
            problems.push("falcon.base_url cannot be empty".to_string());
        } else if !self.falcon.base_url.starts_with("https://") {
            problems.push("falcon.base_url must be an https:// URL".to_string());
        }
        if self.settings.cleanup_offline_days <= 0 {
            problems.push("settings.cleanup_offline_days must be positive".to_string());
        }
        if self.settings.discovery_limit == 0 {
            problems.push("settings.discovery_limit must be positive".to_string());
        }

        problems
    }

    /// Creates a copy with secrets replaced by a redaction marker.
    pub fn redact_secrets(&self) -> Self {
        let mut config = self.clone();
        if !config.falcon.client_secret.is_empty() {
            config.falcon.client_secret = Secret::from("***REDACTED***");
        }
        config
    }
}
