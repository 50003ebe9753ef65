//! Generic webhook channel.
//!
//! Posts the structured run result as JSON to a configured endpoint, for
//! downstream systems that ingest machine-readable events (queues, audit
//! pipelines).

use super::{Notifier, NotifyError};
use crate::model::RunResult;
use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, instrument};

/// Sends the structured run result to a generic HTTP endpoint.
pub struct WebhookNotifier {
    url: String,
    #[cfg(not(test))]
    client: reqwest::Client,
}

impl WebhookNotifier {
    /// Creates a webhook notifier for an endpoint URL.
    pub fn new(url: impl Into<String>) -> Result<Self, NotifyError> {
        let url = url.into();
        if url.is_empty() {
            return Err(NotifyError::InvalidConfig(
                "Webhook URL cannot be empty".to_string(),
            ));
        }
        Ok(Self {
            url,
            #[cfg(not(test))]
            client: reqwest::Client::new(),
        })
    }

    fn payload<'a>(&self, result: &'a RunResult) -> WebhookPayload<'a> {
        WebhookPayload {
            event: "registry_warden.run_completed",
            success: result.is_success(),
            result,
        }
    }

    #[cfg(not(test))]
    async fn post(&self, payload: &WebhookPayload<'_>) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.url)
            .json(payload)
            .send()
            .await
            .map_err(|e| NotifyError::SendFailed(format!("HTTP request failed: {}", e)))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(NotifyError::SendFailed(format!(
                "Webhook returned {}",
                response.status()
            )))
        }
    }

    #[cfg(test)]
    async fn post(&self, _payload: &WebhookPayload<'_>) -> Result<(), NotifyError> {
        Ok(())
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    #[instrument(skip(self, result), fields(session_id = %result.session_id))]
    async fn send(&self, result: &RunResult) -> Result<(), NotifyError> {
        let payload = self.payload(result);
        debug!(url = %self.url, "Posting run result to webhook");
        self.post(&payload).await
    }

    fn name(&self) -> &str {
        "webhook"
    }
}

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    event: &'static str,
    success: bool,
    result: &'a RunResult,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Outcome;

    #[test]
    fn empty_url_is_rejected() {
        assert!(WebhookNotifier::new("").is_err());
    }

    #[test]
    fn payload_wraps_the_full_result() {
        let notifier = WebhookNotifier::new("https://events.example.com/hook").unwrap();

        let mut result = RunResult::new(false, false);
        result.record_registration(Outcome::success("https://a", "id-1"));

        let payload = notifier.payload(&result);
        let json = serde_json::to_value(&payload).unwrap();

        assert_eq!(json["event"], "registry_warden.run_completed");
        assert_eq!(json["success"], true);
        assert_eq!(json["result"]["new_registrations"], 1);
        assert_eq!(json["result"]["registered"][0]["url"], "https://a");
    }

    #[tokio::test]
    async fn send_succeeds_in_tests_without_http() {
        let notifier = WebhookNotifier::new("https://events.example.com/hook").unwrap();
        assert!(notifier.send(&RunResult::new(false, false)).await.is_ok());
    }
}
