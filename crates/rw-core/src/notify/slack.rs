//! Slack webhook channel.
//!
//! Renders the run result as a Slack attachment with per-stage fields, so
//! the summary reads as a table in the channel.

use super::{Notifier, NotifyError};
use crate::model::RunResult;
use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, instrument};

/// Sends run reports to a Slack incoming webhook.
pub struct SlackNotifier {
    webhook_url: String,
    channel: Option<String>,
    #[cfg(not(test))]
    client: reqwest::Client,
}

impl SlackNotifier {
    /// Creates a Slack notifier for a webhook URL.
    pub fn new(webhook_url: impl Into<String>) -> Result<Self, NotifyError> {
        let url = webhook_url.into();
        if url.is_empty() {
            return Err(NotifyError::InvalidConfig(
                "Slack webhook URL cannot be empty".to_string(),
            ));
        }

        Ok(Self {
            webhook_url: url,
            channel: None,
            #[cfg(not(test))]
            client: reqwest::Client::new(),
        })
    }

    /// Sets the channel override (if the webhook allows it).
    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    /// Formats a run result as a Slack message.
    fn format_message(&self, result: &RunResult) -> SlackMessage {
        let color = if result.is_success() {
            "#36a64f"
        } else {
            "#f44336"
        };

        let mut fields = vec![
            SlackField::new("Discovered", result.discovered),
            SlackField::new("Enriched", result.enriched),
            SlackField::new("Already registered", result.existing),
            SlackField::new("New registrations", result.new_registrations),
            SlackField::new("Failed registrations", result.failed_registrations),
        ];

        if result.cleanup_enabled {
            fields.push(SlackField::new("Cleanup candidates", result.cleanup_candidates));
            fields.push(SlackField::new("Deleted", result.deleted_registrations));
            fields.push(SlackField::new("Failed deletions", result.failed_deletions));
        }

        let mut lines = Vec::new();
        for outcome in &result.registered {
            lines.push(format!("registered {}", outcome.url));
        }
        for outcome in &result.registration_failures {
            lines.push(format!(
                "failed {} ({})",
                outcome.url,
                outcome.error.as_deref().unwrap_or("unknown error")
            ));
        }
        for outcome in &result.deletions {
            lines.push(format!("deleted {}", outcome.url));
        }
        for error in &result.errors {
            lines.push(format!("error: {}", error));
        }

        let title = if result.dry_run {
            "Registry reconciliation (dry run)"
        } else {
            "Registry reconciliation"
        };

        SlackMessage {
            channel: self.channel.clone(),
            text: format!("{} - session {}", title, result.session_id),
            attachments: vec![SlackAttachment {
                color: color.to_string(),
                title: title.to_string(),
                text: lines.join("\n"),
                fields,
                footer: Some("registry-warden".to_string()),
                ts: Some(result.started_at.timestamp()),
            }],
        }
    }

    #[cfg(not(test))]
    async fn post(&self, message: &SlackMessage) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.webhook_url)
            .json(message)
            .send()
            .await
            .map_err(|e| NotifyError::SendFailed(format!("HTTP request failed: {}", e)))?;

        if response.status().is_success() {
            Ok(())
        } else if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            Err(NotifyError::RateLimited(
                "Slack rate limit exceeded".to_string(),
            ))
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(NotifyError::SendFailed(format!(
                "Slack returned {}: {}",
                status, body
            )))
        }
    }

    /// Mock send for tests: formatting is verified without HTTP calls.
    #[cfg(test)]
    async fn post(&self, _message: &SlackMessage) -> Result<(), NotifyError> {
        Ok(())
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    #[instrument(skip(self, result), fields(webhook_url = %self.webhook_url, session_id = %result.session_id))]
    async fn send(&self, result: &RunResult) -> Result<(), NotifyError> {
        let message = self.format_message(result);
        debug!("Sending run report to Slack");
        self.post(&message).await
    }

    fn name(&self) -> &str {
        "slack"
    }
}

/// Slack message payload.
#[derive(Debug, Serialize)]
struct SlackMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    channel: Option<String>,
    text: String,
    attachments: Vec<SlackAttachment>,
}

#[derive(Debug, Serialize)]
struct SlackAttachment {
    color: String,
    title: String,
    text: String,
    fields: Vec<SlackField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    footer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ts: Option<i64>,
}

#[derive(Debug, Serialize)]
struct SlackField {
    title: String,
    value: String,
    short: bool,
}

impl SlackField {
    fn new(title: &str, value: usize) -> Self {
        Self {
            title: title.to_string(),
            value: value.to_string(),
            short: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Outcome;

    #[test]
    fn empty_webhook_url_is_rejected() {
        assert!(SlackNotifier::new("").is_err());
    }

    #[test]
    fn message_carries_stage_fields() {
        let notifier = SlackNotifier::new("https://hooks.slack.com/services/T/B/X")
            .unwrap()
            .with_channel("#registry-ops");

        let mut result = RunResult::new(false, true);
        result.discovered = 3;
        result.enriched = 2;
        result.record_registration(Outcome::success("https://a", "id-1"));
        result.record_registration(Outcome::failure("https://b", "denied"));

        let message = notifier.format_message(&result);

        assert_eq!(message.channel.as_deref(), Some("#registry-ops"));
        assert_eq!(message.attachments.len(), 1);

        let attachment = &message.attachments[0];
        let titles: Vec<&str> = attachment.fields.iter().map(|f| f.title.as_str()).collect();
        assert!(titles.contains(&"Discovered"));
        assert!(titles.contains(&"Cleanup candidates"));
        assert!(attachment.text.contains("registered https://a"));
        assert!(attachment.text.contains("failed https://b (denied)"));
    }

    #[test]
    fn color_tracks_run_success() {
        let notifier = SlackNotifier::new("https://hooks.slack.com/test").unwrap();

        let ok = RunResult::new(false, false);
        assert_eq!(notifier.format_message(&ok).attachments[0].color, "#36a64f");

        let mut failed = RunResult::new(false, false);
        failed.errors.push("authentication failed".to_string());
        assert_eq!(notifier.format_message(&failed).attachments[0].color, "#f44336");
    }

    #[test]
    fn dry_run_marked_in_title() {
        let notifier = SlackNotifier::new("https://hooks.slack.com/test").unwrap();
        let result = RunResult::new(true, false);
        let message = notifier.format_message(&result);
        assert!(message.text.contains("dry run"));
    }

    #[test]
    fn cleanup_fields_hidden_when_disabled() {
        let notifier = SlackNotifier::new("https://hooks.slack.com/test").unwrap();
        let result = RunResult::new(false, false);
        let message = notifier.format_message(&result);
        let titles: Vec<&str> = message.attachments[0]
            .fields
            .iter()
            .map(|f| f.title.as_str())
            .collect();
        assert!(!titles.contains(&"Cleanup candidates"));
    }

    #[tokio::test]
    async fn send_formats_without_http_in_tests() {
        let notifier = SlackNotifier::new("https://hooks.slack.com/test").unwrap();
        let result = RunResult::new(false, false);
        assert!(notifier.send(&result).await.is_ok());
    }
}
