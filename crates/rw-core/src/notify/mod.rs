//! Notification channels for run reports.
//!
//! The engine hands a finished [`RunResult`] to a [`Notifier`]; delivery
//! failure is logged by the pipeline and never fails the run.

mod slack;
mod webhook;

pub use slack::SlackNotifier;
pub use webhook::WebhookNotifier;

use crate::model::RunResult;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

/// Errors that can occur when sending a run report.
#[derive(Error, Debug)]
pub enum NotifyError {
    /// Failed to deliver the report.
    #[error("Failed to send notification: {0}")]
    SendFailed(String),

    /// Invalid channel configuration.
    #[error("Invalid notification configuration: {0}")]
    InvalidConfig(String),

    /// Rate limited by the notification service.
    #[error("Rate limited: {0}")]
    RateLimited(String),
}

/// A channel that can deliver a run report.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Delivers the report.
    async fn send(&self, result: &RunResult) -> Result<(), NotifyError>;

    /// Channel name, for logs.
    fn name(&self) -> &str;
}

/// A notifier that logs the report via tracing. Useful as a default and in
/// tests.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    #[instrument(skip(self, result), fields(session_id = %result.session_id))]
    async fn send(&self, result: &RunResult) -> Result<(), NotifyError> {
        info!(
            new_registrations = result.new_registrations,
            failed_registrations = result.failed_registrations,
            deleted = result.deleted_registrations,
            errors = result.errors.len(),
            "Run report"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}

/// Fans a report out to multiple channels, continuing past individual
/// failures.
pub struct CompositeNotifier {
    notifiers: Vec<Arc<dyn Notifier>>,
}

impl CompositeNotifier {
    /// Creates an empty composite.
    pub fn new() -> Self {
        Self {
            notifiers: Vec::new(),
        }
    }

    /// Adds a channel.
    pub fn add<N: Notifier + 'static>(mut self, notifier: N) -> Self {
        self.notifiers.push(Arc::new(notifier));
        self
    }

    /// Adds a channel already wrapped in `Arc`.
    pub fn add_arc(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifiers.push(notifier);
        self
    }

    /// Returns true if no channels are configured.
    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }
}

impl Default for CompositeNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Notifier for CompositeNotifier {
    #[instrument(skip(self, result), fields(channels = self.notifiers.len()))]
    async fn send(&self, result: &RunResult) -> Result<(), NotifyError> {
        if self.notifiers.is_empty() {
            warn!("No notification channels configured");
            return Ok(());
        }

        let mut failures = Vec::new();
        for notifier in &self.notifiers {
            match notifier.send(result).await {
                Ok(()) => debug!(channel = %notifier.name(), "Report delivered"),
                Err(e) => {
                    error!(channel = %notifier.name(), error = %e, "Report delivery failed");
                    failures.push(format!("{}: {}", notifier.name(), e));
                }
            }
        }

        // Only a total failure is surfaced; partial delivery is good enough.
        if !failures.is_empty() && failures.len() == self.notifiers.len() {
            return Err(NotifyError::SendFailed(failures.join("; ")));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "composite"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct RecordingNotifier {
        calls: AtomicUsize,
        should_fail: bool,
    }

    impl RecordingNotifier {
        fn new(should_fail: bool) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                should_fail,
            }
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, _result: &RunResult) -> Result<(), NotifyError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.should_fail {
                Err(NotifyError::SendFailed("simulated".to_string()))
            } else {
                Ok(())
            }
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    #[tokio::test]
    async fn composite_sends_to_all_channels() {
        let a = Arc::new(RecordingNotifier::new(false));
        let b = Arc::new(RecordingNotifier::new(false));
        let composite = CompositeNotifier::new()
            .add_arc(a.clone())
            .add_arc(b.clone());

        let result = RunResult::new(false, false);
        composite.send(&result).await.unwrap();

        assert_eq!(a.calls.load(Ordering::SeqCst), 1);
        assert_eq!(b.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn composite_tolerates_partial_failure() {
        let failing = Arc::new(RecordingNotifier::new(true));
        let working = Arc::new(RecordingNotifier::new(false));
        let composite = CompositeNotifier::new()
            .add_arc(failing.clone())
            .add_arc(working.clone());

        let result = RunResult::new(false, false);
        assert!(composite.send(&result).await.is_ok());
        assert_eq!(working.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn composite_surfaces_total_failure() {
        let composite = CompositeNotifier::new()
            .add(RecordingNotifier::new(true))
            .add(RecordingNotifier::new(true));

        let result = RunResult::new(false, false);
        assert!(composite.send(&result).await.is_err());
    }

    #[tokio::test]
    async fn empty_composite_is_a_noop() {
        let composite = CompositeNotifier::new();
        assert!(composite.is_empty());
        assert!(composite.send(&RunResult::new(false, false)).await.is_ok());
    }

    #[tokio::test]
    async fn log_notifier_always_succeeds() {
        let notifier = LogNotifier;
        assert!(notifier.send(&RunResult::new(false, false)).await.is_ok());
        assert_eq!(notifier.name(), "log");
    }
}
