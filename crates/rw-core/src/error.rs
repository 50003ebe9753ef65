//! Engine error types.

use rw_connectors::ConnectorError;
use thiserror::Error;

/// A stage-level fetch failure.
///
/// Discovery, credential resolution, and existing-state fetches are
/// fail-soft: the pipeline degrades to empty input rather than aborting.
/// Returning this error (instead of a silent empty collection) lets callers
/// tell "fetch failed" apart from "legitimately empty".
#[derive(Debug, Error)]
#[error("{stage} failed: {source}")]
pub struct FetchError {
    stage: &'static str,
    #[source]
    source: ConnectorError,
}

impl FetchError {
    /// Wraps a connector error with the stage it occurred in.
    pub fn new(stage: &'static str, source: ConnectorError) -> Self {
        Self { stage, source }
    }

    /// The pipeline stage that failed.
    pub fn stage(&self) -> &'static str {
        self.stage
    }

    /// The underlying connector error.
    pub fn source_error(&self) -> &ConnectorError {
        &self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_carries_stage_and_cause() {
        let err = FetchError::new(
            "discovery",
            ConnectorError::Timeout("deadline exceeded".to_string()),
        );
        assert_eq!(err.stage(), "discovery");
        assert_eq!(err.to_string(), "discovery failed: Timeout: deadline exceeded");
    }
}
