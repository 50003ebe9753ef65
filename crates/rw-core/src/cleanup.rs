//! Cleanup classification: which existing registrations may be deleted.
//!
//! Every registration is sorted into one of three buckets under fixed
//! business rules. The rules are deliberately conservative: anything this
//! engine did not provision, and anything with ambiguous activity data, is
//! kept.

use crate::model::{AccountCredential, ExistingRegistration};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// What cleanup decided for a registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupAction {
    /// Leave the registration alone.
    Keep,
    /// The registration is stale and should be deregistered.
    Delete,
    /// The registration was created outside this engine's control (its
    /// account is not visible to the credential pipeline) and must never be
    /// auto-deleted.
    Ignore,
}

/// A classification with its human-readable reason, for the report.
#[derive(Debug, Clone)]
pub struct CleanupDecision {
    /// The decided action.
    pub action: CleanupAction,
    /// Why, in words.
    pub reason: String,
}

/// Classifies one registration.
///
/// `now` is captured once per run by the caller so every registration is
/// judged against the same instant.
pub fn classify(
    registration: &ExistingRegistration,
    credentials: &HashMap<String, AccountCredential>,
    now: DateTime<Utc>,
    offline_threshold: Duration,
) -> CleanupDecision {
    // Rule 1: account unknown to the credential pipeline -> manual
    // registration, hands off. Unparseable URLs land here too since their
    // account_id is None.
    let known_account = registration
        .account_id
        .as_deref()
        .map(|id| credentials.contains_key(id))
        .unwrap_or(false);

    if !known_account {
        return CleanupDecision {
            action: CleanupAction::Ignore,
            reason: format!(
                "account {} not in the credential registration data (manual registration)",
                registration.account_id.as_deref().unwrap_or("unknown")
            ),
        };
    }

    if registration.state == "offline" {
        match &registration.last_activity {
            Some(raw) => match DateTime::parse_from_rfc3339(raw) {
                Ok(last_activity) => {
                    let age = now - last_activity.with_timezone(&Utc);
                    if age > offline_threshold {
                        // Rule 2: offline past the threshold.
                        CleanupDecision {
                            action: CleanupAction::Delete,
                            reason: format!(
                                "offline since {}, older than {} days",
                                raw,
                                offline_threshold.num_days()
                            ),
                        }
                    } else {
                        CleanupDecision {
                            action: CleanupAction::Keep,
                            reason: format!(
                                "offline but within the {} day threshold",
                                offline_threshold.num_days()
                            ),
                        }
                    }
                }
                Err(e) => {
                    // Rule 3: never delete on ambiguous data.
                    warn!(
                        url = %registration.url,
                        last_activity = %raw,
                        error = %e,
                        "Could not parse last_activity; keeping registration"
                    );
                    CleanupDecision {
                        action: CleanupAction::Keep,
                        reason: "offline with unparseable last_activity".to_string(),
                    }
                }
            },
            None => CleanupDecision {
                action: CleanupAction::Keep,
                reason: "offline with no recorded activity".to_string(),
            },
        }
    } else {
        // Rule 4: active/unknown states are kept.
        CleanupDecision {
            action: CleanupAction::Keep,
            reason: format!("state '{}'", registration.state),
        }
    }
}

/// Classifies every registration and returns the deletion candidates, each
/// paired with its decision. Keep/ignore counts are logged for the record.
pub fn cleanup_candidates(
    registrations: &[ExistingRegistration],
    credentials: &HashMap<String, AccountCredential>,
    now: DateTime<Utc>,
    offline_threshold: Duration,
) -> Vec<(ExistingRegistration, CleanupDecision)> {
    let mut candidates = Vec::new();
    let mut kept = 0usize;
    let mut ignored = 0usize;

    for registration in registrations {
        let decision = classify(registration, credentials, now, offline_threshold);
        debug!(
            url = %registration.url,
            action = ?decision.action,
            reason = %decision.reason,
            "Cleanup classification"
        );
        match decision.action {
            CleanupAction::Delete => candidates.push((registration.clone(), decision)),
            CleanupAction::Keep => kept += 1,
            CleanupAction::Ignore => ignored += 1,
        }
    }

    info!(
        delete = candidates.len(),
        keep = kept,
        ignore = ignored,
        "Cleanup analysis complete"
    );
    candidates
}
