//! Run report rendering and notification gating.
//!
//! Pure presentation: everything here displays what the engine already
//! decided, never re-deriving classifications.

use crate::model::RunResult;
use std::fmt::Write;

/// Renders the plain-text run summary.
pub fn render_text(result: &RunResult) -> String {
    let mut out = String::new();

    let _ = writeln!(
        out,
        "Registry reconciliation results (session {})",
        result.session_id
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "Discovered: {} registries", result.discovered);
    let _ = writeln!(out, "Enriched with credentials: {}", result.enriched);
    let _ = writeln!(out, "Already registered: {}", result.existing);
    let _ = writeln!(out, "New registrations: {}", result.new_registrations);
    let _ = writeln!(out, "Failed registrations: {}", result.failed_registrations);

    if result.cleanup_enabled {
        let _ = writeln!(out, "Cleanup candidates: {}", result.cleanup_candidates);
        let _ = writeln!(out, "Deleted registrations: {}", result.deleted_registrations);
        let _ = writeln!(out, "Failed deletions: {}", result.failed_deletions);
    }

    if !result.missing_credentials.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "Registries without account credentials ({}):",
            result.missing_credentials.len()
        );
        for url in &result.missing_credentials {
            let _ = writeln!(out, "  - {}", url);
        }
    }

    if !result.registration_failures.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Registration failures:");
        for outcome in &result.registration_failures {
            let _ = writeln!(
                out,
                "  - {}: {}",
                outcome.url,
                outcome.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    if !result.errors.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Errors:");
        for error in &result.errors {
            let _ = writeln!(out, "  - {}", error);
        }
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "Execution time: {:.2}s", result.duration_secs());
    let _ = writeln!(out, "Dry run: {}", result.dry_run);

    out
}

/// Whether the run warrants a notification: something changed, something
/// failed, or the run recorded errors. A quiet no-op run stays quiet.
pub fn should_notify(result: &RunResult) -> bool {
    result.new_registrations > 0
        || result.failed_registrations > 0
        || result.deleted_registrations > 0
        || result.failed_deletions > 0
        || !result.errors.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Outcome;

    #[test]
    fn text_summary_contains_counts() {
        let mut result = RunResult::new(true, true);
        result.discovered = 5;
        result.enriched = 4;
        result.existing = 2;
        result.record_registration(Outcome::success("https://a", "id-1"));
        result.record_registration(Outcome::failure("https://b", "denied"));
        result.missing_credentials.push("https://c".to_string());
        result.finish();

        let text = render_text(&result);
        assert!(text.contains("Discovered: 5 registries"));
        assert!(text.contains("New registrations: 1"));
        assert!(text.contains("Failed registrations: 1"));
        assert!(text.contains("https://b: denied"));
        assert!(text.contains("https://c"));
        assert!(text.contains("Dry run: true"));
        assert!(text.contains("Cleanup candidates: 0"));
    }

    #[test]
    fn cleanup_section_only_when_enabled() {
        let mut result = RunResult::new(false, false);
        result.finish();
        let text = render_text(&result);
        assert!(!text.contains("Cleanup candidates"));
    }

    #[test]
    fn quiet_runs_do_not_notify() {
        let result = RunResult::new(false, false);
        assert!(!should_notify(&result));
    }

    #[test]
    fn changes_failures_and_errors_notify() {
        let mut registered = RunResult::new(false, false);
        registered.record_registration(Outcome::success("https://a", "id-1"));
        assert!(should_notify(&registered));

        let mut failed = RunResult::new(false, false);
        failed.record_deletion(Outcome::failure("https://a", "boom"));
        assert!(should_notify(&failed));

        let mut errored = RunResult::new(false, false);
        errored.errors.push("authentication failed".to_string());
        assert!(should_notify(&errored));
    }
}
