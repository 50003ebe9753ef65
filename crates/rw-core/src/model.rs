//! Typed records the engine reasons about.
//!
//! Upstream data arrives as loosely-shaped wire records; the constructors
//! here validate required fields at the boundary so missing data cannot
//! travel deeper into the pipeline.

use chrono::{DateTime, Utc};
use rw_connectors::{CspmAccount, NewRegistry, RegistryCredential, RegistryRecord, Secret};
use serde::Serialize;
use uuid::Uuid;

/// Derives the registry URL for an account/region pair.
///
/// This is the diff key between discovery and the target system. The
/// construction must stay the exact inverse of [`account_id_from_url`].
pub fn registry_url(account_id: &str, region: &str) -> String {
    format!("https://{}.dkr.ecr.{}.amazonaws.com", account_id, region)
}

/// Extracts the account ID back out of a registry URL.
///
/// Inverse of [`registry_url`]. Returns `None` for URLs that do not carry
/// an account-shaped host prefix; such registrations are unaddressable and
/// are never touched by cleanup.
pub fn account_id_from_url(url: &str) -> Option<String> {
    let host = url.strip_prefix("https://")?;
    let account = host.split('.').next()?;
    if account.is_empty() {
        None
    } else {
        Some(account.to_string())
    }
}

/// A discovered registry: all inventory resources sharing an account and
/// region, merged into one logical unit.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RegistryGroup {
    /// Cloud account that owns the registry.
    pub account_id: String,
    /// Region the registry lives in.
    pub region: String,
    /// Derived registry URL (the diff key).
    pub registry_url: String,
    /// Repository identifiers, in discovery order. Duplicates allowed.
    pub repositories: Vec<String>,
}

impl RegistryGroup {
    /// Creates an empty group for an account/region pair.
    pub fn new(account_id: impl Into<String>, region: impl Into<String>) -> Self {
        let account_id = account_id.into();
        let region = region.into();
        let registry_url = registry_url(&account_id, &region);
        Self {
            account_id,
            region,
            registry_url,
            repositories: Vec::new(),
        }
    }

    /// The grouping key: `{account_id}_{region}`.
    pub fn group_key(&self) -> String {
        format!("{}_{}", self.account_id, self.region)
    }
}

/// A validated per-account delegated-access credential.
#[derive(Debug, Clone)]
pub struct AccountCredential {
    /// Cloud account identifier.
    pub account_id: String,
    /// IAM role ARN granting the target system read access.
    pub iam_role_arn: String,
    /// External ID for the role assumption (zeroized on drop).
    pub external_id: Secret,
    /// Display name, for report output only.
    pub account_name: String,
}

impl AccountCredential {
    /// Validates a raw CSPM record. Records missing the account ID, role
    /// ARN, or external ID are unusable and rejected.
    pub fn from_record(record: CspmAccount) -> Option<Self> {
        let account_id = record.account_id.filter(|s| !s.is_empty())?;
        let iam_role_arn = record.iam_role_arn.filter(|s| !s.is_empty())?;
        let external_id = record.external_id.filter(|s| !s.is_empty())?;
        Some(Self {
            account_id,
            iam_role_arn,
            external_id,
            account_name: record
                .account_name
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "Unknown".to_string()),
        })
    }
}

/// A discovered registry joined with its account credential.
#[derive(Debug, Clone)]
pub struct EnrichedRegistry {
    /// The discovered registry.
    pub group: RegistryGroup,
    /// The matched credential.
    pub credential: AccountCredential,
}

impl EnrichedRegistry {
    /// Builds the creation request for the target system, with the display
    /// alias derived from account name and region.
    pub fn creation_request(&self) -> NewRegistry {
        NewRegistry {
            url: self.group.registry_url.clone(),
            user_defined_alias: format!(
                "Auto-{}-{}",
                self.credential.account_name, self.group.region
            ),
            credential: RegistryCredential {
                aws_iam_role: self.credential.iam_role_arn.clone(),
                aws_external_id: self.credential.external_id.clone(),
            },
        }
    }
}

/// A registration already known to the target system. Read-only from the
/// engine's perspective except for deletion.
#[derive(Debug, Clone, Serialize)]
pub struct ExistingRegistration {
    /// Opaque handle, required for deletion.
    pub id: String,
    /// Registry URL (the diff key).
    pub url: String,
    /// Account ID parsed back out of the URL, when parseable.
    pub account_id: Option<String>,
    /// Lifecycle state; "offline" drives cleanup.
    pub state: String,
    /// Last activity timestamp as received, ISO-8601.
    pub last_activity: Option<String>,
    /// Creation timestamp as received.
    pub created_at: Option<String>,
    /// Last update timestamp as received.
    pub updated_at: Option<String>,
}

impl ExistingRegistration {
    /// Converts a wire record, keeping only ECR-type registrations that
    /// carry a URL. Other registry types coexist in the target system and
    /// must never be touched.
    pub fn from_record(record: RegistryRecord) -> Option<Self> {
        if record.registry_type != "ecr" {
            return None;
        }
        let url = record.url.filter(|s| !s.is_empty())?;
        let account_id = account_id_from_url(&url);
        Some(Self {
            id: record.id,
            account_id,
            state: record.state.unwrap_or_else(|| "unknown".to_string()),
            last_activity: record.last_activity,
            created_at: record.created_at,
            updated_at: record.updated_at,
            url,
        })
    }
}

/// The result of a single register or deregister attempt.
#[derive(Debug, Clone, Serialize)]
pub struct Outcome {
    /// Registry URL the attempt was for.
    pub url: String,
    /// Whether the call succeeded.
    pub success: bool,
    /// Remote identifier on success.
    pub remote_id: Option<String>,
    /// Error message on failure.
    pub error: Option<String>,
}

impl Outcome {
    /// A successful outcome carrying the remote identifier.
    pub fn success(url: impl Into<String>, remote_id: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            success: true,
            remote_id: Some(remote_id.into()),
            error: None,
        }
    }

    /// A failed outcome carrying the error message.
    pub fn failure(url: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            success: false,
            remote_id: None,
            error: Some(error.into()),
        }
    }
}

/// Accumulator for one reconciliation run.
///
/// Mutated additively through the pipeline stages, returned once at the
/// end, never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    /// Unique identifier for this run.
    pub session_id: String,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished.
    pub finished_at: Option<DateTime<Utc>>,
    /// Whether mutating calls were suppressed.
    pub dry_run: bool,
    /// Whether the cleanup stage was enabled.
    pub cleanup_enabled: bool,

    /// Registries discovered from the inventory.
    pub discovered: usize,
    /// Registries successfully matched with a credential.
    pub enriched: usize,
    /// Registrations already present in the target system.
    pub existing: usize,
    /// Successful new registrations.
    pub new_registrations: usize,
    /// Failed registration attempts.
    pub failed_registrations: usize,
    /// Registrations classified for deletion.
    pub cleanup_candidates: usize,
    /// Successful deletions.
    pub deleted_registrations: usize,
    /// Failed deletion attempts.
    pub failed_deletions: usize,

    /// Per-entity outcomes for successful registrations.
    pub registered: Vec<Outcome>,
    /// Per-entity outcomes for failed registrations.
    pub registration_failures: Vec<Outcome>,
    /// Per-entity outcomes for successful deletions.
    pub deletions: Vec<Outcome>,
    /// Per-entity outcomes for failed deletions.
    pub deletion_failures: Vec<Outcome>,
    /// Registry URLs dropped because their account had no credential.
    pub missing_credentials: Vec<String>,

    /// Top-level errors. A non-empty list marks the run unsuccessful.
    pub errors: Vec<String>,
}

impl RunResult {
    /// Starts a new, empty run result.
    pub fn new(dry_run: bool, cleanup_enabled: bool) -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            finished_at: None,
            dry_run,
            cleanup_enabled,
            discovered: 0,
            enriched: 0,
            existing: 0,
            new_registrations: 0,
            failed_registrations: 0,
            cleanup_candidates: 0,
            deleted_registrations: 0,
            failed_deletions: 0,
            registered: Vec::new(),
            registration_failures: Vec::new(),
            deletions: Vec::new(),
            deletion_failures: Vec::new(),
            missing_credentials: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Records a registration outcome, updating counters and detail lists.
    pub fn record_registration(&mut self, outcome: Outcome) {
        if outcome.success {
            self.new_registrations += 1;
            self.registered.push(outcome);
        } else {
            self.failed_registrations += 1;
            self.registration_failures.push(outcome);
        }
    }

    /// Records a deletion outcome, updating counters and detail lists.
    pub fn record_deletion(&mut self, outcome: Outcome) {
        if outcome.success {
            self.deleted_registrations += 1;
            self.deletions.push(outcome);
        } else {
            self.failed_deletions += 1;
            self.deletion_failures.push(outcome);
        }
    }

    /// Stamps the finish time.
    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Whether the run completed without top-level errors. Zero entities
    /// processed is still a success.
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    /// Wall-clock duration of the run, in seconds.
    pub fn duration_secs(&self) -> f64 {
        let end = self.finished_at.unwrap_or_else(Utc::now);
        (end - self.started_at).num_milliseconds() as f64 / 1000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rw_connectors::testing;

    #[test]
    fn url_construction_and_extraction_are_inverse() {
        let url = registry_url("111122223333", "us-east-1");
        assert_eq!(url, "https://111122223333.dkr.ecr.us-east-1.amazonaws.com");
        assert_eq!(account_id_from_url(&url).as_deref(), Some("111122223333"));
    }

    #[test]
    fn account_extraction_rejects_malformed_urls() {
        assert!(account_id_from_url("not-a-url").is_none());
        assert!(account_id_from_url("https://").is_none());
    }

    #[test]
    fn group_key_format() {
        let group = RegistryGroup::new("111122223333", "eu-west-1");
        assert_eq!(group.group_key(), "111122223333_eu-west-1");
        assert_eq!(
            group.registry_url,
            "https://111122223333.dkr.ecr.eu-west-1.amazonaws.com"
        );
    }

    #[test]
    fn credential_requires_all_fields() {
        let full = testing::cspm_account("111122223333", "prod");
        assert!(AccountCredential::from_record(full).is_some());

        let mut missing_role = testing::cspm_account("111122223333", "prod");
        missing_role.iam_role_arn = None;
        assert!(AccountCredential::from_record(missing_role).is_none());

        let mut missing_external = testing::cspm_account("111122223333", "prod");
        missing_external.external_id = None;
        assert!(AccountCredential::from_record(missing_external).is_none());

        let mut empty_role = testing::cspm_account("111122223333", "prod");
        empty_role.iam_role_arn = Some(String::new());
        assert!(AccountCredential::from_record(empty_role).is_none());
    }

    #[test]
    fn credential_defaults_display_name() {
        let mut record = testing::cspm_account("111122223333", "prod");
        record.account_name = None;
        let credential = AccountCredential::from_record(record).unwrap();
        assert_eq!(credential.account_name, "Unknown");
    }

    #[test]
    fn creation_request_alias() {
        let group = RegistryGroup::new("111122223333", "us-east-1");
        let credential =
            AccountCredential::from_record(testing::cspm_account("111122223333", "prod")).unwrap();
        let enriched = EnrichedRegistry { group, credential };

        let request = enriched.creation_request();
        assert_eq!(request.user_defined_alias, "Auto-prod-us-east-1");
        assert_eq!(
            request.url,
            "https://111122223333.dkr.ecr.us-east-1.amazonaws.com"
        );
    }

    #[test]
    fn existing_registration_filters_non_ecr() {
        let ecr = testing::registry_record(
            "reg-1",
            "https://111122223333.dkr.ecr.us-east-1.amazonaws.com",
            "active",
        );
        let parsed = ExistingRegistration::from_record(ecr).unwrap();
        assert_eq!(parsed.account_id.as_deref(), Some("111122223333"));
        assert_eq!(parsed.state, "active");

        let mut dockerhub = testing::registry_record("reg-2", "https://index.docker.io", "active");
        dockerhub.registry_type = "dockerhub".to_string();
        assert!(ExistingRegistration::from_record(dockerhub).is_none());
    }

    #[test]
    fn existing_registration_requires_url() {
        let mut record = testing::registry_record("reg-3", "ignored", "active");
        record.url = None;
        assert!(ExistingRegistration::from_record(record).is_none());
    }

    #[test]
    fn run_result_counters_follow_outcomes() {
        let mut result = RunResult::new(false, true);
        result.record_registration(Outcome::success("https://a", "id-1"));
        result.record_registration(Outcome::failure("https://b", "boom"));
        result.record_deletion(Outcome::success("https://c", "id-2"));

        assert_eq!(result.new_registrations, 1);
        assert_eq!(result.failed_registrations, 1);
        assert_eq!(result.deleted_registrations, 1);
        assert_eq!(result.registered.len(), 1);
        assert_eq!(result.registration_failures.len(), 1);
        assert!(result.is_success());

        result.errors.push("stage failed".to_string());
        assert!(!result.is_success());
    }
}
