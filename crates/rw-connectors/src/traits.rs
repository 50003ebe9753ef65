//! Service seams consumed by the reconciliation engine.
//!
//! The engine never talks HTTP directly; it drives these traits. The
//! `falcon` module provides the production implementations and the `mock`
//! module provides in-memory fakes for tests.

use crate::error::ConnectorResult;
use crate::secret::Secret;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Verifies that the configured credentials can obtain a session.
///
/// Authentication failure is the only fatal condition in a run, so the
/// pipeline checks this seam explicitly before any stage executes.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Acquires (or verifies) a session with the backing service.
    async fn verify_credentials(&self) -> ConnectorResult<()>;
}

/// The cloud asset inventory: enumerates resources of a given type.
#[async_trait]
pub trait AssetInventory: Send + Sync {
    /// Queries resource identifiers matching a filter expression, up to
    /// `limit` results. A single page is fetched; callers treat a full page
    /// as a truncation signal.
    async fn query_resource_ids(&self, filter: &str, limit: u32) -> ConnectorResult<Vec<String>>;

    /// Hydrates one batch of resource identifiers into full records.
    async fn fetch_resources(&self, ids: &[String]) -> ConnectorResult<Vec<EcrResource>>;
}

/// CSPM account registration data: per-account delegated-access credentials.
#[async_trait]
pub trait CspmAccounts: Send + Sync {
    /// Fetches the registration records for a set of account IDs in one
    /// batched call. Records are returned as-is; validation happens in the
    /// resolver.
    async fn account_credentials(&self, account_ids: &[String])
        -> ConnectorResult<Vec<CspmAccount>>;
}

/// The Container Security registry store: the target system being
/// reconciled against.
#[async_trait]
pub trait RegistryStore: Send + Sync {
    /// Lists the identifiers of all registrations in the store.
    async fn list_registry_ids(&self) -> ConnectorResult<Vec<String>>;

    /// Hydrates registration identifiers into full records.
    async fn fetch_registries(&self, ids: &[String]) -> ConnectorResult<Vec<RegistryRecord>>;

    /// Creates a new registration. Success carries the remote identifier.
    async fn create_registry(&self, registry: &NewRegistry) -> ConnectorResult<CreatedRegistry>;

    /// Deletes registrations by identifier.
    async fn delete_registries(&self, ids: &[String]) -> ConnectorResult<()>;
}

/// A raw ECR repository record from the asset inventory.
///
/// Fields are optional because upstream data is not guaranteed complete;
/// the engine drops records it cannot address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EcrResource {
    /// Cloud account that owns the repository.
    pub account_id: Option<String>,
    /// Region the repository lives in.
    pub region: Option<String>,
    /// Repository identifier (name).
    pub resource_id: Option<String>,
}

/// A CSPM account registration record as returned by the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CspmAccount {
    /// Cloud account identifier.
    pub account_id: Option<String>,
    /// Display name for the account.
    pub account_name: Option<String>,
    /// IAM role ARN granting read access into the account.
    pub iam_role_arn: Option<String>,
    /// External ID for the role assumption (anti confused-deputy).
    pub external_id: Option<Secret>,
}

/// A registration record in the target registry store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryRecord {
    /// Opaque identifier, required for deletion.
    pub id: String,
    /// Registry type, e.g. "ecr". Other types coexist and are ignored.
    #[serde(rename = "type")]
    pub registry_type: String,
    /// Registry URL (the diff key).
    pub url: Option<String>,
    /// Lifecycle state; "offline" drives cleanup.
    pub state: Option<String>,
    /// Last activity timestamp, ISO-8601, if any.
    pub last_activity: Option<String>,
    /// Creation timestamp.
    pub created_at: Option<String>,
    /// Last update timestamp.
    pub updated_at: Option<String>,
}

/// The delegated-access credential attached to a new registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryCredential {
    /// IAM role ARN.
    pub aws_iam_role: String,
    /// External ID (zeroized on drop).
    pub aws_external_id: Secret,
}

/// A registration creation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRegistry {
    /// Registry URL.
    pub url: String,
    /// Display alias shown in the target system's UI.
    pub user_defined_alias: String,
    /// Delegated-access credential.
    pub credential: RegistryCredential,
}

/// Response to a successful registration creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedRegistry {
    /// The remote identifier assigned to the registration.
    pub id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_record_deserializes_from_wire_shape() {
        let json = r#"{
            "id": "reg-1",
            "type": "ecr",
            "url": "https://111122223333.dkr.ecr.us-east-1.amazonaws.com",
            "state": "offline",
            "last_activity": "2024-01-01T00:00:00Z",
            "created_at": "2023-06-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        }"#;

        let record: RegistryRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.id, "reg-1");
        assert_eq!(record.registry_type, "ecr");
        assert_eq!(record.state.as_deref(), Some("offline"));
    }

    #[test]
    fn registry_record_tolerates_missing_fields() {
        let json = r#"{"id": "reg-2", "type": "dockerhub"}"#;
        let record: RegistryRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.registry_type, "dockerhub");
        assert!(record.url.is_none());
        assert!(record.last_activity.is_none());
    }

    #[test]
    fn new_registry_serializes_credential_details() {
        let registry = NewRegistry {
            url: "https://111122223333.dkr.ecr.us-east-1.amazonaws.com".to_string(),
            user_defined_alias: "Auto-prod-us-east-1".to_string(),
            credential: RegistryCredential {
                aws_iam_role: "arn:aws:iam::111122223333:role/reader".to_string(),
                aws_external_id: Secret::from("ext-1"),
            },
        };

        let json = serde_json::to_value(&registry).unwrap();
        assert_eq!(json["credential"]["aws_iam_role"], "arn:aws:iam::111122223333:role/reader");
        assert_eq!(json["credential"]["aws_external_id"], "ext-1");
    }
}
