//! Test fixtures shared by this crate's and the engine's tests.

use crate::secret::Secret;
use crate::traits::{CspmAccount, EcrResource, NewRegistry, RegistryCredential, RegistryRecord};

/// Creates a complete inventory resource record.
pub fn ecr_resource(account_id: &str, region: &str, repository: &str) -> EcrResource {
    EcrResource {
        account_id: Some(account_id.to_string()),
        region: Some(region.to_string()),
        resource_id: Some(repository.to_string()),
    }
}

/// Creates a complete CSPM account record with derived role/external-id
/// values.
pub fn cspm_account(account_id: &str, account_name: &str) -> CspmAccount {
    CspmAccount {
        account_id: Some(account_id.to_string()),
        account_name: Some(account_name.to_string()),
        iam_role_arn: Some(format!("arn:aws:iam::{}:role/registry-reader", account_id)),
        external_id: Some(Secret::from(format!("ext-{}", account_id))),
    }
}

/// Creates a registration creation request with placeholder credentials.
pub fn new_registry(url: &str) -> NewRegistry {
    NewRegistry {
        url: url.to_string(),
        user_defined_alias: "Auto-test".to_string(),
        credential: RegistryCredential {
            aws_iam_role: "arn:aws:iam::000000000000:role/registry-reader".to_string(),
            aws_external_id: Secret::from("ext-test"),
        },
    }
}

/// Creates an ECR registration record in the target store.
pub fn registry_record(id: &str, url: &str, state: &str) -> RegistryRecord {
    RegistryRecord {
        id: id.to_string(),
        registry_type: "ecr".to_string(),
        url: Some(url.to_string()),
        state: Some(state.to_string()),
        last_activity: None,
        created_at: Some("2023-06-01T00:00:00Z".to_string()),
        updated_at: Some("2024-01-01T00:00:00Z".to_string()),
    }
}
