//! Credential resolution: account IDs to delegated-access credentials.

use crate::error::FetchError;
use crate::model::AccountCredential;
use rw_connectors::CspmAccounts;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Resolves account credentials from the CSPM registration data.
pub struct CredentialResolver {
    accounts: Arc<dyn CspmAccounts>,
}

impl CredentialResolver {
    /// Creates a resolver over the credential source.
    pub fn new(accounts: Arc<dyn CspmAccounts>) -> Self {
        Self { accounts }
    }

    /// Fetches credentials for the given accounts in one batched lookup.
    ///
    /// Records missing the role ARN or external ID are unusable; they are
    /// logged at WARN and excluded from the returned map.
    #[instrument(skip(self, account_ids), fields(accounts = account_ids.len()))]
    pub async fn resolve(
        &self,
        account_ids: &BTreeSet<String>,
    ) -> Result<HashMap<String, AccountCredential>, FetchError> {
        if account_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let ids: Vec<String> = account_ids.iter().cloned().collect();
        let records = self
            .accounts
            .account_credentials(&ids)
            .await
            .map_err(|e| FetchError::new("credential resolution", e))?;

        let mut credentials = HashMap::new();
        for record in records {
            let record_account = record.account_id.clone().unwrap_or_default();
            match AccountCredential::from_record(record) {
                Some(credential) => {
                    debug!(
                        account_id = %credential.account_id,
                        account_name = %credential.account_name,
                        "Resolved account credential"
                    );
                    credentials.insert(credential.account_id.clone(), credential);
                }
                None => {
                    warn!(
                        account_id = %record_account,
                        "Account registration is missing its role or external ID; skipping"
                    );
                }
            }
        }

        info!(
            requested = account_ids.len(),
            resolved = credentials.len(),
            "Credential resolution complete"
        );
        Ok(credentials)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rw_connectors::testing::cspm_account;
    use rw_connectors::MockCspmAccounts;

    fn account_set(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn resolves_complete_records() {
        let resolver = CredentialResolver::new(Arc::new(MockCspmAccounts::new(vec![
            cspm_account("111122223333", "prod"),
            cspm_account("444455556666", "dev"),
        ])));

        let credentials = resolver
            .resolve(&account_set(&["111122223333", "444455556666"]))
            .await
            .unwrap();

        assert_eq!(credentials.len(), 2);
        assert_eq!(credentials["111122223333"].account_name, "prod");
    }

    #[tokio::test]
    async fn excludes_partial_records() {
        let mut partial = cspm_account("444455556666", "dev");
        partial.external_id = None;

        let resolver = CredentialResolver::new(Arc::new(MockCspmAccounts::new(vec![
            cspm_account("111122223333", "prod"),
            partial,
        ])));

        let credentials = resolver
            .resolve(&account_set(&["111122223333", "444455556666"]))
            .await
            .unwrap();

        assert_eq!(credentials.len(), 1);
        assert!(!credentials.contains_key("444455556666"));
    }

    #[tokio::test]
    async fn empty_input_skips_the_call() {
        let resolver = CredentialResolver::new(Arc::new(MockCspmAccounts::failing()));
        let credentials = resolver.resolve(&BTreeSet::new()).await.unwrap();
        assert!(credentials.is_empty());
    }

    #[tokio::test]
    async fn lookup_failure_is_an_error() {
        let resolver = CredentialResolver::new(Arc::new(MockCspmAccounts::failing()));
        let err = resolver
            .resolve(&account_set(&["111122223333"]))
            .await
            .unwrap_err();
        assert_eq!(err.stage(), "credential resolution");
    }
}
