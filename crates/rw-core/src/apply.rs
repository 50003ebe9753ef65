//! Apply layer: per-entity register and deregister calls.
//!
//! Every entity is processed independently; one failure never aborts the
//! rest of the batch. Transport errors are converted into failure outcomes,
//! never propagated.

use crate::model::{EnrichedRegistry, ExistingRegistration, Outcome};
use rw_connectors::RegistryStore;
use std::sync::Arc;
use tracing::{error, info, instrument};

/// Placeholder remote ID reported for dry-run outcomes.
pub const DRY_RUN_ID: &str = "dry-run";

/// Issues create/delete calls for the computed diff.
pub struct Applier {
    store: Arc<dyn RegistryStore>,
    dry_run: bool,
}

impl Applier {
    /// Creates an applier. With `dry_run` set, mutating calls are skipped
    /// and synthetic successes are reported.
    pub fn new(store: Arc<dyn RegistryStore>, dry_run: bool) -> Self {
        Self { store, dry_run }
    }

    /// Registers one registry with the target system.
    #[instrument(skip(self, registry), fields(url = %registry.group.registry_url))]
    pub async fn register(&self, registry: &EnrichedRegistry) -> Outcome {
        let url = &registry.group.registry_url;
        info!(
            account = %registry.credential.account_name,
            repositories = registry.group.repositories.len(),
            dry_run = self.dry_run,
            "Registering registry"
        );

        if self.dry_run {
            info!("Dry run - registration skipped");
            return Outcome::success(url, DRY_RUN_ID);
        }

        match self.store.create_registry(&registry.creation_request()).await {
            Ok(created) => {
                info!(registry_id = %created.id, "Registration successful");
                Outcome::success(url, created.id)
            }
            Err(e) => {
                error!(error = %e, "Registration failed");
                Outcome::failure(url, e.to_string())
            }
        }
    }

    /// Registers a batch, collecting every outcome.
    pub async fn register_all(&self, registries: &[EnrichedRegistry]) -> Vec<Outcome> {
        let mut outcomes = Vec::with_capacity(registries.len());
        for registry in registries {
            outcomes.push(self.register(registry).await);
        }
        outcomes
    }

    /// Deregisters one existing registration by its opaque ID.
    #[instrument(skip(self, registration), fields(url = %registration.url, id = %registration.id))]
    pub async fn deregister(&self, registration: &ExistingRegistration) -> Outcome {
        info!(
            state = %registration.state,
            dry_run = self.dry_run,
            "Deregistering registry"
        );

        if self.dry_run {
            info!("Dry run - deletion skipped");
            return Outcome::success(&registration.url, DRY_RUN_ID);
        }

        match self
            .store
            .delete_registries(std::slice::from_ref(&registration.id))
            .await
        {
            Ok(()) => {
                info!("Deletion successful");
                Outcome::success(&registration.url, registration.id.clone())
            }
            Err(e) => {
                error!(error = %e, "Deletion failed");
                Outcome::failure(&registration.url, e.to_string())
            }
        }
    }

    /// Deregisters a batch, collecting every outcome.
    pub async fn deregister_all(&self, registrations: &[ExistingRegistration]) -> Vec<Outcome> {
        let mut outcomes = Vec::with_capacity(registrations.len());
        for registration in registrations {
            outcomes.push(self.deregister(registration).await);
        }
        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AccountCredential, RegistryGroup};
    use rw_connectors::testing::{cspm_account, registry_record};
    use rw_connectors::MockRegistryStore;

    fn enriched(account_id: &str, region: &str) -> EnrichedRegistry {
        EnrichedRegistry {
            group: RegistryGroup::new(account_id, region),
            credential: AccountCredential::from_record(cspm_account(account_id, "acct")).unwrap(),
        }
    }

    fn existing(id: &str, account_id: &str) -> ExistingRegistration {
        let record = registry_record(
            id,
            &format!("https://{}.dkr.ecr.us-east-1.amazonaws.com", account_id),
            "offline",
        );
        ExistingRegistration::from_record(record).unwrap()
    }

    #[tokio::test]
    async fn register_returns_remote_id() {
        let store = Arc::new(MockRegistryStore::new());
        let applier = Applier::new(store.clone(), false);

        let outcome = applier.register(&enriched("111122223333", "us-east-1")).await;
        assert!(outcome.success);
        assert_eq!(outcome.remote_id.as_deref(), Some("mock-reg-0"));
        assert_eq!(store.created().len(), 1);
    }

    #[tokio::test]
    async fn batch_failure_does_not_abort_neighbors() {
        let second = enriched("444455556666", "us-east-1");
        let store = Arc::new(
            MockRegistryStore::new().fail_create_for(second.group.registry_url.clone()),
        );
        let applier = Applier::new(store, false);

        let batch = vec![
            enriched("111122223333", "us-east-1"),
            second,
            enriched("777788889999", "us-east-1"),
        ];
        let outcomes = applier.register_all(&batch).await;

        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].success);
        assert!(!outcomes[1].success);
        assert!(outcomes[1].error.as_deref().unwrap().contains("mock create failure"));
        assert!(outcomes[2].success);
    }

    #[tokio::test]
    async fn dry_run_skips_mutations() {
        let store = Arc::new(MockRegistryStore::new());
        let applier = Applier::new(store.clone(), true);

        let register = applier.register(&enriched("111122223333", "us-east-1")).await;
        assert!(register.success);
        assert_eq!(register.remote_id.as_deref(), Some(DRY_RUN_ID));

        let deregister = applier.deregister(&existing("reg-1", "111122223333")).await;
        assert!(deregister.success);
        assert_eq!(deregister.remote_id.as_deref(), Some(DRY_RUN_ID));

        assert!(store.created().is_empty());
        assert!(store.deleted().is_empty());
    }

    #[tokio::test]
    async fn deregister_deletes_by_id() {
        let store = Arc::new(MockRegistryStore::with_records(vec![registry_record(
            "reg-1",
            "https://111122223333.dkr.ecr.us-east-1.amazonaws.com",
            "offline",
        )]));
        let applier = Applier::new(store.clone(), false);

        let outcome = applier.deregister(&existing("reg-1", "111122223333")).await;
        assert!(outcome.success);
        assert_eq!(store.deleted(), vec!["reg-1".to_string()]);
    }

    #[tokio::test]
    async fn deregister_failure_becomes_outcome() {
        let store = Arc::new(MockRegistryStore::new().fail_delete_for("reg-1"));
        let applier = Applier::new(store, false);

        let outcome = applier.deregister(&existing("reg-1", "111122223333")).await;
        assert!(!outcome.success);
        assert!(outcome.error.is_some());
    }
}
