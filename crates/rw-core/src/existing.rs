//! Existing-state fetch: what the target system already holds.

use crate::error::FetchError;
use crate::model::ExistingRegistration;
use rw_connectors::RegistryStore;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Fetches the target system's current registration state.
pub struct ExistingState {
    store: Arc<dyn RegistryStore>,
}

impl ExistingState {
    /// Creates a fetcher over the registry store.
    pub fn new(store: Arc<dyn RegistryStore>) -> Self {
        Self { store }
    }

    /// Returns the URLs of existing ECR registrations — the cheap existence
    /// check used for the registration diff.
    #[instrument(skip(self))]
    pub async fn existing_urls(&self) -> Result<HashSet<String>, FetchError> {
        let registrations = self.fetch_ecr_registrations().await?;
        let urls: HashSet<String> = registrations.into_iter().map(|r| r.url).collect();
        info!(count = urls.len(), "Existing ECR registrations");
        Ok(urls)
    }

    /// Returns full ECR registration records, used only by cleanup.
    #[instrument(skip(self))]
    pub async fn existing_detailed(&self) -> Result<Vec<ExistingRegistration>, FetchError> {
        let registrations = self.fetch_ecr_registrations().await?;
        info!(count = registrations.len(), "Detailed ECR registrations");
        Ok(registrations)
    }

    /// Lists and hydrates registrations, keeping only the ECR type. Other
    /// registry types coexist in the store and are ignored entirely.
    async fn fetch_ecr_registrations(&self) -> Result<Vec<ExistingRegistration>, FetchError> {
        let ids = self
            .store
            .list_registry_ids()
            .await
            .map_err(|e| FetchError::new("existing-state fetch", e))?;

        if ids.is_empty() {
            debug!("No registrations found in the target system");
            return Ok(Vec::new());
        }

        let records = self
            .store
            .fetch_registries(&ids)
            .await
            .map_err(|e| FetchError::new("existing-state fetch", e))?;

        Ok(records
            .into_iter()
            .filter_map(ExistingRegistration::from_record)
            .collect())
    }
}
