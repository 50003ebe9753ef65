//! In-memory mock implementations of the service seams.
//!
//! Used by the engine's unit and integration tests. Each mock is seeded
//! with data up front and can be scripted to fail, either wholesale or per
//! entity; mutating calls are recorded for assertions.

use crate::error::{ConnectorError, ConnectorResult};
use crate::traits::{
    AssetInventory, AuthProvider, CreatedRegistry, CspmAccount, CspmAccounts, EcrResource,
    NewRegistry, RegistryRecord, RegistryStore,
};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Auth provider that succeeds or fails on demand.
#[derive(Debug, Default)]
pub struct MockAuth {
    should_fail: bool,
}

impl MockAuth {
    /// An auth provider that always succeeds.
    pub fn ok() -> Self {
        Self { should_fail: false }
    }

    /// An auth provider that always fails.
    pub fn failing() -> Self {
        Self { should_fail: true }
    }
}

#[async_trait]
impl AuthProvider for MockAuth {
    async fn verify_credentials(&self) -> ConnectorResult<()> {
        if self.should_fail {
            Err(ConnectorError::AuthenticationFailed(
                "mock credentials rejected".to_string(),
            ))
        } else {
            Ok(())
        }
    }
}

/// Asset inventory seeded with resource records.
///
/// Resource identifiers are the indices into the seeded list, so tests can
/// assert on batching behavior.
#[derive(Debug, Default)]
pub struct MockInventory {
    resources: Vec<EcrResource>,
    fail_query: bool,
    fail_fetch: bool,
    /// Sizes of the batches submitted to `fetch_resources`.
    batch_sizes: Mutex<Vec<usize>>,
}

impl MockInventory {
    /// Seeds the inventory with resource records.
    pub fn new(resources: Vec<EcrResource>) -> Self {
        Self {
            resources,
            ..Default::default()
        }
    }

    /// Makes `query_resource_ids` fail.
    pub fn with_query_failure(mut self) -> Self {
        self.fail_query = true;
        self
    }

    /// Makes `fetch_resources` fail.
    pub fn with_fetch_failure(mut self) -> Self {
        self.fail_fetch = true;
        self
    }

    /// Returns the batch sizes observed by `fetch_resources`.
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batch_sizes.lock().unwrap().clone()
    }
}

#[async_trait]
impl AssetInventory for MockInventory {
    async fn query_resource_ids(&self, _filter: &str, limit: u32) -> ConnectorResult<Vec<String>> {
        if self.fail_query {
            return Err(ConnectorError::RequestFailed(
                "mock query failure".to_string(),
            ));
        }
        Ok((0..self.resources.len().min(limit as usize))
            .map(|i| i.to_string())
            .collect())
    }

    async fn fetch_resources(&self, ids: &[String]) -> ConnectorResult<Vec<EcrResource>> {
        if self.fail_fetch {
            return Err(ConnectorError::RequestFailed(
                "mock fetch failure".to_string(),
            ));
        }
        self.batch_sizes.lock().unwrap().push(ids.len());
        Ok(ids
            .iter()
            .filter_map(|id| id.parse::<usize>().ok())
            .filter_map(|i| self.resources.get(i).cloned())
            .collect())
    }
}

/// CSPM account source seeded with registration records.
#[derive(Debug, Default)]
pub struct MockCspmAccounts {
    accounts: Vec<CspmAccount>,
    should_fail: bool,
}

impl MockCspmAccounts {
    /// Seeds the source with account records.
    pub fn new(accounts: Vec<CspmAccount>) -> Self {
        Self {
            accounts,
            should_fail: false,
        }
    }

    /// Makes the lookup fail.
    pub fn failing() -> Self {
        Self {
            accounts: Vec::new(),
            should_fail: true,
        }
    }
}

#[async_trait]
impl CspmAccounts for MockCspmAccounts {
    async fn account_credentials(
        &self,
        account_ids: &[String],
    ) -> ConnectorResult<Vec<CspmAccount>> {
        if self.should_fail {
            return Err(ConnectorError::RequestFailed(
                "mock credential lookup failure".to_string(),
            ));
        }
        let requested: HashSet<&str> = account_ids.iter().map(String::as_str).collect();
        Ok(self
            .accounts
            .iter()
            .filter(|a| {
                a.account_id
                    .as_deref()
                    .map(|id| requested.contains(id))
                    .unwrap_or(false)
            })
            .cloned()
            .collect())
    }
}

/// Registry store with in-memory state and scriptable per-URL create
/// failures.
#[derive(Debug, Default)]
pub struct MockRegistryStore {
    records: Mutex<Vec<RegistryRecord>>,
    fail_create_urls: HashSet<String>,
    fail_delete_ids: HashSet<String>,
    fail_list: bool,
    next_id: AtomicUsize,
    created: Mutex<Vec<NewRegistry>>,
    deleted: Mutex<Vec<String>>,
}

impl MockRegistryStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the store with existing registration records.
    pub fn with_records(records: Vec<RegistryRecord>) -> Self {
        Self {
            records: Mutex::new(records),
            ..Default::default()
        }
    }

    /// Makes creation fail for a specific registry URL.
    pub fn fail_create_for(mut self, url: impl Into<String>) -> Self {
        self.fail_create_urls.insert(url.into());
        self
    }

    /// Makes deletion fail for a specific registration id.
    pub fn fail_delete_for(mut self, id: impl Into<String>) -> Self {
        self.fail_delete_ids.insert(id.into());
        self
    }

    /// Makes listing fail.
    pub fn with_list_failure(mut self) -> Self {
        self.fail_list = true;
        self
    }

    /// Returns the creation requests received, in order.
    pub fn created(&self) -> Vec<NewRegistry> {
        self.created.lock().unwrap().clone()
    }

    /// Returns the registration ids deleted, in order.
    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl RegistryStore for MockRegistryStore {
    async fn list_registry_ids(&self) -> ConnectorResult<Vec<String>> {
        if self.fail_list {
            return Err(ConnectorError::RequestFailed(
                "mock list failure".to_string(),
            ));
        }
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.id.clone())
            .collect())
    }

    async fn fetch_registries(&self, ids: &[String]) -> ConnectorResult<Vec<RegistryRecord>> {
        let requested: HashSet<&str> = ids.iter().map(String::as_str).collect();
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| requested.contains(r.id.as_str()))
            .cloned()
            .collect())
    }

    async fn create_registry(&self, registry: &NewRegistry) -> ConnectorResult<CreatedRegistry> {
        if self.fail_create_urls.contains(&registry.url) {
            return Err(ConnectorError::RequestFailed(
                "mock create failure".to_string(),
            ));
        }

        self.created.lock().unwrap().push(registry.clone());

        let id = format!("mock-reg-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.records.lock().unwrap().push(RegistryRecord {
            id: id.clone(),
            registry_type: "ecr".to_string(),
            url: Some(registry.url.clone()),
            state: Some("active".to_string()),
            last_activity: None,
            created_at: None,
            updated_at: None,
        });

        Ok(CreatedRegistry { id })
    }

    async fn delete_registries(&self, ids: &[String]) -> ConnectorResult<()> {
        for id in ids {
            if self.fail_delete_ids.contains(id) {
                return Err(ConnectorError::RequestFailed(
                    "mock delete failure".to_string(),
                ));
            }
        }

        self.deleted.lock().unwrap().extend(ids.iter().cloned());
        let requested: HashSet<&str> = ids.iter().map(String::as_str).collect();
        self.records
            .lock()
            .unwrap()
            .retain(|r| !requested.contains(r.id.as_str()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    #[tokio::test]
    async fn inventory_limits_and_batches() {
        let resources: Vec<EcrResource> = (0..5)
            .map(|i| testing::ecr_resource("111122223333", "us-east-1", &format!("repo-{}", i)))
            .collect();
        let inventory = MockInventory::new(resources);

        let ids = inventory.query_resource_ids("filter", 3).await.unwrap();
        assert_eq!(ids.len(), 3);

        let fetched = inventory.fetch_resources(&ids).await.unwrap();
        assert_eq!(fetched.len(), 3);
        assert_eq!(inventory.batch_sizes(), vec![3]);
    }

    #[tokio::test]
    async fn store_create_and_delete_roundtrip() {
        let store = MockRegistryStore::new();
        let created = store
            .create_registry(&testing::new_registry(
                "https://111122223333.dkr.ecr.us-east-1.amazonaws.com",
            ))
            .await
            .unwrap();

        assert_eq!(store.list_registry_ids().await.unwrap().len(), 1);

        store.delete_registries(&[created.id.clone()]).await.unwrap();
        assert!(store.list_registry_ids().await.unwrap().is_empty());
        assert_eq!(store.deleted(), vec![created.id]);
    }

    #[tokio::test]
    async fn store_scripted_create_failure() {
        let store = MockRegistryStore::new().fail_create_for("https://bad.example.com");
        let err = store
            .create_registry(&testing::new_registry("https://bad.example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, ConnectorError::RequestFailed(_)));
        assert!(store.created().is_empty());
    }

    #[tokio::test]
    async fn cspm_filters_to_requested_accounts() {
        let source = MockCspmAccounts::new(vec![
            testing::cspm_account("111122223333", "prod"),
            testing::cspm_account("444455556666", "dev"),
        ]);

        let records = source
            .account_credentials(&["111122223333".to_string()])
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].account_name.as_deref(), Some("prod"));
    }

    #[tokio::test]
    async fn auth_failure() {
        assert!(MockAuth::failing().verify_credentials().await.is_err());
        assert!(MockAuth::ok().verify_credentials().await.is_ok());
    }
}
