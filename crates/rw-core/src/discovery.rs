//! Registry discovery: inventory query, batched hydration, grouping.

use crate::error::FetchError;
use crate::model::RegistryGroup;
use indexmap::IndexMap;
use rw_connectors::{AssetInventory, EcrResource};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Inventory filter selecting ECR repositories on AWS.
pub const ECR_RESOURCE_FILTER: &str =
    r#"resource_type:"AWS::ECR::Repository"+cloud_provider:"aws""#;

/// Detail requests are batched to respect request-size limits.
const DETAIL_BATCH_SIZE: usize = 100;

/// Discovers registries from the asset inventory.
pub struct Discovery {
    inventory: Arc<dyn AssetInventory>,
    limit: u32,
}

impl Discovery {
    /// Creates a discovery stage with a result ceiling for the id query.
    pub fn new(inventory: Arc<dyn AssetInventory>, limit: u32) -> Self {
        Self { inventory, limit }
    }

    /// Runs one discovery pass: query ids, hydrate in batches, group by
    /// account and region.
    ///
    /// Any transport or deserialization error aborts the pass; callers
    /// treat the error as "zero discovered" after logging it.
    #[instrument(skip(self))]
    pub async fn discover(&self) -> Result<Vec<RegistryGroup>, FetchError> {
        let ids = self
            .inventory
            .query_resource_ids(ECR_RESOURCE_FILTER, self.limit)
            .await
            .map_err(|e| FetchError::new("discovery", e))?;

        if ids.is_empty() {
            info!("No ECR repositories found in the inventory");
            return Ok(Vec::new());
        }

        if ids.len() as u32 >= self.limit {
            // A full page means the estate may be larger than the ceiling.
            // Continuation cursors are not followed; surface it loudly.
            warn!(
                limit = self.limit,
                "Inventory query hit the result ceiling; discovery may be truncated"
            );
        }

        debug!(count = ids.len(), "Hydrating inventory resources");

        let mut resources = Vec::with_capacity(ids.len());
        for batch in ids.chunks(DETAIL_BATCH_SIZE) {
            let fetched = self
                .inventory
                .fetch_resources(batch)
                .await
                .map_err(|e| FetchError::new("discovery", e))?;
            resources.extend(fetched);
        }

        if resources.len() < ids.len() {
            warn!(
                submitted = ids.len(),
                returned = resources.len(),
                "Detail fetch returned fewer resources than requested; continuing with partial set"
            );
        }

        let groups = group_resources(resources);
        info!(
            repositories = ids.len(),
            registries = groups.len(),
            "Discovery grouped repositories into registries"
        );
        Ok(groups)
    }
}

/// Groups raw resources by `(account_id, region)`, preserving first-seen
/// order. Resources missing either field cannot be addressed and are
/// skipped.
pub fn group_resources(resources: Vec<EcrResource>) -> Vec<RegistryGroup> {
    let mut groups: IndexMap<String, RegistryGroup> = IndexMap::new();

    for resource in resources {
        let (Some(account_id), Some(region)) = (resource.account_id, resource.region) else {
            continue;
        };

        let key = format!("{}_{}", account_id, region);
        let entry = groups
            .entry(key)
            .or_insert_with(|| RegistryGroup::new(account_id, region));
        if let Some(repository) = resource.resource_id {
            entry.repositories.push(repository);
        }
    }

    groups.into_values().collect()
}
