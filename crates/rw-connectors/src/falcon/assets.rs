//! Asset Explorer inventory connector.
//!
//! Queries the cloud-security-assets API for resource identifiers and
//! hydrates them into full resource records.

use super::{api_error_message, ids_query, IdsResponse};
use crate::error::{ConnectorError, ConnectorResult};
use crate::http::HttpClient;
use crate::traits::{AssetInventory, EcrResource};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Asset inventory backed by the Falcon cloud-security-assets API.
pub struct FalconAssetInventory {
    client: Arc<HttpClient>,
}

impl FalconAssetInventory {
    /// Wraps the shared Falcon client.
    pub fn new(client: Arc<HttpClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AssetInventory for FalconAssetInventory {
    #[instrument(skip(self))]
    async fn query_resource_ids(&self, filter: &str, limit: u32) -> ConnectorResult<Vec<String>> {
        let path = format!(
            "/cloud-security-assets/queries/resources/v1?filter={}&limit={}",
            urlencoding::encode(filter),
            limit
        );

        let response = self.client.get(&path).await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ConnectorError::RequestFailed(format!(
                "Failed to query resources: {}",
                api_error_message(status, &body)
            )));
        }

        let result: IdsResponse = response.json().await.map_err(|e| {
            ConnectorError::InvalidResponse(format!("Failed to parse resource query: {}", e))
        })?;

        debug!(count = result.resources.len(), "Resource query returned");
        Ok(result.resources)
    }

    #[instrument(skip(self, ids), fields(batch_size = ids.len()))]
    async fn fetch_resources(&self, ids: &[String]) -> ConnectorResult<Vec<EcrResource>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let path = format!(
            "/cloud-security-assets/entities/resources/v1?{}",
            ids_query(ids)
        );

        let response = self.client.get(&path).await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ConnectorError::RequestFailed(format!(
                "Failed to fetch resource details: {}",
                api_error_message(status, &body)
            )));
        }

        let result: ResourcesResponse = response.json().await.map_err(|e| {
            ConnectorError::InvalidResponse(format!("Failed to parse resource details: {}", e))
        })?;

        Ok(result.resources)
    }
}

#[derive(Debug, Deserialize)]
struct ResourcesResponse {
    #[serde(default)]
    resources: Vec<EcrResource>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resources_response_deserialization() {
        let json = r#"{
            "resources": [
                {"account_id": "111122223333", "region": "us-east-1", "resource_id": "api"},
                {"account_id": "111122223333", "region": null, "resource_id": "worker"}
            ]
        }"#;

        let response: ResourcesResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.resources.len(), 2);
        assert_eq!(
            response.resources[0].account_id.as_deref(),
            Some("111122223333")
        );
        assert!(response.resources[1].region.is_none());
    }

    #[test]
    fn resources_response_empty() {
        let response: ResourcesResponse = serde_json::from_str("{}").unwrap();
        assert!(response.resources.is_empty());
    }
}
