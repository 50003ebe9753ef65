//! Container Security registry store connector.
//!
//! Lists, creates, and deletes registry registrations in the target
//! system.

use super::{api_error_message, ids_query, IdsResponse};
use crate::error::{ConnectorError, ConnectorResult};
use crate::http::HttpClient;
use crate::secret::Secret;
use crate::traits::{CreatedRegistry, NewRegistry, RegistryRecord, RegistryStore};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument};

const REGISTRIES_QUERY_PATH: &str = "/container-security/queries/registries/v1";
const REGISTRIES_ENTITY_PATH: &str = "/container-security/entities/registries/v1";

/// Registry store backed by the Falcon Container Security API.
pub struct FalconRegistryStore {
    client: Arc<HttpClient>,
}

impl FalconRegistryStore {
    /// Wraps the shared Falcon client.
    pub fn new(client: Arc<HttpClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RegistryStore for FalconRegistryStore {
    #[instrument(skip(self))]
    async fn list_registry_ids(&self) -> ConnectorResult<Vec<String>> {
        let response = self.client.get(REGISTRIES_QUERY_PATH).await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ConnectorError::RequestFailed(format!(
                "Failed to list registries: {}",
                api_error_message(status, &body)
            )));
        }

        let result: IdsResponse = response.json().await.map_err(|e| {
            ConnectorError::InvalidResponse(format!("Failed to parse registry list: {}", e))
        })?;

        debug!(count = result.resources.len(), "Registry list returned");
        Ok(result.resources)
    }

    #[instrument(skip(self, ids), fields(batch_size = ids.len()))]
    async fn fetch_registries(&self, ids: &[String]) -> ConnectorResult<Vec<RegistryRecord>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let path = format!("{}?{}", REGISTRIES_ENTITY_PATH, ids_query(ids));
        let response = self.client.get(&path).await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ConnectorError::RequestFailed(format!(
                "Failed to fetch registry details: {}",
                api_error_message(status, &body)
            )));
        }

        let result: RegistriesResponse = response.json().await.map_err(|e| {
            ConnectorError::InvalidResponse(format!("Failed to parse registry details: {}", e))
        })?;

        Ok(result.resources)
    }

    #[instrument(skip(self, registry), fields(url = %registry.url))]
    async fn create_registry(&self, registry: &NewRegistry) -> ConnectorResult<CreatedRegistry> {
        let payload = CreateRegistryPayload::from(registry);
        let response = self.client.post(REGISTRIES_ENTITY_PATH, &payload).await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ConnectorError::RequestFailed(api_error_message(
                status, &body,
            )));
        }

        let result: CreateRegistryResponse = response.json().await.map_err(|e| {
            ConnectorError::InvalidResponse(format!("Failed to parse create response: {}", e))
        })?;

        let id = result
            .resources
            .and_then(|r| r.id)
            .unwrap_or_else(|| "unknown".to_string());

        info!(url = %registry.url, registry_id = %id, "Registry created");
        Ok(CreatedRegistry { id })
    }

    #[instrument(skip(self, ids), fields(count = ids.len()))]
    async fn delete_registries(&self, ids: &[String]) -> ConnectorResult<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let path = format!("{}?{}", REGISTRIES_ENTITY_PATH, ids_query(ids));
        let response = self.client.delete(&path).await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ConnectorError::RequestFailed(api_error_message(
                status, &body,
            )));
        }

        info!(count = ids.len(), "Registries deleted");
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct RegistriesResponse {
    #[serde(default)]
    resources: Vec<RegistryRecord>,
}

/// Creation payload. The registry type is fixed: this engine only manages
/// ECR registrations.
#[derive(Debug, Serialize)]
struct CreateRegistryPayload {
    #[serde(rename = "type")]
    registry_type: &'static str,
    url: String,
    user_defined_alias: String,
    credential: CredentialPayload,
}

#[derive(Debug, Serialize)]
struct CredentialPayload {
    details: CredentialDetails,
}

#[derive(Debug, Serialize)]
struct CredentialDetails {
    aws_iam_role: String,
    aws_external_id: Secret,
}

impl From<&NewRegistry> for CreateRegistryPayload {
    fn from(registry: &NewRegistry) -> Self {
        Self {
            registry_type: "ecr",
            url: registry.url.clone(),
            user_defined_alias: registry.user_defined_alias.clone(),
            credential: CredentialPayload {
                details: CredentialDetails {
                    aws_iam_role: registry.credential.aws_iam_role.clone(),
                    aws_external_id: registry.credential.aws_external_id.clone(),
                },
            },
        }
    }
}

/// Create responses wrap a single object (not a list) under `resources`.
#[derive(Debug, Deserialize)]
struct CreateRegistryResponse {
    resources: Option<CreatedResource>,
}

#[derive(Debug, Deserialize)]
struct CreatedResource {
    id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::RegistryCredential;

    fn sample_registry() -> NewRegistry {
        NewRegistry {
            url: "https://111122223333.dkr.ecr.us-east-1.amazonaws.com".to_string(),
            user_defined_alias: "Auto-prod-us-east-1".to_string(),
            credential: RegistryCredential {
                aws_iam_role: "arn:aws:iam::111122223333:role/reader".to_string(),
                aws_external_id: Secret::from("ext-1"),
            },
        }
    }

    #[test]
    fn create_payload_shape() {
        let payload = CreateRegistryPayload::from(&sample_registry());
        let json = serde_json::to_value(&payload).unwrap();

        assert_eq!(json["type"], "ecr");
        assert_eq!(
            json["url"],
            "https://111122223333.dkr.ecr.us-east-1.amazonaws.com"
        );
        assert_eq!(json["user_defined_alias"], "Auto-prod-us-east-1");
        assert_eq!(
            json["credential"]["details"]["aws_iam_role"],
            "arn:aws:iam::111122223333:role/reader"
        );
        assert_eq!(json["credential"]["details"]["aws_external_id"], "ext-1");
    }

    #[test]
    fn create_response_with_id() {
        let json = r#"{"resources": {"id": "reg-123"}}"#;
        let response: CreateRegistryResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.resources.unwrap().id.as_deref(), Some("reg-123"));
    }

    #[test]
    fn create_response_without_id() {
        let json = r#"{"resources": {}}"#;
        let response: CreateRegistryResponse = serde_json::from_str(json).unwrap();
        assert!(response.resources.unwrap().id.is_none());

        let json = r#"{}"#;
        let response: CreateRegistryResponse = serde_json::from_str(json).unwrap();
        assert!(response.resources.is_none());
    }

    #[test]
    fn registries_response_deserialization() {
        let json = r#"{
            "resources": [
                {"id": "reg-1", "type": "ecr", "url": "https://u", "state": "active"},
                {"id": "reg-2", "type": "dockerhub"}
            ]
        }"#;
        let response: RegistriesResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.resources.len(), 2);
        assert_eq!(response.resources[0].registry_type, "ecr");
    }
}
