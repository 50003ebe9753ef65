//! CSPM account registration connector.
//!
//! Fetches the delegated-access credential (IAM role + external ID)
//! registered for each cloud account.

use super::{api_error_message, ids_query};
use crate::error::{ConnectorError, ConnectorResult};
use crate::http::HttpClient;
use crate::secret::Secret;
use crate::traits::{CspmAccount, CspmAccounts};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Account credential source backed by the Falcon CSPM registration API.
pub struct FalconCspmAccounts {
    client: Arc<HttpClient>,
}

impl FalconCspmAccounts {
    /// Wraps the shared Falcon client.
    pub fn new(client: Arc<HttpClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CspmAccounts for FalconCspmAccounts {
    #[instrument(skip(self, account_ids), fields(accounts = account_ids.len()))]
    async fn account_credentials(
        &self,
        account_ids: &[String],
    ) -> ConnectorResult<Vec<CspmAccount>> {
        if account_ids.is_empty() {
            return Ok(Vec::new());
        }

        let path = format!(
            "/cloud-security-registration-aws/entities/account/v1?{}",
            ids_query(account_ids)
        );

        let response = self.client.get(&path).await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ConnectorError::RequestFailed(format!(
                "Failed to query account registrations: {}",
                api_error_message(status, &body)
            )));
        }

        let result: AccountsResponse = response.json().await.map_err(|e| {
            ConnectorError::InvalidResponse(format!("Failed to parse account registrations: {}", e))
        })?;

        debug!(count = result.resources.len(), "Account query returned");

        Ok(result
            .resources
            .into_iter()
            .map(CspmAccountRecord::flatten)
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct AccountsResponse {
    #[serde(default)]
    resources: Vec<CspmAccountRecord>,
}

/// Wire shape: the role ARN and external ID live in a nested metadata
/// object.
#[derive(Debug, Deserialize)]
struct CspmAccountRecord {
    account_id: Option<String>,
    account_name: Option<String>,
    #[serde(default)]
    resource_metadata: ResourceMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct ResourceMetadata {
    iam_role_arn: Option<String>,
    external_id: Option<String>,
}

impl CspmAccountRecord {
    fn flatten(self) -> CspmAccount {
        CspmAccount {
            account_id: self.account_id,
            account_name: self.account_name,
            iam_role_arn: self.resource_metadata.iam_role_arn,
            external_id: self.resource_metadata.external_id.map(Secret::new),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flattens_nested_metadata() {
        let json = r#"{
            "resources": [{
                "account_id": "111122223333",
                "account_name": "prod",
                "resource_metadata": {
                    "iam_role_arn": "arn:aws:iam::111122223333:role/reader",
                    "external_id": "ext-1"
                }
            }]
        }"#;

        let response: AccountsResponse = serde_json::from_str(json).unwrap();
        let account = response
            .resources
            .into_iter()
            .map(CspmAccountRecord::flatten)
            .next()
            .unwrap();

        assert_eq!(account.account_id.as_deref(), Some("111122223333"));
        assert_eq!(
            account.iam_role_arn.as_deref(),
            Some("arn:aws:iam::111122223333:role/reader")
        );
        assert_eq!(account.external_id.unwrap().expose(), "ext-1");
    }

    #[test]
    fn tolerates_missing_metadata() {
        let json = r#"{"resources": [{"account_id": "444455556666"}]}"#;
        let response: AccountsResponse = serde_json::from_str(json).unwrap();
        let account = response
            .resources
            .into_iter()
            .map(CspmAccountRecord::flatten)
            .next()
            .unwrap();

        assert!(account.iam_role_arn.is_none());
        assert!(account.external_id.is_none());
    }
}
