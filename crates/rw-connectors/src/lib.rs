//! # rw-connectors
//!
//! CrowdStrike Falcon API connectors for registry-warden.
//!
//! This crate provides the HTTP plumbing (OAuth2 client-credentials,
//! timeouts, rate limiting) and the service seams the reconciliation engine
//! consumes: the cloud asset inventory, CSPM account registration data, and
//! the Container Security registry store. Mock implementations of all seams
//! are provided for tests.

pub mod error;
pub mod falcon;
pub mod http;
pub mod mock;
pub mod secret;
pub mod testing;
pub mod traits;

pub use error::{AuthConfig, ConnectorConfig, ConnectorError, ConnectorResult};
pub use http::{HttpClient, RateLimitConfig};
pub use secret::Secret;
pub use traits::{
    AssetInventory, AuthProvider, CspmAccount, CspmAccounts, CreatedRegistry, EcrResource,
    NewRegistry, RegistryCredential, RegistryRecord, RegistryStore,
};

pub use falcon::{
    FalconAssetInventory, FalconAuth, FalconConfig, FalconCspmAccounts, FalconRegistryStore,
};
pub use mock::{MockAuth, MockCspmAccounts, MockInventory, MockRegistryStore};
