//! # rw-core
//!
//! The reconciliation engine for registry-warden.
//!
//! One invocation performs a single pass: discover ECR registries from the
//! asset inventory, resolve per-account delegated-access credentials,
//! enrich, diff against the registrations the target system already holds,
//! register the missing ones, and (when cleanup is enabled) deregister
//! registrations that have been offline past a threshold. Nothing is
//! persisted between runs; a failed or missed run self-heals on the next
//! cycle.

pub mod apply;
pub mod cleanup;
pub mod discovery;
pub mod enrich;
pub mod error;
pub mod existing;
pub mod model;
pub mod notify;
pub mod pipeline;
pub mod report;
pub mod resolve;

pub use apply::{Applier, DRY_RUN_ID};
pub use cleanup::{classify, cleanup_candidates, CleanupAction, CleanupDecision};
pub use discovery::{Discovery, ECR_RESOURCE_FILTER};
pub use enrich::enrich;
pub use error::FetchError;
pub use existing::ExistingState;
pub use model::{
    account_id_from_url, registry_url, AccountCredential, EnrichedRegistry, ExistingRegistration,
    Outcome, RegistryGroup, RunResult,
};
pub use pipeline::{EngineConfig, Reconciler};
pub use resolve::CredentialResolver;
