//! Enrichment: joining discovered registries with account credentials.

use crate::model::{AccountCredential, EnrichedRegistry, RegistryGroup};
use std::collections::HashMap;

/// Joins discovered registries with the credential map.
///
/// Pure and deterministic. Returns the enriched registries and the
/// drop-list: groups whose account has no resolved credential, each exactly
/// once, in input order. Dropped groups are reported, never silently lost.
pub fn enrich(
    groups: Vec<RegistryGroup>,
    credentials: &HashMap<String, AccountCredential>,
) -> (Vec<EnrichedRegistry>, Vec<RegistryGroup>) {
    let mut enriched = Vec::new();
    let mut dropped = Vec::new();

    for group in groups {
        match credentials.get(&group.account_id) {
            Some(credential) => enriched.push(EnrichedRegistry {
                group,
                credential: credential.clone(),
            }),
            None => dropped.push(group),
        }
    }

    (enriched, dropped)
}
