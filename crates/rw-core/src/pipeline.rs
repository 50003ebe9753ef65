//! The reconciliation pipeline.
//!
//! Strictly sequential: each stage completes before the next starts, and
//! the single [`RunResult`] accumulator is the only shared state. Stage
//! fetch failures degrade the run to empty input; authentication failure is
//! the one fatal condition.

use crate::apply::Applier;
use crate::cleanup::cleanup_candidates;
use crate::discovery::Discovery;
use crate::enrich::enrich;
use crate::existing::ExistingState;
use crate::model::{EnrichedRegistry, RunResult};
use crate::notify::Notifier;
use crate::report;
use crate::resolve::CredentialResolver;
use chrono::{Duration, Utc};
use rw_connectors::{AssetInventory, AuthProvider, CspmAccounts, RegistryStore};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// Engine configuration, constructed once at process start and passed in.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Suppress mutating calls and report synthetic successes.
    pub dry_run: bool,
    /// Run the cleanup stage after registration.
    pub cleanup_enabled: bool,
    /// Offline age, in days, past which a registration is deleted.
    pub cleanup_offline_days: i64,
    /// Result ceiling for the inventory query.
    pub discovery_limit: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            cleanup_enabled: true,
            cleanup_offline_days: 7,
            discovery_limit: 1000,
        }
    }
}

/// Drives one full reconciliation cycle.
pub struct Reconciler {
    auth: Arc<dyn AuthProvider>,
    discovery: Discovery,
    resolver: CredentialResolver,
    existing: ExistingState,
    applier: Applier,
    notifier: Option<Arc<dyn Notifier>>,
    config: EngineConfig,
}

impl Reconciler {
    /// Wires the pipeline stages over the service seams.
    pub fn new(
        auth: Arc<dyn AuthProvider>,
        inventory: Arc<dyn AssetInventory>,
        accounts: Arc<dyn CspmAccounts>,
        store: Arc<dyn RegistryStore>,
        config: EngineConfig,
    ) -> Self {
        Self {
            auth,
            discovery: Discovery::new(inventory, config.discovery_limit),
            resolver: CredentialResolver::new(accounts),
            existing: ExistingState::new(store.clone()),
            applier: Applier::new(store, config.dry_run),
            notifier: None,
            config,
        }
    }

    /// Attaches a notification channel for the finished report.
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Runs one discovery → diff → apply cycle and returns the result.
    ///
    /// Always returns a [`RunResult`]; a non-empty `errors` list marks the
    /// run unsuccessful.
    #[instrument(skip(self))]
    pub async fn run(&self) -> RunResult {
        let mut result = RunResult::new(self.config.dry_run, self.config.cleanup_enabled);
        info!(
            session_id = %result.session_id,
            dry_run = self.config.dry_run,
            cleanup_enabled = self.config.cleanup_enabled,
            "Starting registry reconciliation"
        );

        // Authentication failure is fatal: no stage runs without a session.
        if let Err(e) = self.auth.verify_credentials().await {
            error!(error = %e, "Authentication failed; aborting run");
            result.errors.push(format!("Authentication failed: {}", e));
            return self.finish(result).await;
        }

        // Stage 1: discovery.
        let groups = match self.discovery.discover().await {
            Ok(groups) => groups,
            Err(e) => {
                error!(error = %e, "Discovery failed; continuing with empty set");
                result.errors.push(e.to_string());
                Vec::new()
            }
        };
        result.discovered = groups.len();

        if groups.is_empty() {
            info!("No registries discovered; nothing to onboard");
            return self.finish(result).await;
        }

        // Stage 2: credential resolution.
        let account_ids: BTreeSet<String> =
            groups.iter().map(|g| g.account_id.clone()).collect();
        let credentials = match self.resolver.resolve(&account_ids).await {
            Ok(map) => map,
            Err(e) => {
                error!(error = %e, "Credential resolution failed; continuing with empty map");
                result.errors.push(e.to_string());
                Default::default()
            }
        };

        // Stage 3: enrichment.
        let (enriched, dropped) = enrich(groups, &credentials);
        result.enriched = enriched.len();
        for group in &dropped {
            warn!(url = %group.registry_url, "Registry has no account credential; dropping");
            result.missing_credentials.push(group.registry_url.clone());
        }

        if enriched.is_empty() {
            let message = "No discovered registries could be matched with account credentials";
            error!("{}", message);
            result.errors.push(message.to_string());
            return self.finish(result).await;
        }

        // Stage 4: existing state.
        let existing_urls = match self.existing.existing_urls().await {
            Ok(urls) => urls,
            Err(e) => {
                error!(error = %e, "Existing-state fetch failed; continuing with empty set");
                result.errors.push(e.to_string());
                Default::default()
            }
        };
        result.existing = existing_urls.len();

        // Stage 5: diff. Exact URL string equality, no normalization.
        let to_register: Vec<EnrichedRegistry> = enriched
            .into_iter()
            .filter(|r| !existing_urls.contains(&r.group.registry_url))
            .collect();

        info!(
            discovered = result.discovered,
            enriched = result.enriched,
            existing = result.existing,
            to_register = to_register.len(),
            "Registration diff computed"
        );

        // Stage 6: register.
        if to_register.is_empty() {
            info!("All discovered registries are already onboarded");
        } else {
            for outcome in self.applier.register_all(&to_register).await {
                result.record_registration(outcome);
            }
        }

        // Stage 7: cleanup.
        if self.config.cleanup_enabled {
            match self.existing.existing_detailed().await {
                Ok(detailed) if detailed.is_empty() => {
                    info!("No existing registrations to evaluate for cleanup");
                }
                Ok(detailed) => {
                    let now = Utc::now();
                    let threshold = Duration::days(self.config.cleanup_offline_days);
                    let candidates = cleanup_candidates(&detailed, &credentials, now, threshold);
                    result.cleanup_candidates = candidates.len();

                    let registrations: Vec<_> =
                        candidates.into_iter().map(|(reg, _)| reg).collect();
                    for outcome in self.applier.deregister_all(&registrations).await {
                        result.record_deletion(outcome);
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Could not fetch detailed registrations for cleanup");
                    result.errors.push(e.to_string());
                }
            }
        }

        self.finish(result).await
    }

    /// Stamps the finish time and sends the report. Delivery failure never
    /// fails the run.
    async fn finish(&self, mut result: RunResult) -> RunResult {
        result.finish();
        info!(
            session_id = %result.session_id,
            new_registrations = result.new_registrations,
            failed_registrations = result.failed_registrations,
            deleted = result.deleted_registrations,
            duration_secs = result.duration_secs(),
            success = result.is_success(),
            "Reconciliation complete"
        );

        if let Some(notifier) = &self.notifier {
            if report::should_notify(&result) {
                if let Err(e) = notifier.send(&result).await {
                    warn!(error = %e, "Failed to deliver run report");
                }
            }
        }

        result
    }
}
