//! # Sync Engine
//!
//! One reconcile attempt for one ExternalSecret:
//!
//! ```text
//! Pending -> Fetching -> Extracting -> Templating -> Writing -> Ready
//!    \__________\____________\____________\____________\______> Failed
//! ```
//!
//! Data requests are fetched and extracted in declared order. The first failure
//! aborts the attempt before anything is written, so the target either receives
//! the complete new data set or is left untouched.

use super::extract::extract;
use super::merge::{self, DesiredTarget};
use super::status::{failed_status, ready_status, ExternalSecretApi};
use super::target::TargetSecrets;
use super::template::TemplateEngine;
use super::types::{ReconcilePhase, SyncReport};
use super::validation::validate_external_secret;
use super::SyncError;
use crate::config::ControllerConfig;
use crate::constants::ATTEMPT_ID_LENGTH;
use crate::controller::resolver::StoreResolver;
use crate::crd::ExternalSecret;
use crate::observability::metrics;
use crate::utils::random_object_safe_string;
use kube::{Resource, ResourceExt};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, info_span, warn, Instrument};

/// Limits applied to each attempt
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub call_timeout: Duration,
    pub attempt_deadline: Duration,
    pub write_conflict_retries: u32,
    pub min_refresh_interval_secs: u64,
}

impl From<&ControllerConfig> for EngineSettings {
    fn from(config: &ControllerConfig) -> Self {
        Self {
            call_timeout: config.provider_call_timeout(),
            attempt_deadline: config.attempt_deadline(),
            write_conflict_retries: config.write_conflict_retries,
            min_refresh_interval_secs: config.min_refresh_interval_secs,
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from(&ControllerConfig::default())
    }
}

/// Runs reconcile attempts against its collaborators
pub struct SyncEngine {
    resolver: Arc<dyn StoreResolver>,
    targets: Arc<dyn TargetSecrets>,
    declarations: Arc<dyn ExternalSecretApi>,
    templates: TemplateEngine,
    settings: EngineSettings,
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl SyncEngine {
    #[must_use]
    pub fn new(
        resolver: Arc<dyn StoreResolver>,
        targets: Arc<dyn TargetSecrets>,
        declarations: Arc<dyn ExternalSecretApi>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            resolver,
            targets,
            declarations,
            templates: TemplateEngine::new(),
            settings,
        }
    }

    /// Run one attempt and record its outcome in the declaration's status
    ///
    /// # Errors
    ///
    /// The attempt's `SyncError`; classify it with `SyncError::severity`.
    pub async fn run(&self, es: &ExternalSecret) -> Result<SyncReport, SyncError> {
        let attempt_id = random_object_safe_string(ATTEMPT_ID_LENGTH);
        let span = info_span!(
            "reconcile",
            resource.name = %es.name_any(),
            resource.namespace = es.namespace().as_deref().unwrap_or(""),
            store = %es.spec.secret_store_ref.name,
            attempt.id = %attempt_id,
        );

        async move {
            let start = Instant::now();
            metrics::increment_reconciliations();

            let result = tokio::time::timeout(self.settings.attempt_deadline, self.attempt(es))
                .await
                .unwrap_or_else(|_| {
                    Err(SyncError::Timeout(format!(
                        "attempt deadline of {}s exceeded",
                        self.settings.attempt_deadline.as_secs()
                    )))
                });

            metrics::observe_reconciliation_duration(start.elapsed().as_secs_f64());
            self.report_status(es, &result).await;

            match &result {
                Ok(report) => info!(
                    outcome = report.outcome.as_str(),
                    keys = report.keys.len(),
                    "sync succeeded"
                ),
                Err(e) => warn!(reason = e.reason(), error = %e, "sync failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    /// One attempt without status reporting
    ///
    /// # Errors
    ///
    /// The first failure of any phase.
    pub async fn attempt(&self, es: &ExternalSecret) -> Result<SyncReport, SyncError> {
        let name = es.name_any();
        let namespace = es.namespace().ok_or_else(|| {
            SyncError::InvalidDeclaration("ExternalSecret has no namespace".to_string())
        })?;

        let mut phase = ReconcilePhase::Pending;
        debug!(phase = phase.as_str(), "validating");
        let refresh_interval =
            validate_external_secret(&es.spec, self.settings.min_refresh_interval_secs)?;

        let provider = self
            .bounded("resolving store", || {
                self.resolver.resolve(&es.spec.secret_store_ref, &namespace)
            })
            .await?;

        let mut extracted = BTreeMap::new();
        for entry in &es.spec.data {
            phase = ReconcilePhase::Fetching;
            debug!(phase = phase.as_str(), remote.key = %entry.remote_ref.key, "fetching");
            let started = Instant::now();
            let payload = match self
                .bounded("fetching remote key", || async {
                    provider
                        .fetch(&entry.remote_ref)
                        .await
                        .map_err(SyncError::from)
                })
                .await
            {
                Ok(payload) => {
                    metrics::record_provider_fetch(
                        provider.provider_name(),
                        started.elapsed().as_secs_f64(),
                    );
                    payload
                }
                Err(e) => {
                    metrics::increment_provider_errors(provider.provider_name());
                    return Err(e);
                }
            };

            phase = ReconcilePhase::Extracting;
            debug!(phase = phase.as_str(), secret_key = %entry.secret_key, "extracting");
            let value = extract(&payload, entry.remote_ref.property.as_deref())
                .map_err(|e| e.into_sync_error(&entry.remote_ref.key))?;
            if extracted.insert(entry.secret_key.clone(), value).is_some() {
                warn!(
                    secret_key = %entry.secret_key,
                    "secretKey declared more than once, the last entry wins"
                );
            }
        }

        phase = ReconcilePhase::Templating;
        debug!(phase = phase.as_str(), "rendering templates");
        let data = self
            .templates
            .render(&extracted, es.spec.target.template.as_ref())?;

        phase = ReconcilePhase::Writing;
        debug!(phase = phase.as_str(), "writing target");
        self.ensure_current(es, &namespace, &name).await?;

        let owner = match es.spec.target.creation_policy {
            crate::crd::CreationPolicy::Owner => es.controller_owner_ref(&()),
            crate::crd::CreationPolicy::Orphan => None,
        };
        let desired = DesiredTarget {
            name: es.target_name(),
            namespace,
            data,
            owner,
            declaration_uid: es.metadata.uid.clone(),
        };
        let outcome = merge::apply(
            self.targets.as_ref(),
            &desired,
            self.settings.write_conflict_retries,
        )
        .await?;
        metrics::increment_target_writes(outcome.as_str());

        debug!(phase = ReconcilePhase::Ready.as_str(), outcome = outcome.as_str(), "done");
        Ok(SyncReport {
            outcome,
            keys: desired.data.keys().cloned().collect(),
            refresh_interval,
        })
    }

    /// Abandon the write when the declaration changed or disappeared mid-attempt
    async fn ensure_current(
        &self,
        es: &ExternalSecret,
        namespace: &str,
        name: &str,
    ) -> Result<(), SyncError> {
        let Some(current) = self
            .bounded("checking declaration", || {
                self.declarations.identity(namespace, name)
            })
            .await?
        else {
            return Err(SyncError::Superseded);
        };

        if current.deleting
            || current.uid != es.metadata.uid
            || current.generation != es.metadata.generation
        {
            debug!(
                seen = ?es.metadata.generation,
                current = ?current.generation,
                "declaration superseded"
            );
            return Err(SyncError::Superseded);
        }
        Ok(())
    }

    /// Apply the per-call timeout to one collaborator call
    async fn bounded<T, F, Fut>(&self, what: &str, call: F) -> Result<T, SyncError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, SyncError>>,
    {
        tokio::time::timeout(self.settings.call_timeout, call())
            .await
            .unwrap_or_else(|_| {
                Err(SyncError::Timeout(format!(
                    "{what} took longer than {}s",
                    self.settings.call_timeout.as_secs()
                )))
            })
    }

    async fn report_status(&self, es: &ExternalSecret, result: &Result<SyncReport, SyncError>) {
        let Some(namespace) = es.namespace() else {
            return;
        };
        let now = chrono::Utc::now().to_rfc3339();
        let previous = es.status.as_ref();
        let next = match result {
            Ok(report) => Some(ready_status(previous, es.metadata.generation, report, &now)),
            Err(e) => failed_status(previous, es.metadata.generation, e, &now),
        };
        let Some(next) = next else {
            return;
        };
        if previous == Some(&next) {
            debug!("status unchanged, skipping patch");
            return;
        }

        let name = es.name_any();
        let patch = self.declarations.patch_status(&namespace, &name, &next);
        match tokio::time::timeout(self.settings.call_timeout, patch).await {
            Ok(Ok(())) => debug!(phase = next.phase.as_deref().unwrap_or(""), "status updated"),
            Ok(Err(e)) => warn!(error = %e, "failed to update status"),
            Err(_) => warn!("timed out updating status"),
        }
    }
}
