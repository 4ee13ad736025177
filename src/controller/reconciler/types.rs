//! # Types
//!
//! Core types for the reconciler.

use super::engine::{EngineSettings, SyncEngine};
use super::merge::WriteOutcome;
use super::status::KubeExternalSecrets;
use super::target::KubeTargetSecrets;
use crate::config::ControllerConfig;
use crate::controller::backoff::ExponentialBackoff;
use crate::controller::resolver::{
    CredentialSource, DefaultStoreResolver, KubeLookup, StoreLookup,
};
use kube::Client;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Steps of one reconcile attempt
///
/// `Ready` re-enters `Pending` on the next trigger; any step may end in `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcilePhase {
    Pending,
    Fetching,
    Extracting,
    Templating,
    Writing,
    Ready,
    Failed,
}

impl ReconcilePhase {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconcilePhase::Pending => "Pending",
            ReconcilePhase::Fetching => "Fetching",
            ReconcilePhase::Extracting => "Extracting",
            ReconcilePhase::Templating => "Templating",
            ReconcilePhase::Writing => "Writing",
            ReconcilePhase::Ready => "Ready",
            ReconcilePhase::Failed => "Failed",
        }
    }
}

/// Result of a successful attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub outcome: WriteOutcome,
    /// Managed keys now present on the target
    pub keys: Vec<String>,
    /// When to sync again; `None` when periodic refresh is disabled
    pub refresh_interval: Option<Duration>,
}

/// Backoff state for a specific resource
/// Tracks error count and backoff calculator for progressive retries
#[derive(Debug, Clone)]
pub struct BackoffState {
    pub backoff: ExponentialBackoff,
    pub error_count: u32,
}

impl BackoffState {
    #[must_use]
    pub fn new(start_seconds: u64, max_seconds: u64) -> Self {
        Self {
            backoff: ExponentialBackoff::new(start_seconds, max_seconds),
            error_count: 0,
        }
    }

    pub fn increment_error(&mut self) {
        self.error_count += 1;
    }
}

/// Shared context handed to every reconcile call
pub struct Reconciler {
    pub engine: SyncEngine,
    pub config: ControllerConfig,
    // Backoff state per resource (identified by namespace/name)
    // Only transient failures advance it; a successful attempt removes the entry
    pub backoff_states: Mutex<HashMap<String, BackoffState>>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("controller_class", &self.config.controller_class)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    /// Context wired to the Kubernetes API
    #[must_use]
    pub fn new(client: Client, config: ControllerConfig) -> Self {
        let lookup: Arc<KubeLookup> = Arc::new(KubeLookup::new(client.clone()));
        let resolver = DefaultStoreResolver::new(
            Arc::clone(&lookup) as Arc<dyn StoreLookup>,
            lookup as Arc<dyn CredentialSource>,
            config.controller_class.clone(),
            config.provider_call_timeout(),
        );
        let engine = SyncEngine::new(
            Arc::new(resolver),
            Arc::new(KubeTargetSecrets::new(client.clone())),
            Arc::new(KubeExternalSecrets::new(client)),
            EngineSettings::from(&config),
        );
        Self::with_engine(engine, config)
    }

    #[must_use]
    pub fn with_engine(engine: SyncEngine, config: ControllerConfig) -> Self {
        Self {
            engine,
            config,
            backoff_states: Mutex::new(HashMap::new()),
        }
    }

    /// Advance and return the transient-failure backoff of a resource
    pub fn next_backoff(&self, resource_key: &str) -> Duration {
        let mut states = self
            .backoff_states
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let state = states.entry(resource_key.to_string()).or_insert_with(|| {
            BackoffState::new(self.config.backoff_start_secs, self.config.backoff_max_secs)
        });
        state.increment_error();
        state.backoff.next_backoff()
    }

    /// Forget the backoff state of a resource after a successful attempt
    pub fn reset_backoff(&self, resource_key: &str) {
        self.backoff_states
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .remove(resource_key);
    }

    /// Drop backoff state of resources that are no longer live
    ///
    /// Deleted declarations never reach a successful attempt, so their
    /// entries would otherwise stay for the life of the process.
    pub fn prune_backoff<F: Fn(&str) -> bool>(&self, is_live: F) -> usize {
        let mut states = self
            .backoff_states
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let before = states.len();
        states.retain(|key, _| is_live(key));
        before - states.len()
    }

    /// Number of consecutive transient failures recorded for a resource
    #[must_use]
    pub fn error_count(&self, resource_key: &str) -> u32 {
        self.backoff_states
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(resource_key)
            .map_or(0, |state| state.error_count)
    }
}
