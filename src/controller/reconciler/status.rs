//! # Status Updates
//!
//! Builds the ExternalSecret status after an attempt and writes it back.
//!
//! Status is only patched when it changed, otherwise every patch would produce a
//! watch event and trigger another reconcile.

use super::types::{ReconcilePhase, SyncReport};
use super::SyncError;
use crate::constants::CONTROLLER_NAME;
use crate::crd::{Condition, ExternalSecret, ExternalSecretStatus};
use async_trait::async_trait;
use kube::api::{Patch, PatchParams};
use kube::{Api, Client};

pub const CONDITION_READY: &str = "Ready";
pub const CONDITION_SECRET_SYNCED: &str = "SecretSynced";

/// Identity of the stored declaration, used to detect supersession
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclarationIdentity {
    pub uid: Option<String>,
    pub generation: Option<i64>,
    pub deleting: bool,
}

/// Access to the declarations the engine reconciles
#[async_trait]
pub trait ExternalSecretApi: Send + Sync {
    /// Identity of the declaration as currently stored, `None` if it is gone
    async fn identity(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<DeclarationIdentity>, SyncError>;

    async fn patch_status(
        &self,
        namespace: &str,
        name: &str,
        status: &ExternalSecretStatus,
    ) -> Result<(), SyncError>;
}

/// Declarations backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeExternalSecrets {
    client: Client,
}

impl std::fmt::Debug for KubeExternalSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeExternalSecrets").finish_non_exhaustive()
    }
}

impl KubeExternalSecrets {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ExternalSecretApi for KubeExternalSecrets {
    async fn identity(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<DeclarationIdentity>, SyncError> {
        let api: Api<ExternalSecret> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?.map(|es| DeclarationIdentity {
            uid: es.metadata.uid,
            generation: es.metadata.generation,
            deleting: es.metadata.deletion_timestamp.is_some(),
        }))
    }

    async fn patch_status(
        &self,
        namespace: &str,
        name: &str,
        status: &ExternalSecretStatus,
    ) -> Result<(), SyncError> {
        let api: Api<ExternalSecret> = Api::namespaced(self.client.clone(), namespace);
        let patch = serde_json::json!({
            "status": status
        });
        api.patch_status(name, &PatchParams::apply(CONTROLLER_NAME), &Patch::Merge(patch))
            .await?;
        Ok(())
    }
}

/// Status after a successful attempt
///
/// `lastSyncTime` moves when the target was written or the declaration was not
/// Ready before; a no-op refresh of a Ready declaration leaves status untouched.
#[must_use]
pub fn ready_status(
    previous: Option<&ExternalSecretStatus>,
    generation: Option<i64>,
    report: &SyncReport,
    now: &str,
) -> ExternalSecretStatus {
    let was_ready = previous.is_some_and(ExternalSecretStatus::is_ready);
    let wrote = report.outcome != super::merge::WriteOutcome::Unchanged;
    let last_sync_time = match previous.and_then(|p| p.last_sync_time.clone()) {
        Some(time) if was_ready && !wrote => Some(time),
        _ => Some(now.to_string()),
    };

    let message = format!("Secret synced with {} keys", report.keys.len());
    let mut conditions = previous.map(|p| p.conditions.clone()).unwrap_or_default();
    set_condition(
        &mut conditions,
        CONDITION_READY,
        true,
        "SecretSynced",
        &message,
        now,
    );
    set_condition(
        &mut conditions,
        CONDITION_SECRET_SYNCED,
        true,
        "SecretSynced",
        &message,
        now,
    );

    ExternalSecretStatus {
        phase: Some(ReconcilePhase::Ready.as_str().to_string()),
        conditions,
        observed_generation: generation,
        last_sync_time,
        synced_keys: report.keys.clone(),
    }
}

/// Status after a failed attempt; `None` when the error must not be reported
#[must_use]
pub fn failed_status(
    previous: Option<&ExternalSecretStatus>,
    generation: Option<i64>,
    error: &SyncError,
    now: &str,
) -> Option<ExternalSecretStatus> {
    use super::Severity;

    let message = match error.severity() {
        Severity::Ignored => return None,
        Severity::Transient => format!("{error} (retrying)"),
        Severity::Permanent => error.to_string(),
    };

    let mut conditions = previous.map(|p| p.conditions.clone()).unwrap_or_default();
    set_condition(
        &mut conditions,
        CONDITION_READY,
        false,
        error.reason(),
        &message,
        now,
    );
    set_condition(
        &mut conditions,
        CONDITION_SECRET_SYNCED,
        false,
        error.reason(),
        &message,
        now,
    );

    Some(ExternalSecretStatus {
        phase: Some(ReconcilePhase::Failed.as_str().to_string()),
        conditions,
        observed_generation: generation,
        last_sync_time: previous.and_then(|p| p.last_sync_time.clone()),
        synced_keys: previous.map(|p| p.synced_keys.clone()).unwrap_or_default(),
    })
}

/// Upsert a condition, keeping its transition time when the status did not flip
fn set_condition(
    conditions: &mut Vec<Condition>,
    condition_type: &str,
    ok: bool,
    reason: &str,
    message: &str,
    now: &str,
) {
    let status = if ok { "True" } else { "False" };
    let existing = conditions.iter_mut().find(|c| c.r#type == condition_type);
    match existing {
        Some(condition) => {
            if condition.status != status {
                condition.status = status.to_string();
                condition.last_transition_time = Some(now.to_string());
            }
            condition.reason = Some(reason.to_string());
            condition.message = Some(message.to_string());
        }
        None => conditions.push(Condition {
            r#type: condition_type.to_string(),
            status: status.to_string(),
            last_transition_time: Some(now.to_string()),
            reason: Some(reason.to_string()),
            message: Some(message.to_string()),
        }),
    }
}
