//! # Merge Writer
//!
//! Computes the next state of a target Secret and writes it.
//!
//! Key ownership is tracked per declaration in the
//! `external-secrets.io/managed-keys` annotation, a JSON object mapping each
//! declaration UID to the keys it manages:
//!
//! - keys in the new managed set are written (managed keys win over existing values)
//! - keys this declaration managed before but no longer does are removed, unless
//!   another declaration still claims them
//! - every other key on the record is left alone
//!
//! Several declarations can share one target this way without undoing each
//! other's writes. When the computed record equals the current one nothing is
//! written.

use super::target::{TargetError, TargetSecret, TargetSecrets};
use super::SyncError;
use crate::constants::{CONTROLLER_NAME, MANAGED_BY_LABEL, MANAGED_KEYS_ANNOTATION};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// What the reconciler wants the target to look like
#[derive(Debug, Clone)]
pub struct DesiredTarget {
    pub name: String,
    pub namespace: String,
    /// Final managed key/value set
    pub data: BTreeMap<String, Vec<u8>>,
    /// Controller reference to set, `None` for `creationPolicy: Orphan`
    pub owner: Option<OwnerReference>,
    /// UID of the declaration, used to drop a stale owner reference under `Orphan`
    pub declaration_uid: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Created,
    Updated,
    Unchanged,
}

impl WriteOutcome {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteOutcome::Created => "created",
            WriteOutcome::Updated => "updated",
            WriteOutcome::Unchanged => "unchanged",
        }
    }
}

/// Key sets per declaration UID, as recorded on an existing record
#[must_use]
pub fn key_ownership(secret: &TargetSecret) -> BTreeMap<String, BTreeSet<String>> {
    let Some(raw) = secret.annotations.get(MANAGED_KEYS_ANNOTATION) else {
        return BTreeMap::new();
    };
    serde_json::from_str::<BTreeMap<String, BTreeSet<String>>>(raw).unwrap_or_else(|e| {
        warn!(
            secret = %secret.name,
            error = %e,
            "ignoring unreadable {MANAGED_KEYS_ANNOTATION} annotation"
        );
        BTreeMap::new()
    })
}

/// Keys recorded as managed by one declaration
#[must_use]
pub fn managed_keys(secret: &TargetSecret, declaration_uid: &str) -> BTreeSet<String> {
    key_ownership(secret)
        .remove(declaration_uid)
        .unwrap_or_default()
}

fn ownership_annotation(ownership: &BTreeMap<String, BTreeSet<String>>) -> String {
    serde_json::Value::Object(
        ownership
            .iter()
            .map(|(uid, keys)| {
                (
                    uid.clone(),
                    serde_json::Value::from(keys.iter().cloned().collect::<Vec<_>>()),
                )
            })
            .collect(),
    )
    .to_string()
}

/// Compute the next state of the target from its current state
#[must_use]
pub fn compute_next(existing: Option<&TargetSecret>, desired: &DesiredTarget) -> TargetSecret {
    let mut next = existing.cloned().unwrap_or_else(|| TargetSecret {
        name: desired.name.clone(),
        namespace: desired.namespace.clone(),
        ..TargetSecret::default()
    });

    let declaration = desired.declaration_uid.clone().unwrap_or_default();
    let mut ownership = existing.map(key_ownership).unwrap_or_default();
    let previously_managed = ownership.remove(&declaration).unwrap_or_default();
    let claimed_elsewhere: BTreeSet<&String> = ownership.values().flatten().collect();
    for key in &previously_managed {
        if !desired.data.contains_key(key) && !claimed_elsewhere.contains(key) {
            next.data.remove(key);
        }
    }
    next.data
        .extend(desired.data.iter().map(|(k, v)| (k.clone(), v.clone())));

    if !desired.data.is_empty() {
        ownership.insert(declaration, desired.data.keys().cloned().collect());
    }
    if ownership.is_empty() {
        next.annotations.remove(MANAGED_KEYS_ANNOTATION);
    } else {
        next.annotations.insert(
            MANAGED_KEYS_ANNOTATION.to_string(),
            ownership_annotation(&ownership),
        );
    }
    next.labels
        .insert(MANAGED_BY_LABEL.to_string(), CONTROLLER_NAME.to_string());

    if let Some(uid) = &desired.declaration_uid {
        next.owner_references.retain(|r| &r.uid != uid);
    }
    if let Some(owner) = &desired.owner {
        next.owner_references.retain(|r| r.uid != owner.uid);
        next.owner_references.push(owner.clone());
    }

    next
}

/// Write `desired` to the target, retrying optimistic-concurrency conflicts
///
/// # Errors
///
/// - `WriteConflict` once `conflict_retries` re-reads all ended in a conflict
/// - `TargetApi` for any other API failure
pub async fn apply(
    targets: &dyn TargetSecrets,
    desired: &DesiredTarget,
    conflict_retries: u32,
) -> Result<WriteOutcome, SyncError> {
    let mut conflicts = 0;
    loop {
        let existing = targets
            .get(&desired.namespace, &desired.name)
            .await
            .map_err(|e| SyncError::TargetApi(e.to_string()))?;
        let next = compute_next(existing.as_ref(), desired);

        let result = match &existing {
            Some(current) if *current == next => return Ok(WriteOutcome::Unchanged),
            Some(_) => targets.replace(&next).await.map(|()| WriteOutcome::Updated),
            None => targets.create(&next).await.map(|()| WriteOutcome::Created),
        };

        match result {
            Ok(outcome) => return Ok(outcome),
            Err(TargetError::Conflict) if conflicts < conflict_retries => {
                conflicts += 1;
                debug!(
                    secret = %desired.name,
                    attempt = conflicts,
                    "target secret changed underneath us, re-reading"
                );
            }
            Err(TargetError::Conflict) => {
                return Err(SyncError::WriteConflict {
                    attempts: conflicts + 1,
                })
            }
            Err(TargetError::Api(message)) => return Err(SyncError::TargetApi(message)),
        }
    }
}
