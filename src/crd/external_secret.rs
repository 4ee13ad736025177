//! # ExternalSecret Spec
//!
//! The declaration that ties a secret store to a target Kubernetes Secret.

use crate::constants::DEFAULT_REFRESH_INTERVAL;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// ExternalSecret Custom Resource Definition
///
/// Declares which remote keys to read from a store and how to lay them out in
/// a namespaced target Secret.
///
/// # Example
///
/// ```yaml
/// apiVersion: external-secrets.io/v1alpha1
/// kind: ExternalSecret
/// metadata:
///   name: database-credentials
///   namespace: default
/// spec:
///   secretStoreRef:
///     name: vault-backend
///   target:
///     name: database-credentials
///   refreshInterval: 15m
///   data:
///     - secretKey: username
///       remoteRef:
///         key: apps/database
///         property: username
///     - secretKey: password
///       remoteRef:
///         key: apps/database
///         property: password
/// ```
#[derive(kube::CustomResource, Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "ExternalSecret",
    group = "external-secrets.io",
    version = "v1alpha1",
    namespaced,
    status = "crate::crd::ExternalSecretStatus",
    shortname = "es",
    printcolumn = r#"{"name":"Store", "type":"string", "jsonPath":".spec.secretStoreRef.name"}, {"name":"Refresh", "type":"string", "jsonPath":".spec.refreshInterval"}, {"name":"Ready", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ExternalSecretSpec {
    /// Store the data is read from
    pub secret_store_ref: SecretStoreRef,
    /// Target Secret layout
    #[serde(default)]
    pub target: ExternalSecretTarget,
    /// How often the target is re-synced
    /// Format: Kubernetes duration string (e.g., "30s", "15m", "1h")
    /// "0" disables periodic refresh; the target is only re-synced on changes
    /// Default: "1h"
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval: String,
    /// Ordered data requests. Duplicate secretKeys: the last entry wins
    #[serde(default)]
    pub data: Vec<ExternalSecretData>,
}

#[must_use]
pub fn default_refresh_interval() -> String {
    DEFAULT_REFRESH_INTERVAL.to_string()
}

/// Reference to a SecretStore or ClusterSecretStore
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecretStoreRef {
    pub name: String,
    #[serde(default)]
    pub kind: StoreKind,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize, schemars::JsonSchema)]
pub enum StoreKind {
    #[default]
    SecretStore,
    ClusterSecretStore,
}

impl std::fmt::Display for StoreKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreKind::SecretStore => write!(f, "SecretStore"),
            StoreKind::ClusterSecretStore => write!(f, "ClusterSecretStore"),
        }
    }
}

/// Target Secret settings
#[derive(Debug, Clone, Default, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExternalSecretTarget {
    /// Name of the target Secret. Defaults to the ExternalSecret's name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Whether the target Secret is owned by (and deleted with) the ExternalSecret
    #[serde(default)]
    pub creation_policy: CreationPolicy,
    /// Optional per-field templates rendered over the extracted data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<ExternalSecretTemplate>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
pub enum CreationPolicy {
    /// Controller owner reference is set; the target is garbage collected with the declaration
    #[default]
    Owner,
    /// No owner reference; the target survives the declaration
    Orphan,
}

/// Per-field templates
///
/// Each value is a minijinja template with every extracted key in scope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExternalSecretTemplate {
    #[serde(default)]
    pub data: BTreeMap<String, String>,
}

/// One remote fetch and its local placement
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExternalSecretData {
    /// Key in the target Secret
    pub secret_key: String,
    pub remote_ref: RemoteReference,
}

/// Location of a value in the backend
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RemoteReference {
    /// Remote key (path) in the backend
    pub key: String,
    /// Version to read. Absent means latest
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Dot path into a JSON payload. Absent means the whole payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property: Option<String>,
}

impl RemoteReference {
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            version: None,
            property: None,
        }
    }
}

impl ExternalSecret {
    /// Name of the target Secret
    #[must_use]
    pub fn target_name(&self) -> String {
        self.spec
            .target
            .name
            .clone()
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| self.metadata.name.clone().unwrap_or_default())
    }
}
