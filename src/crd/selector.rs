//! # Secret Key Selector
//!
//! Reference to a single key inside a Kubernetes Secret holding credential material.

use serde::{Deserialize, Serialize};

/// Selects one key of a credential Secret
///
/// For namespaced stores the Secret is always read from the store's own namespace.
/// `namespace` is only honoured for cluster-scoped stores.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecretKeySelector {
    /// Name of the Secret
    pub name: String,
    /// Key within the Secret's data
    pub key: String,
    /// Namespace of the Secret (ClusterSecretStore only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl SecretKeySelector {
    #[must_use]
    pub fn new(name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key: key.into(),
            namespace: None,
        }
    }
}
