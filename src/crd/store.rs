//! # Secret Stores
//!
//! `SecretStore` (namespaced) and `ClusterSecretStore` (cluster scoped) describe a
//! reusable backend connection together with its authentication method.
//!
//! The wire shape mirrors the usual "one optional field per variant" layout:
//!
//! ```yaml
//! apiVersion: external-secrets.io/v1alpha1
//! kind: SecretStore
//! metadata:
//!   name: vault-backend
//! spec:
//!   provider:
//!     vault:
//!       server: https://vault.example.com:8200
//!       path: secret
//!       version: v2
//!       auth:
//!         tokenSecretRef:
//!           name: vault-token
//!           key: token
//! ```
//!
//! Deserialization accepts any combination of populated fields. Picking the single
//! active variant is done by [`SecretStoreProvider::select`] and
//! [`VaultAuth::select`] when the store is resolved, so a misconfigured store
//! surfaces as a reconcile error on the declarations that use it.

use crate::crd::SecretKeySelector;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// SecretStore Custom Resource Definition
#[derive(kube::CustomResource, Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "SecretStore",
    group = "external-secrets.io",
    version = "v1alpha1",
    namespaced,
    shortname = "ss"
)]
#[serde(rename_all = "camelCase")]
pub struct SecretStoreSpec {
    /// Controller class allowed to act on this store
    /// Empty means any controller instance may use it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller: Option<String>,
    /// Backend provider configuration - exactly one field must be set
    pub provider: SecretStoreProvider,
}

/// ClusterSecretStore Custom Resource Definition
///
/// Same shape as `SecretStore`, usable from every namespace.
#[derive(kube::CustomResource, Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "ClusterSecretStore",
    group = "external-secrets.io",
    version = "v1alpha1",
    shortname = "css"
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSecretStoreSpec {
    /// Controller class allowed to act on this store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller: Option<String>,
    /// Backend provider configuration - exactly one field must be set
    pub provider: SecretStoreProvider,
}

impl From<ClusterSecretStoreSpec> for SecretStoreSpec {
    fn from(spec: ClusterSecretStoreSpec) -> Self {
        Self {
            controller: spec.controller,
            provider: spec.provider,
        }
    }
}

/// Backend provider configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecretStoreProvider {
    /// HashiCorp Vault KV engine
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vault: Option<VaultProvider>,
    /// AWS Secrets Manager
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws: Option<AwsProvider>,
    /// Static in-resource data, for smoke tests and demos
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fake: Option<FakeProvider>,
}

/// The single active provider of a store
#[derive(Debug, Clone, Copy)]
pub enum SelectedProvider<'a> {
    Vault(&'a VaultProvider),
    Aws(&'a AwsProvider),
    Fake(&'a FakeProvider),
}

impl SelectedProvider<'_> {
    /// Provider family name, used for metrics labels and logs
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            SelectedProvider::Vault(_) => "vault",
            SelectedProvider::Aws(_) => "aws",
            SelectedProvider::Fake(_) => "fake",
        }
    }
}

/// Why a provider or auth union could not be narrowed to one variant
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderSelectionError {
    #[error("no {0} configured")]
    Missing(&'static str),
    #[error("multiple {what} configured: {}", .set.join(", "))]
    Multiple {
        what: &'static str,
        set: Vec<&'static str>,
    },
}

impl SecretStoreProvider {
    /// Narrow the optional fields to exactly one provider
    ///
    /// # Errors
    ///
    /// Returns an error when no provider or more than one provider is set.
    pub fn select(&self) -> Result<SelectedProvider<'_>, ProviderSelectionError> {
        let mut selected = Vec::new();
        if let Some(vault) = &self.vault {
            selected.push(SelectedProvider::Vault(vault));
        }
        if let Some(aws) = &self.aws {
            selected.push(SelectedProvider::Aws(aws));
        }
        if let Some(fake) = &self.fake {
            selected.push(SelectedProvider::Fake(fake));
        }
        exactly_one("provider", selected, SelectedProvider::name)
    }
}

/// Vault KV engine version
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
pub enum VaultKvVersion {
    #[serde(rename = "v1")]
    V1,
    #[default]
    #[serde(rename = "v2")]
    V2,
}

/// Vault provider configuration
#[derive(Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VaultProvider {
    /// Vault server address, e.g. "https://vault.example.com:8200"
    pub server: String,
    /// Mount path of the KV engine
    #[serde(default = "default_vault_path")]
    pub path: String,
    /// KV engine version
    #[serde(default)]
    pub version: VaultKvVersion,
    /// Base64 encoded PEM bundle used to verify the server certificate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_bundle: Option<String>,
    /// Vault Enterprise namespace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Authentication method - exactly one field must be set
    pub auth: VaultAuth,
}

fn default_vault_path() -> String {
    "secret".to_string()
}

/// Vault authentication configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VaultAuth {
    /// Static token stored in a Secret
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_secret_ref: Option<SecretKeySelector>,
    /// TLS client certificate login
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cert: Option<VaultCertAuth>,
    /// AppRole login
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_role: Option<VaultAppRole>,
}

/// The single active Vault auth method
#[derive(Debug, Clone, Copy)]
pub enum SelectedVaultAuth<'a> {
    Token(&'a SecretKeySelector),
    Cert(&'a VaultCertAuth),
    AppRole(&'a VaultAppRole),
}

impl SelectedVaultAuth<'_> {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            SelectedVaultAuth::Token(_) => "token",
            SelectedVaultAuth::Cert(_) => "cert",
            SelectedVaultAuth::AppRole(_) => "appRole",
        }
    }
}

impl VaultAuth {
    /// Narrow the optional fields to exactly one auth method
    ///
    /// # Errors
    ///
    /// Returns an error when no method or more than one method is set.
    pub fn select(&self) -> Result<SelectedVaultAuth<'_>, ProviderSelectionError> {
        let mut selected = Vec::new();
        if let Some(token) = &self.token_secret_ref {
            selected.push(SelectedVaultAuth::Token(token));
        }
        if let Some(cert) = &self.cert {
            selected.push(SelectedVaultAuth::Cert(cert));
        }
        if let Some(app_role) = &self.app_role {
            selected.push(SelectedVaultAuth::AppRole(app_role));
        }
        exactly_one("vault auth method", selected, SelectedVaultAuth::name)
    }
}

/// Vault TLS certificate authentication
#[derive(Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VaultCertAuth {
    /// PEM encoded client certificate
    pub client_cert: SecretKeySelector,
    /// PEM encoded private key of the client certificate
    pub secret_ref: SecretKeySelector,
}

/// Vault AppRole authentication
#[derive(Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VaultAppRole {
    /// Mount path of the AppRole auth backend
    #[serde(default = "default_app_role_path")]
    pub path: String,
    /// Role ID
    pub role_id: String,
    /// Secret holding the secret ID
    pub secret_ref: SecretKeySelector,
}

fn default_app_role_path() -> String {
    "approle".to_string()
}

/// AWS Secrets Manager provider configuration
#[derive(Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AwsProvider {
    /// AWS region, e.g. "eu-west-1"
    pub region: String,
    /// Static credentials. When absent, the ambient credential chain (IRSA) is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<AwsAuth>,
}

#[derive(Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AwsAuth {
    pub secret_ref: AwsAuthSecretRef,
}

#[derive(Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AwsAuthSecretRef {
    pub access_key_id_secret_ref: SecretKeySelector,
    pub secret_access_key_secret_ref: SecretKeySelector,
}

/// Static provider backed by data embedded in the store
#[derive(Debug, Clone, Default, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FakeProvider {
    #[serde(default)]
    pub data: Vec<FakeProviderData>,
}

#[derive(Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FakeProviderData {
    pub key: String,
    /// Version this value is served under. Unversioned entries answer "latest" reads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub value: String,
}

fn exactly_one<T>(
    what: &'static str,
    mut selected: Vec<T>,
    name: fn(&T) -> &'static str,
) -> Result<T, ProviderSelectionError> {
    match selected.len() {
        0 => Err(ProviderSelectionError::Missing(what)),
        1 => Ok(selected.remove(0)),
        _ => Err(ProviderSelectionError::Multiple {
            what,
            set: selected.iter().map(name).collect(),
        }),
    }
}
