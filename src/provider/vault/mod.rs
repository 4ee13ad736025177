//! # Vault Provider
//!
//! Reads from the HashiCorp Vault KV secrets engine over its HTTP API.
//!
//! - `client.rs` - Authenticated KV client and response mapping
//! - `auth.rs` - Authentication strategies (token, TLS certificate, AppRole)
//!
//! API references:
//! - [KV v2](https://developer.hashicorp.com/vault/api-docs/secret/kv/kv-v2)
//! - [KV v1](https://developer.hashicorp.com/vault/api-docs/secret/kv/kv-v1)
//! - [TLS certificate auth](https://developer.hashicorp.com/vault/api-docs/auth/cert)
//! - [AppRole auth](https://developer.hashicorp.com/vault/api-docs/auth/approle)

mod auth;
mod client;

pub use auth::VaultAuthStrategy;
pub use client::VaultClient;

use crate::crd::{VaultKvVersion, VaultProvider};
use crate::provider::ProviderError;
use base64::{engine::general_purpose, Engine as _};
use std::time::Duration;

/// Everything needed to reach a Vault server, independent of how we authenticate
#[derive(Debug, Clone)]
pub struct VaultConnection {
    /// Server address without trailing slash
    pub server: String,
    /// KV mount path without surrounding slashes
    pub mount: String,
    pub version: VaultKvVersion,
    /// PEM encoded CA certificate used to verify the server
    pub ca_pem: Option<Vec<u8>>,
    /// Vault Enterprise namespace
    pub namespace: Option<String>,
    /// Per-request timeout
    pub timeout: Duration,
}

impl VaultConnection {
    /// Build connection parameters from a store's Vault provider spec
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` when the CA bundle is not valid base64.
    pub fn from_spec(spec: &VaultProvider, timeout: Duration) -> Result<Self, ProviderError> {
        let ca_pem = spec
            .ca_bundle
            .as_deref()
            .filter(|bundle| !bundle.is_empty())
            .map(|bundle| {
                general_purpose::STANDARD.decode(bundle.trim()).map_err(|e| {
                    ProviderError::InvalidConfig(format!("caBundle is not valid base64: {e}"))
                })
            })
            .transpose()?;

        Ok(Self {
            server: spec.server.trim_end_matches('/').to_string(),
            mount: spec.path.trim_matches('/').to_string(),
            version: spec.version,
            ca_pem,
            namespace: spec.namespace.clone().filter(|ns| !ns.is_empty()),
            timeout,
        })
    }

    /// Build the HTTP client, optionally presenting a TLS client identity
    pub(crate) fn http_client(
        &self,
        identity: Option<reqwest::Identity>,
    ) -> Result<reqwest::Client, ProviderError> {
        let mut builder = reqwest::Client::builder().timeout(self.timeout);
        if let Some(ca_pem) = &self.ca_pem {
            let ca = reqwest::Certificate::from_pem(ca_pem).map_err(|e| {
                ProviderError::InvalidConfig(format!("caBundle is not a valid PEM certificate: {e}"))
            })?;
            builder = builder.add_root_certificate(ca);
        }
        if let Some(identity) = identity {
            builder = builder.identity(identity);
        }
        builder
            .build()
            .map_err(|e| ProviderError::InvalidConfig(format!("failed to build HTTP client: {e}")))
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.server, path.trim_start_matches('/'))
    }
}
