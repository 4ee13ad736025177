//! Vault authentication strategies
//!
//! Each strategy turns credential material into a client token. The resulting
//! [`VaultClient`] is the same whichever strategy produced it.

use super::client::{login, VaultClient};
use super::VaultConnection;
use crate::provider::ProviderError;
use serde_json::json;
use tracing::{debug, info_span, Instrument};
use zeroize::Zeroizing;

/// Mount path of the TLS certificate auth backend
const CERT_AUTH_MOUNT: &str = "cert";

/// How the controller authenticates against Vault
///
/// Credential material is wiped from memory when the strategy is dropped.
pub enum VaultAuthStrategy {
    /// Static token
    Token { token: Zeroizing<String> },
    /// TLS client certificate login
    Certificate {
        cert_pem: Zeroizing<Vec<u8>>,
        key_pem: Zeroizing<Vec<u8>>,
    },
    /// AppRole login
    AppRole {
        mount: String,
        role_id: String,
        secret_id: Zeroizing<String>,
    },
}

impl std::fmt::Debug for VaultAuthStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Token { .. } => f.debug_struct("Token").finish_non_exhaustive(),
            Self::Certificate { .. } => f.debug_struct("Certificate").finish_non_exhaustive(),
            Self::AppRole { mount, role_id, .. } => f
                .debug_struct("AppRole")
                .field("mount", mount)
                .field("role_id", role_id)
                .finish_non_exhaustive(),
        }
    }
}

impl VaultAuthStrategy {
    /// Short name used in logs
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Token { .. } => "token",
            Self::Certificate { .. } => "cert",
            Self::AppRole { .. } => "appRole",
        }
    }

    /// Obtain a client token and return an authenticated KV client
    ///
    /// # Errors
    ///
    /// - `Unauthorized` when the login is rejected
    /// - `Unavailable` / `Timeout` when Vault cannot be reached
    /// - `InvalidConfig` when the client identity or CA bundle cannot be parsed
    pub async fn authenticate(self, conn: VaultConnection) -> Result<VaultClient, ProviderError> {
        let method = self.name();
        let span = info_span!("vault.authenticate", auth.method = method, server = %conn.server);

        async move {
            match self {
                Self::Token { token } => {
                    if token.trim().is_empty() {
                        return Err(ProviderError::Unauthorized("vault token is empty".to_string()));
                    }
                    let http = conn.http_client(None)?;
                    let token = Zeroizing::new(token.trim().to_string());
                    Ok(VaultClient::new(http, conn, token, method))
                }
                Self::Certificate { cert_pem, key_pem } => {
                    let mut identity_pem = Zeroizing::new(Vec::with_capacity(
                        cert_pem.len() + key_pem.len() + 1,
                    ));
                    identity_pem.extend_from_slice(&cert_pem);
                    identity_pem.push(b'\n');
                    identity_pem.extend_from_slice(&key_pem);
                    let identity = reqwest::Identity::from_pem(&identity_pem).map_err(|e| {
                        ProviderError::InvalidConfig(format!(
                            "client certificate or key is not valid PEM: {e}"
                        ))
                    })?;

                    let http = conn.http_client(Some(identity))?;
                    let token = login(&http, &conn, CERT_AUTH_MOUNT, &json!({})).await?;
                    debug!("certificate login succeeded");
                    Ok(VaultClient::new(http, conn, token, method))
                }
                Self::AppRole {
                    mount,
                    role_id,
                    secret_id,
                } => {
                    let http = conn.http_client(None)?;
                    let body = json!({
                        "role_id": role_id,
                        "secret_id": secret_id.as_str(),
                    });
                    let token = login(&http, &conn, &mount, &body).await?;
                    debug!(mount = %mount, "approle login succeeded");
                    Ok(VaultClient::new(http, conn, token, method))
                }
            }
        }
        .instrument(span)
        .await
    }
}
