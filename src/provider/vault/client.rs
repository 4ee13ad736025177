//! Vault KV client
//!
//! Native REST implementation of the KV read path, shared by every auth strategy.
//! Once a strategy has obtained a client token the fetch contract and error
//! mapping are identical.

use super::VaultConnection;
use crate::crd::{RemoteReference, VaultKvVersion};
use crate::provider::{ProviderClient, ProviderError};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use tracing::{debug, Instrument};
use zeroize::Zeroizing;

const TOKEN_HEADER: &str = "X-Vault-Token";
const NAMESPACE_HEADER: &str = "X-Vault-Namespace";

// ============================================================================
// Vault API Response Structures
// ============================================================================

/// `GET /v1/{mount}/data/{key}` response (KV v2)
#[derive(Debug, Deserialize)]
struct KvV2Response {
    data: KvV2Data,
}

#[derive(Debug, Deserialize)]
struct KvV2Data {
    /// `null` when the requested version was deleted or destroyed
    #[serde(default)]
    data: Option<serde_json::Value>,
}

/// `GET /v1/{mount}/{key}` response (KV v1)
#[derive(Debug, Deserialize)]
struct KvV1Response {
    data: serde_json::Value,
}

/// `POST /v1/auth/{mount}/login` response
#[derive(Deserialize)]
struct LoginResponse {
    auth: LoginAuth,
}

#[derive(Deserialize)]
struct LoginAuth {
    client_token: String,
}

/// Authenticated Vault KV client
pub struct VaultClient {
    http: Client,
    conn: VaultConnection,
    token: Zeroizing<String>,
    auth_method: &'static str,
}

impl std::fmt::Debug for VaultClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultClient")
            .field("server", &self.conn.server)
            .field("mount", &self.conn.mount)
            .field("version", &self.conn.version)
            .field("auth_method", &self.auth_method)
            .finish_non_exhaustive()
    }
}

impl VaultClient {
    pub(super) fn new(
        http: Client,
        conn: VaultConnection,
        token: Zeroizing<String>,
        auth_method: &'static str,
    ) -> Self {
        Self {
            http,
            conn,
            token,
            auth_method,
        }
    }

    /// Auth method that produced the client token
    #[must_use]
    pub fn auth_method(&self) -> &'static str {
        self.auth_method
    }

    fn request(&self, builder: RequestBuilder) -> RequestBuilder {
        let builder = builder.header(TOKEN_HEADER, self.token.as_str());
        with_namespace(builder, &self.conn)
    }

    fn read_path(&self, key: &str) -> String {
        let key = key.trim_start_matches('/');
        match self.conn.version {
            VaultKvVersion::V2 => format!("{}/data/{key}", self.conn.mount),
            VaultKvVersion::V1 => format!("{}/{key}", self.conn.mount),
        }
    }
}

#[async_trait]
impl ProviderClient for VaultClient {
    fn provider_name(&self) -> &'static str {
        "vault"
    }

    async fn fetch(&self, remote: &RemoteReference) -> Result<Vec<u8>, ProviderError> {
        let span = tracing::debug_span!(
            "vault.kv.read",
            remote.key = %remote.key,
            remote.version = remote.version.as_deref().unwrap_or("latest"),
            kv.version = ?self.conn.version,
        );

        async move {
            let url = self.conn.url(&self.read_path(&remote.key));
            let mut builder = self.request(self.http.get(url));
            match (self.conn.version, remote.version.as_deref()) {
                (VaultKvVersion::V2, Some(version)) => {
                    builder = builder.query(&[("version", version)]);
                }
                (VaultKvVersion::V1, Some(version)) => {
                    debug!(version, "KV v1 is not versioned, reading the only value");
                }
                (_, None) => {}
            }

            let response = builder.send().await.map_err(map_transport_error)?;
            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(map_status(status, &remote.key, &body));
            }

            let value = match self.conn.version {
                VaultKvVersion::V2 => response
                    .json::<KvV2Response>()
                    .await
                    .map_err(map_decode_error)?
                    .data
                    .data
                    .ok_or_else(|| ProviderError::key_not_found(&remote.key))?,
                VaultKvVersion::V1 => {
                    response
                        .json::<KvV1Response>()
                        .await
                        .map_err(map_decode_error)?
                        .data
                }
            };

            serde_json::to_vec(&value)
                .map_err(|e| ProviderError::Unavailable(format!("failed to encode payload: {e}")))
        }
        .instrument(span)
        .await
    }
}

/// Log in against an auth mount and return the client token
pub(super) async fn login(
    http: &Client,
    conn: &VaultConnection,
    mount: &str,
    body: &serde_json::Value,
) -> Result<Zeroizing<String>, ProviderError> {
    let url = conn.url(&format!("auth/{}/login", mount.trim_matches('/')));
    let response = with_namespace(http.post(url), conn)
        .json(body)
        .send()
        .await
        .map_err(map_transport_error)?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(match status {
            // Vault answers bad role or secret ids with 400
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                ProviderError::Unauthorized(format!(
                    "login to auth/{mount} rejected: {}",
                    vault_errors(&body)
                ))
            }
            StatusCode::NOT_FOUND => {
                ProviderError::InvalidConfig(format!("auth mount {mount:?} is not enabled"))
            }
            _ => map_status(status, mount, &body),
        });
    }

    let login: LoginResponse = response.json().await.map_err(map_decode_error)?;
    Ok(Zeroizing::new(login.auth.client_token))
}

fn with_namespace(builder: RequestBuilder, conn: &VaultConnection) -> RequestBuilder {
    match &conn.namespace {
        Some(namespace) => builder.header(NAMESPACE_HEADER, namespace),
        None => builder,
    }
}

fn map_status(status: StatusCode, key: &str, body: &str) -> ProviderError {
    match status {
        StatusCode::NOT_FOUND => ProviderError::key_not_found(key),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            ProviderError::Unauthorized(format!("{status}: {}", vault_errors(body)))
        }
        status => ProviderError::Unavailable(format!("{status}: {}", vault_errors(body))),
    }
}

fn map_transport_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout(e.to_string())
    } else {
        ProviderError::Unavailable(e.to_string())
    }
}

fn map_decode_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout(e.to_string())
    } else {
        ProviderError::Unavailable(format!("unexpected response from Vault: {e}"))
    }
}

/// Vault reports failures as `{"errors": ["..."]}`
fn vault_errors(body: &str) -> String {
    #[derive(Deserialize)]
    struct Errors {
        errors: Vec<String>,
    }
    match serde_json::from_str::<Errors>(body) {
        Ok(errors) if !errors.errors.is_empty() => errors.errors.join("; "),
        _ => body.trim().to_string(),
    }
}
