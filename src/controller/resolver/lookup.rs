//! Store and credential lookups
//!
//! The resolver reaches the Kubernetes API only through these two seams.

use crate::crd::{ClusterSecretStore, SecretStore, SecretStoreSpec, StoreKind};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::{Api, Client};
use thiserror::Error;
use zeroize::Zeroizing;

/// A store as seen by the resolver, independent of its scope
#[derive(Debug, Clone)]
pub struct StoreDeclaration {
    pub name: String,
    /// `None` for cluster-scoped stores
    pub namespace: Option<String>,
    pub kind: StoreKind,
    pub spec: SecretStoreSpec,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("Secret {namespace}/{name} not found")]
    SecretNotFound { namespace: String, name: String },
    #[error("key {key:?} not found in Secret {namespace}/{name}")]
    KeyNotFound {
        namespace: String,
        name: String,
        key: String,
    },
    #[error("kubernetes API error: {0}")]
    Api(String),
}

/// Find stores by reference
#[async_trait]
pub trait StoreLookup: Send + Sync {
    /// `namespace` is the declaration's namespace; ignored for cluster stores
    async fn get_store(
        &self,
        kind: StoreKind,
        namespace: &str,
        name: &str,
    ) -> Result<Option<StoreDeclaration>, LookupError>;
}

/// Read credential material referenced by stores
#[async_trait]
pub trait CredentialSource: Send + Sync {
    async fn read(
        &self,
        namespace: &str,
        name: &str,
        key: &str,
    ) -> Result<Zeroizing<Vec<u8>>, LookupError>;
}

/// Lookups backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeLookup {
    client: Client,
}

impl std::fmt::Debug for KubeLookup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeLookup").finish_non_exhaustive()
    }
}

impl KubeLookup {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl StoreLookup for KubeLookup {
    async fn get_store(
        &self,
        kind: StoreKind,
        namespace: &str,
        name: &str,
    ) -> Result<Option<StoreDeclaration>, LookupError> {
        let api_error = |e: kube::Error| LookupError::Api(e.to_string());
        match kind {
            StoreKind::SecretStore => {
                let api: Api<SecretStore> = Api::namespaced(self.client.clone(), namespace);
                Ok(api.get_opt(name).await.map_err(api_error)?.map(|store| {
                    StoreDeclaration {
                        name: name.to_string(),
                        namespace: Some(namespace.to_string()),
                        kind,
                        spec: store.spec,
                    }
                }))
            }
            StoreKind::ClusterSecretStore => {
                let api: Api<ClusterSecretStore> = Api::all(self.client.clone());
                Ok(api.get_opt(name).await.map_err(api_error)?.map(|store| {
                    StoreDeclaration {
                        name: name.to_string(),
                        namespace: None,
                        kind,
                        spec: store.spec.into(),
                    }
                }))
            }
        }
    }
}

#[async_trait]
impl CredentialSource for KubeLookup {
    async fn read(
        &self,
        namespace: &str,
        name: &str,
        key: &str,
    ) -> Result<Zeroizing<Vec<u8>>, LookupError> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        let secret = api
            .get_opt(name)
            .await
            .map_err(|e| LookupError::Api(e.to_string()))?
            .ok_or_else(|| LookupError::SecretNotFound {
                namespace: namespace.to_string(),
                name: name.to_string(),
            })?;

        secret
            .data
            .and_then(|mut data| data.remove(key))
            .map(|value| Zeroizing::new(value.0))
            .ok_or_else(|| LookupError::KeyNotFound {
                namespace: namespace.to_string(),
                name: name.to_string(),
                key: key.to_string(),
            })
    }
}
