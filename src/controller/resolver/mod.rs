//! # Store Resolver
//!
//! Turns a `secretStoreRef` into a ready-to-use [`ProviderClient`]:
//!
//! 1. look the store up (namespaced or cluster scoped)
//! 2. check the store's controller class against ours
//! 3. narrow the provider union to exactly one backend
//! 4. read the credential material the selected auth method references
//! 5. authenticate and hand back the client
//!
//! Token, certificate and AppRole auth all end in the same `VaultClient`, so the
//! caller cannot tell them apart.

mod lookup;

pub use lookup::{CredentialSource, KubeLookup, LookupError, StoreDeclaration, StoreLookup};

use crate::controller::reconciler::SyncError;
use crate::crd::{
    AwsProvider, SecretKeySelector, SecretStoreRef, SelectedProvider, SelectedVaultAuth,
    VaultProvider,
};
use crate::provider::aws::{AwsCredentials, AwsSecretsManager};
use crate::provider::fake::FakeProviderClient;
use crate::provider::vault::{VaultAuthStrategy, VaultConnection};
use crate::provider::ProviderClient;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use zeroize::Zeroizing;

/// Resolve a store reference into a backend client
#[async_trait]
pub trait StoreResolver: Send + Sync {
    /// `namespace` is the namespace of the ExternalSecret holding the reference
    async fn resolve(
        &self,
        store_ref: &SecretStoreRef,
        namespace: &str,
    ) -> Result<Arc<dyn ProviderClient>, SyncError>;
}

/// Resolver over the Kubernetes API (or any [`StoreLookup`] / [`CredentialSource`] pair)
#[derive(Clone)]
pub struct DefaultStoreResolver {
    stores: Arc<dyn StoreLookup>,
    credentials: Arc<dyn CredentialSource>,
    controller_class: String,
    call_timeout: Duration,
}

impl std::fmt::Debug for DefaultStoreResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultStoreResolver")
            .field("controller_class", &self.controller_class)
            .field("call_timeout", &self.call_timeout)
            .finish_non_exhaustive()
    }
}

impl DefaultStoreResolver {
    #[must_use]
    pub fn new(
        stores: Arc<dyn StoreLookup>,
        credentials: Arc<dyn CredentialSource>,
        controller_class: impl Into<String>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            stores,
            credentials,
            controller_class: controller_class.into(),
            call_timeout,
        }
    }

    /// Whether this instance may act on a store with the given class
    #[must_use]
    pub fn manages_class(&self, store_class: Option<&str>) -> bool {
        match store_class {
            None | Some("") => true,
            Some(class) => class == self.controller_class,
        }
    }

    async fn credential(
        &self,
        store: &StoreDeclaration,
        request_namespace: &str,
        selector: &SecretKeySelector,
    ) -> Result<Zeroizing<Vec<u8>>, SyncError> {
        // Namespaced stores only ever read from their own namespace
        let namespace = match &store.namespace {
            Some(store_namespace) => store_namespace.as_str(),
            None => selector.namespace.as_deref().unwrap_or(request_namespace),
        };
        self.credentials
            .read(namespace, &selector.name, &selector.key)
            .await
            .map_err(|e| match e {
                LookupError::Api(message) => SyncError::Unavailable(message),
                missing => SyncError::Unauthorized(format!(
                    "credentials of store {:?} unavailable: {missing}",
                    store.name
                )),
            })
    }

    async fn credential_string(
        &self,
        store: &StoreDeclaration,
        request_namespace: &str,
        selector: &SecretKeySelector,
    ) -> Result<Zeroizing<String>, SyncError> {
        let bytes = self.credential(store, request_namespace, selector).await?;
        let text = std::str::from_utf8(&bytes).map_err(|e| {
            SyncError::InvalidStoreConfig(format!(
                "key {:?} of Secret {:?} is not valid UTF-8: {e}",
                selector.key, selector.name
            ))
        })?;
        Ok(Zeroizing::new(text.trim().to_string()))
    }

    async fn vault_strategy(
        &self,
        store: &StoreDeclaration,
        request_namespace: &str,
        vault: &VaultProvider,
    ) -> Result<VaultAuthStrategy, SyncError> {
        let auth = vault
            .auth
            .select()
            .map_err(|e| SyncError::InvalidStoreConfig(e.to_string()))?;
        Ok(match auth {
            SelectedVaultAuth::Token(selector) => VaultAuthStrategy::Token {
                token: self
                    .credential_string(store, request_namespace, selector)
                    .await?,
            },
            SelectedVaultAuth::Cert(cert) => VaultAuthStrategy::Certificate {
                cert_pem: self
                    .credential(store, request_namespace, &cert.client_cert)
                    .await?,
                key_pem: self
                    .credential(store, request_namespace, &cert.secret_ref)
                    .await?,
            },
            SelectedVaultAuth::AppRole(app_role) => VaultAuthStrategy::AppRole {
                mount: app_role.path.clone(),
                role_id: app_role.role_id.clone(),
                secret_id: self
                    .credential_string(store, request_namespace, &app_role.secret_ref)
                    .await?,
            },
        })
    }

    async fn aws_credentials(
        &self,
        store: &StoreDeclaration,
        request_namespace: &str,
        aws: &AwsProvider,
    ) -> Result<AwsCredentials, SyncError> {
        let Some(auth) = &aws.auth else {
            return Ok(AwsCredentials::Ambient);
        };
        Ok(AwsCredentials::Static {
            access_key_id: self
                .credential_string(
                    store,
                    request_namespace,
                    &auth.secret_ref.access_key_id_secret_ref,
                )
                .await?,
            secret_access_key: self
                .credential_string(
                    store,
                    request_namespace,
                    &auth.secret_ref.secret_access_key_secret_ref,
                )
                .await?,
        })
    }
}

#[async_trait]
impl StoreResolver for DefaultStoreResolver {
    async fn resolve(
        &self,
        store_ref: &SecretStoreRef,
        namespace: &str,
    ) -> Result<Arc<dyn ProviderClient>, SyncError> {
        let store = self
            .stores
            .get_store(store_ref.kind, namespace, &store_ref.name)
            .await
            .map_err(|e| SyncError::Unavailable(e.to_string()))?
            .ok_or_else(|| SyncError::StoreNotFound {
                name: store_ref.name.clone(),
                kind: store_ref.kind,
            })?;

        if !self.manages_class(store.spec.controller.as_deref()) {
            return Err(SyncError::StoreNotManaged {
                name: store.name.clone(),
                class: store.spec.controller.clone().unwrap_or_default(),
            });
        }

        let provider = store
            .spec
            .provider
            .select()
            .map_err(|e| SyncError::InvalidStoreConfig(e.to_string()))?;
        debug!(
            store = %store.name,
            kind = %store.kind,
            provider = provider.name(),
            "resolved store"
        );

        let client: Arc<dyn ProviderClient> = match provider {
            SelectedProvider::Vault(vault) => {
                let conn = VaultConnection::from_spec(vault, self.call_timeout)?;
                let strategy = self.vault_strategy(&store, namespace, vault).await?;
                Arc::new(strategy.authenticate(conn).await?)
            }
            SelectedProvider::Aws(aws) => {
                let credentials = self.aws_credentials(&store, namespace, aws).await?;
                Arc::new(AwsSecretsManager::new(&aws.region, credentials, self.call_timeout).await)
            }
            SelectedProvider::Fake(fake) => Arc::new(FakeProviderClient::new(fake)),
        };
        Ok(client)
    }
}

