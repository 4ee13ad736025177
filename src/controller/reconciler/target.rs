//! # Target Secrets
//!
//! Access to the Kubernetes Secrets the controller writes.
//!
//! [`TargetSecret`] is the slice of a `Secret` the merge logic reasons about. The
//! [`TargetSecrets`] seam lets the reconciler run against the API server in
//! production and against an in-memory store in tests.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use k8s_openapi::ByteString;
use kube::api::PostParams;
use kube::{Api, Client};
use std::collections::BTreeMap;
use thiserror::Error;

/// Target record as seen by the merge writer
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TargetSecret {
    pub name: String,
    pub namespace: String,
    pub data: BTreeMap<String, Vec<u8>>,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    pub owner_references: Vec<OwnerReference>,
    /// Secret type, `Opaque` when unset
    pub type_: Option<String>,
    /// Optimistic concurrency token; `None` for records not yet created
    pub resource_version: Option<String>,
    /// Remaining metadata as read (finalizers, uid, creation timestamp, ...),
    /// written back untouched
    pub metadata: ObjectMeta,
    pub immutable: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TargetError {
    /// The record changed (or appeared) since it was read
    #[error("conflict writing target secret")]
    Conflict,
    #[error("{0}")]
    Api(String),
}

/// Read and write target Secrets
#[async_trait]
pub trait TargetSecrets: Send + Sync {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<TargetSecret>, TargetError>;

    /// Create a new record; `Conflict` if it already exists
    async fn create(&self, secret: &TargetSecret) -> Result<(), TargetError>;

    /// Replace an existing record; `Conflict` if `resource_version` is stale
    async fn replace(&self, secret: &TargetSecret) -> Result<(), TargetError>;
}

/// Target Secrets backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeTargetSecrets {
    client: Client,
}

impl std::fmt::Debug for KubeTargetSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeTargetSecrets").finish_non_exhaustive()
    }
}

impl KubeTargetSecrets {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, namespace: &str) -> Api<Secret> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl TargetSecrets for KubeTargetSecrets {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<TargetSecret>, TargetError> {
        let secret = self.api(namespace).get_opt(name).await.map_err(map_kube_error)?;
        Ok(secret.map(|s| from_secret(namespace, s)))
    }

    async fn create(&self, secret: &TargetSecret) -> Result<(), TargetError> {
        self.api(&secret.namespace)
            .create(&PostParams::default(), &to_secret(secret))
            .await
            .map_err(map_kube_error)?;
        Ok(())
    }

    async fn replace(&self, secret: &TargetSecret) -> Result<(), TargetError> {
        self.api(&secret.namespace)
            .replace(&secret.name, &PostParams::default(), &to_secret(secret))
            .await
            .map_err(map_kube_error)?;
        Ok(())
    }
}

fn map_kube_error(e: kube::Error) -> TargetError {
    match e {
        kube::Error::Api(api_err) if api_err.code == 409 => TargetError::Conflict,
        other => TargetError::Api(other.to_string()),
    }
}

fn from_secret(namespace: &str, secret: Secret) -> TargetSecret {
    let mut metadata = secret.metadata;
    TargetSecret {
        name: metadata.name.take().unwrap_or_default(),
        namespace: metadata
            .namespace
            .take()
            .unwrap_or_else(|| namespace.to_string()),
        data: secret
            .data
            .unwrap_or_default()
            .into_iter()
            .map(|(k, v)| (k, v.0))
            .collect(),
        labels: metadata.labels.take().unwrap_or_default(),
        annotations: metadata.annotations.take().unwrap_or_default(),
        owner_references: metadata.owner_references.take().unwrap_or_default(),
        type_: secret.type_,
        resource_version: metadata.resource_version.take(),
        metadata,
        immutable: secret.immutable,
    }
}

fn to_secret(secret: &TargetSecret) -> Secret {
    let non_empty_map = |m: &BTreeMap<String, String>| (!m.is_empty()).then(|| m.clone());
    Secret {
        metadata: ObjectMeta {
            name: Some(secret.name.clone()),
            namespace: Some(secret.namespace.clone()),
            labels: non_empty_map(&secret.labels),
            annotations: non_empty_map(&secret.annotations),
            owner_references: (!secret.owner_references.is_empty())
                .then(|| secret.owner_references.clone()),
            resource_version: secret.resource_version.clone(),
            ..secret.metadata.clone()
        },
        data: Some(
            secret
                .data
                .iter()
                .map(|(k, v)| (k.clone(), ByteString(v.clone())))
                .collect(),
        ),
        type_: Some(secret.type_.clone().unwrap_or_else(|| "Opaque".to_string())),
        immutable: secret.immutable,
        ..Secret::default()
    }
}
