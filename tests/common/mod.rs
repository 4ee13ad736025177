//! Common test utilities
//!
//! In-memory stand-ins for the Kubernetes API seams used by the reconciler,
//! plus fixture builders for ExternalSecrets and stores.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use async_trait::async_trait;
use external_secrets_controller::config::ControllerConfig;
use external_secrets_controller::controller::reconciler::{
    DeclarationIdentity, EngineSettings, ExternalSecretApi, Reconciler, SyncEngine, SyncError,
    TargetError, TargetSecret, TargetSecrets,
};
use external_secrets_controller::controller::resolver::{
    CredentialSource, DefaultStoreResolver, LookupError, StoreDeclaration, StoreLookup,
    StoreResolver,
};
use external_secrets_controller::crd::{
    CreationPolicy, ExternalSecret, ExternalSecretData, ExternalSecretSpec, ExternalSecretStatus,
    ExternalSecretTarget, ExternalSecretTemplate, FakeProvider, FakeProviderData,
    RemoteReference, SecretStoreProvider, SecretStoreRef, SecretStoreSpec, StoreKind,
};
use external_secrets_controller::provider::fake::FakeProviderClient;
use external_secrets_controller::provider::ProviderClient;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;
use zeroize::Zeroizing;

static RUSTLS_INIT: Once = Once::new();

/// Initialize rustls crypto provider for tests
///
/// Uses a `Once` to ensure it's only called once per test binary.
pub fn init_rustls() {
    RUSTLS_INIT.call_once(|| {
        rustls::crypto::ring::default_provider()
            .install_default()
            .expect("Failed to install rustls crypto provider");
    });
}

// ============================================================================
// Stores and credentials
// ============================================================================

/// Stores and credential Secrets held in memory
#[derive(Debug, Default)]
pub struct InMemoryCluster {
    stores: Mutex<HashMap<(StoreKind, Option<String>, String), SecretStoreSpec>>,
    secrets: Mutex<HashMap<(String, String), BTreeMap<String, Vec<u8>>>>,
    pub credential_reads: AtomicU32,
}

impl InMemoryCluster {
    pub fn add_store(&self, namespace: &str, name: &str, spec: SecretStoreSpec) {
        self.stores.lock().unwrap().insert(
            (StoreKind::SecretStore, Some(namespace.to_string()), name.to_string()),
            spec,
        );
    }

    pub fn add_cluster_store(&self, name: &str, spec: SecretStoreSpec) {
        self.stores
            .lock()
            .unwrap()
            .insert((StoreKind::ClusterSecretStore, None, name.to_string()), spec);
    }

    pub fn add_secret(&self, namespace: &str, name: &str, data: &[(&str, &[u8])]) {
        self.secrets.lock().unwrap().insert(
            (namespace.to_string(), name.to_string()),
            data.iter()
                .map(|(k, v)| ((*k).to_string(), v.to_vec()))
                .collect(),
        );
    }
}

#[async_trait]
impl StoreLookup for InMemoryCluster {
    async fn get_store(
        &self,
        kind: StoreKind,
        namespace: &str,
        name: &str,
    ) -> Result<Option<StoreDeclaration>, LookupError> {
        let scope = match kind {
            StoreKind::SecretStore => Some(namespace.to_string()),
            StoreKind::ClusterSecretStore => None,
        };
        Ok(self
            .stores
            .lock()
            .unwrap()
            .get(&(kind, scope.clone(), name.to_string()))
            .map(|spec| StoreDeclaration {
                name: name.to_string(),
                namespace: scope,
                kind,
                spec: spec.clone(),
            }))
    }
}

#[async_trait]
impl CredentialSource for InMemoryCluster {
    async fn read(
        &self,
        namespace: &str,
        name: &str,
        key: &str,
    ) -> Result<Zeroizing<Vec<u8>>, LookupError> {
        self.credential_reads.fetch_add(1, Ordering::SeqCst);
        let secrets = self.secrets.lock().unwrap();
        let secret = secrets
            .get(&(namespace.to_string(), name.to_string()))
            .ok_or_else(|| LookupError::SecretNotFound {
                namespace: namespace.to_string(),
                name: name.to_string(),
            })?;
        secret
            .get(key)
            .map(|value| Zeroizing::new(value.clone()))
            .ok_or_else(|| LookupError::KeyNotFound {
                namespace: namespace.to_string(),
                name: name.to_string(),
                key: key.to_string(),
            })
    }
}

/// Resolver over an in-memory cluster, acting for the default controller class
pub fn resolver_for(cluster: &Arc<InMemoryCluster>) -> DefaultStoreResolver {
    DefaultStoreResolver::new(
        Arc::clone(cluster) as Arc<dyn StoreLookup>,
        Arc::clone(cluster) as Arc<dyn CredentialSource>,
        "",
        Duration::from_secs(5),
    )
}

/// Resolver that hands out a fixed provider, or fails with a scripted error
#[derive(Debug)]
pub struct ScriptedResolver {
    provider: Arc<dyn ProviderClient>,
    failures: Mutex<Vec<SyncError>>,
}

impl ScriptedResolver {
    pub fn new(provider: Arc<dyn ProviderClient>) -> Self {
        Self {
            provider,
            failures: Mutex::new(Vec::new()),
        }
    }

    /// Fail the next resolves with these errors, in order
    pub fn fail_with(self, errors: Vec<SyncError>) -> Self {
        *self.failures.lock().unwrap() = errors.into_iter().rev().collect();
        self
    }
}

#[async_trait]
impl StoreResolver for ScriptedResolver {
    async fn resolve(
        &self,
        _store_ref: &SecretStoreRef,
        _namespace: &str,
    ) -> Result<Arc<dyn ProviderClient>, SyncError> {
        match self.failures.lock().unwrap().pop() {
            Some(error) => Err(error),
            None => Ok(Arc::clone(&self.provider)),
        }
    }
}

// ============================================================================
// Target Secrets
// ============================================================================

/// Target Secrets held in memory with resource-version checks
#[derive(Debug, Default)]
pub struct InMemoryTargets {
    secrets: Mutex<HashMap<(String, String), TargetSecret>>,
    next_version: AtomicU32,
    /// Number of upcoming writes that fail with a conflict
    pub conflicts_to_inject: AtomicU32,
    pub writes: AtomicU32,
}

impl InMemoryTargets {
    pub fn get_secret(&self, namespace: &str, name: &str) -> Option<TargetSecret> {
        self.secrets
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    /// Seed a record as if someone else created it
    pub fn seed(&self, namespace: &str, name: &str, data: &[(&str, &str)]) {
        let secret = TargetSecret {
            name: name.to_string(),
            namespace: namespace.to_string(),
            data: data
                .iter()
                .map(|(k, v)| ((*k).to_string(), v.as_bytes().to_vec()))
                .collect(),
            resource_version: Some(self.bump()),
            ..TargetSecret::default()
        };
        self.secrets
            .lock()
            .unwrap()
            .insert((namespace.to_string(), name.to_string()), secret);
    }

    pub fn string_data(&self, namespace: &str, name: &str) -> BTreeMap<String, String> {
        self.get_secret(namespace, name)
            .map(|secret| {
                secret
                    .data
                    .into_iter()
                    .map(|(k, v)| (k, String::from_utf8(v).unwrap()))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn bump(&self) -> String {
        (self.next_version.fetch_add(1, Ordering::SeqCst) + 1).to_string()
    }

    fn injected_conflict(&self) -> bool {
        self.conflicts_to_inject
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl TargetSecrets for InMemoryTargets {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<TargetSecret>, TargetError> {
        Ok(self.get_secret(namespace, name))
    }

    async fn create(&self, secret: &TargetSecret) -> Result<(), TargetError> {
        if self.injected_conflict() {
            return Err(TargetError::Conflict);
        }
        let mut secrets = self.secrets.lock().unwrap();
        let key = (secret.namespace.clone(), secret.name.clone());
        if secrets.contains_key(&key) {
            return Err(TargetError::Conflict);
        }
        let mut stored = secret.clone();
        stored.resource_version = Some(self.bump());
        secrets.insert(key, stored);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn replace(&self, secret: &TargetSecret) -> Result<(), TargetError> {
        if self.injected_conflict() {
            return Err(TargetError::Conflict);
        }
        let mut secrets = self.secrets.lock().unwrap();
        let key = (secret.namespace.clone(), secret.name.clone());
        match secrets.get(&key) {
            Some(current) if current.resource_version == secret.resource_version => {}
            _ => return Err(TargetError::Conflict),
        }
        let mut stored = secret.clone();
        stored.resource_version = Some(self.bump());
        secrets.insert(key, stored);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ============================================================================
// Declarations
// ============================================================================

/// Declarations as the API server currently stores them, plus every status patch
#[derive(Debug, Default)]
pub struct InMemoryDeclarations {
    current: Mutex<HashMap<(String, String), DeclarationIdentity>>,
    pub patches: Mutex<Vec<ExternalSecretStatus>>,
}

impl InMemoryDeclarations {
    /// Record the declaration as stored
    pub fn store(&self, es: &ExternalSecret) {
        self.current.lock().unwrap().insert(
            (
                es.metadata.namespace.clone().unwrap_or_default(),
                es.metadata.name.clone().unwrap_or_default(),
            ),
            DeclarationIdentity {
                uid: es.metadata.uid.clone(),
                generation: es.metadata.generation,
                deleting: false,
            },
        );
    }

    pub fn remove(&self, namespace: &str, name: &str) {
        self.current
            .lock()
            .unwrap()
            .remove(&(namespace.to_string(), name.to_string()));
    }

    pub fn last_status(&self) -> Option<ExternalSecretStatus> {
        self.patches.lock().unwrap().last().cloned()
    }

    pub fn patch_count(&self) -> usize {
        self.patches.lock().unwrap().len()
    }
}

#[async_trait]
impl ExternalSecretApi for InMemoryDeclarations {
    async fn identity(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<DeclarationIdentity>, SyncError> {
        Ok(self
            .current
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }

    async fn patch_status(
        &self,
        _namespace: &str,
        _name: &str,
        status: &ExternalSecretStatus,
    ) -> Result<(), SyncError> {
        self.patches.lock().unwrap().push(status.clone());
        Ok(())
    }
}

// ============================================================================
// Harness
// ============================================================================

/// Engine wired to in-memory collaborators
pub struct Harness {
    pub engine: SyncEngine,
    pub targets: Arc<InMemoryTargets>,
    pub declarations: Arc<InMemoryDeclarations>,
}

impl Harness {
    pub fn new(resolver: Arc<dyn StoreResolver>) -> Self {
        let targets = Arc::new(InMemoryTargets::default());
        let declarations = Arc::new(InMemoryDeclarations::default());
        let settings = EngineSettings {
            call_timeout: Duration::from_secs(5),
            attempt_deadline: Duration::from_secs(30),
            write_conflict_retries: 3,
            min_refresh_interval_secs: 10,
        };
        let engine = SyncEngine::new(
            resolver,
            Arc::clone(&targets) as Arc<dyn TargetSecrets>,
            Arc::clone(&declarations) as Arc<dyn ExternalSecretApi>,
            settings,
        );
        Self {
            engine,
            targets,
            declarations,
        }
    }

    /// Hand the engine to a reconcile context
    pub fn into_reconciler(self, config: ControllerConfig) -> Arc<Reconciler> {
        Arc::new(Reconciler::with_engine(self.engine, config))
    }
}

// ============================================================================
// Fixture builders
// ============================================================================

/// Fluent builder for ExternalSecret fixtures
#[derive(Debug, Clone)]
pub struct ExternalSecretBuilder {
    es: ExternalSecret,
}

impl ExternalSecretBuilder {
    pub fn new(namespace: &str, name: &str) -> Self {
        let mut es = ExternalSecret::new(
            name,
            ExternalSecretSpec {
                secret_store_ref: SecretStoreRef {
                    name: "store".to_string(),
                    kind: StoreKind::SecretStore,
                },
                target: ExternalSecretTarget::default(),
                refresh_interval: "1h".to_string(),
                data: Vec::new(),
            },
        );
        es.metadata.namespace = Some(namespace.to_string());
        es.metadata.uid = Some(format!("uid-{namespace}-{name}"));
        es.metadata.generation = Some(1);
        Self { es }
    }

    pub fn store(mut self, kind: StoreKind, name: &str) -> Self {
        self.es.spec.secret_store_ref = SecretStoreRef {
            name: name.to_string(),
            kind,
        };
        self
    }

    pub fn target(mut self, name: &str) -> Self {
        self.es.spec.target.name = Some(name.to_string());
        self
    }

    pub fn orphan(mut self) -> Self {
        self.es.spec.target.creation_policy = CreationPolicy::Orphan;
        self
    }

    pub fn refresh(mut self, interval: &str) -> Self {
        self.es.spec.refresh_interval = interval.to_string();
        self
    }

    pub fn data(mut self, secret_key: &str, remote_key: &str) -> Self {
        self.es.spec.data.push(ExternalSecretData {
            secret_key: secret_key.to_string(),
            remote_ref: RemoteReference::new(remote_key),
        });
        self
    }

    pub fn data_ref(mut self, secret_key: &str, remote_ref: RemoteReference) -> Self {
        self.es.spec.data.push(ExternalSecretData {
            secret_key: secret_key.to_string(),
            remote_ref,
        });
        self
    }

    pub fn template(mut self, field: &str, template: &str) -> Self {
        self.es
            .spec
            .target
            .template
            .get_or_insert_with(ExternalSecretTemplate::default)
            .data
            .insert(field.to_string(), template.to_string());
        self
    }

    pub fn generation(mut self, generation: i64) -> Self {
        self.es.metadata.generation = Some(generation);
        self
    }

    pub fn status(mut self, status: ExternalSecretStatus) -> Self {
        self.es.status = Some(status);
        self
    }

    pub fn build(self) -> ExternalSecret {
        self.es
    }
}

/// Store spec serving static values through the fake provider
pub fn fake_store(values: &[(&str, &str)]) -> SecretStoreSpec {
    SecretStoreSpec {
        controller: None,
        provider: SecretStoreProvider {
            fake: Some(FakeProvider {
                data: values
                    .iter()
                    .map(|(key, value)| FakeProviderData {
                        key: (*key).to_string(),
                        version: None,
                        value: (*value).to_string(),
                    })
                    .collect(),
            }),
            ..SecretStoreProvider::default()
        },
    }
}

/// Fake backend serving unversioned values, without going through a store
pub fn fake_client(values: &[(&str, &str)]) -> FakeProviderClient {
    match fake_store(values).provider.fake {
        Some(spec) => FakeProviderClient::new(&spec),
        None => FakeProviderClient::default(),
    }
}
