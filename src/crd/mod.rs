//! # Custom Resource Definitions
//!
//! CRD types for the External Secrets Controller.
//!
//! ## Module Structure
//!
//! - `external_secret.rs` - `ExternalSecret` declaration and its data requests
//! - `store.rs` - `SecretStore` / `ClusterSecretStore` and provider/auth configuration
//! - `selector.rs` - References into credential Secrets
//! - `status.rs` - Status types for tracking reconciliation state

mod external_secret;
mod selector;
mod status;
mod store;

pub use external_secret::{
    default_refresh_interval, CreationPolicy, ExternalSecret, ExternalSecretData,
    ExternalSecretSpec, ExternalSecretTarget, ExternalSecretTemplate, RemoteReference,
    SecretStoreRef, StoreKind,
};
pub use selector::SecretKeySelector;
pub use status::{Condition, ExternalSecretStatus};
pub use store::{
    AwsAuth, AwsAuthSecretRef, AwsProvider, ClusterSecretStore, ClusterSecretStoreSpec,
    FakeProvider, FakeProviderData, ProviderSelectionError, SecretStore, SecretStoreProvider,
    SecretStoreSpec, SelectedProvider, SelectedVaultAuth, VaultAppRole, VaultAuth, VaultCertAuth,
    VaultKvVersion, VaultProvider,
};

/// API group shared by all resources of this controller
pub const API_GROUP: &str = "external-secrets.io";
