//! # Prelude
//!
//! Re-exports commonly used types and traits.
//!
//! ```rust
//! use external_secrets_controller::prelude::*;
//! ```

// CRD types
pub use crate::crd::*;

// Provider seam
pub use crate::provider::{ProviderClient, ProviderError};

// Store resolution
pub use crate::controller::resolver::{
    CredentialSource, DefaultStoreResolver, StoreDeclaration, StoreLookup, StoreResolver,
};

// Reconciler types
pub use crate::controller::reconciler::{
    reconcile, EngineSettings, ExternalSecretApi, Reconciler, Severity, SyncEngine, SyncError,
    SyncReport, TargetSecret, TargetSecrets, WriteOutcome,
};

pub use crate::config::ControllerConfig;
