//! # Reconciler
//!
//! Keeps the target Secret of each `ExternalSecret` in sync with the external
//! store it references.
//!
//! ## Reconciliation Flow
//!
//! 1. Validate the declaration
//! 2. Resolve the referenced store into an authenticated provider client
//! 3. Fetch every data entry and extract the requested property
//! 4. Render templated fields
//! 5. Merge the result into the target Secret
//! 6. Update status
//!
//! Nothing is written unless every step before the merge succeeded.

pub mod engine;
pub mod error;
pub mod extract;
pub mod merge;
pub mod reconcile;
pub mod status;
pub mod target;
pub mod template;
pub mod types;
pub mod validation;

// Re-export public API
pub use engine::{EngineSettings, SyncEngine};
pub use error::{Severity, SyncError};
pub use extract::{extract, ExtractError};
pub use merge::{DesiredTarget, WriteOutcome};
pub use reconcile::{reconcile, resource_key};
pub use status::{DeclarationIdentity, ExternalSecretApi, KubeExternalSecrets};
pub use target::{KubeTargetSecrets, TargetError, TargetSecret, TargetSecrets};
pub use template::{TemplateEngine, TemplateError};
pub use types::{BackoffState, ReconcilePhase, Reconciler, SyncReport};
