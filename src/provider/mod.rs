//! # Provider Modules
//!
//! Backends the controller reads secret material from.
//!
//! Every backend implements [`ProviderClient`]: given a remote reference it returns the
//! raw payload stored under that key and version. Selecting a property out of the
//! payload is not the backend's job, see `controller::reconciler::extract`.
//!
//! Backends never retry. Retry and backoff decisions belong to the reconciler, which
//! classifies [`ProviderError`] through `SyncError::severity`.

use crate::crd::RemoteReference;
use async_trait::async_trait;
use thiserror::Error;

pub mod aws;
pub mod fake;
pub mod vault;

/// Read capability of a secret backend
#[async_trait]
pub trait ProviderClient: Send + Sync + std::fmt::Debug {
    /// Backend family name, used as metrics label
    fn provider_name(&self) -> &'static str;

    /// Fetch the payload stored under `remote.key` at `remote.version`
    /// (`None` means latest). `remote.property` is ignored here.
    async fn fetch(&self, remote: &RemoteReference) -> Result<Vec<u8>, ProviderError>;
}

/// Errors a backend can report
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// The key (or the requested version of it) does not exist
    #[error("key {key:?} not found")]
    KeyNotFound { key: String },
    /// Credentials were rejected, or lack access to the key
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Backend could not be reached or answered with a server error
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    /// Backend call did not complete in time
    #[error("backend call timed out: {0}")]
    Timeout(String),
    /// Connection parameters cannot be used (bad CA bundle, unparsable client identity, ...)
    #[error("invalid provider configuration: {0}")]
    InvalidConfig(String),
}

impl ProviderError {
    #[must_use]
    pub fn key_not_found(key: impl Into<String>) -> Self {
        Self::KeyNotFound { key: key.into() }
    }
}
