//! # Sync Errors
//!
//! Error taxonomy of a reconcile attempt and the single place that decides how
//! each error is retried.

use crate::crd::StoreKind;
use crate::provider::ProviderError;
use thiserror::Error;

/// Failure of one reconcile attempt
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// Referenced store does not exist. `name` is the requested name verbatim
    #[error("{kind} {name:?} not found")]
    StoreNotFound { name: String, kind: StoreKind },
    #[error("invalid store configuration: {0}")]
    InvalidStoreConfig(String),
    /// Store belongs to a different controller class
    #[error("store {name:?} is handled by controller class {class:?}")]
    StoreNotManaged { name: String, class: String },
    #[error("key {key:?} not found")]
    KeyNotFound { key: String },
    #[error("property {property:?} not found in key {key:?}")]
    PropertyNotFound { key: String, property: String },
    #[error("payload of key {key:?} is not valid JSON: {reason}")]
    MalformedPayload { key: String, reason: String },
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("timed out: {0}")]
    Timeout(String),
    #[error("failed to render template for {field:?}: {reason}")]
    TemplateRender { field: String, reason: String },
    #[error("target secret write conflicted {attempts} times")]
    WriteConflict { attempts: u32 },
    #[error("invalid ExternalSecret: {0}")]
    InvalidDeclaration(String),
    /// Declaration changed or disappeared while the attempt was running
    #[error("ExternalSecret changed or was deleted during the attempt, write abandoned")]
    Superseded,
    #[error("target secret API error: {0}")]
    TargetApi(String),
}

/// How the runtime retries an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Retry with exponential backoff
    Transient,
    /// Retry at the slow fixed interval; needs a config or credentials change
    Permanent,
    /// Nothing to report; wait for the next change
    Ignored,
}

impl SyncError {
    #[must_use]
    pub fn severity(&self) -> Severity {
        match self {
            SyncError::Unavailable(_)
            | SyncError::Timeout(_)
            | SyncError::WriteConflict { .. }
            | SyncError::TargetApi(_) => Severity::Transient,
            SyncError::StoreNotFound { .. }
            | SyncError::InvalidStoreConfig(_)
            | SyncError::KeyNotFound { .. }
            | SyncError::PropertyNotFound { .. }
            | SyncError::MalformedPayload { .. }
            | SyncError::Unauthorized(_)
            | SyncError::TemplateRender { .. }
            | SyncError::InvalidDeclaration(_) => Severity::Permanent,
            SyncError::StoreNotManaged { .. } | SyncError::Superseded => Severity::Ignored,
        }
    }

    /// Condition reason and metrics label
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            SyncError::StoreNotFound { .. } => "StoreNotFound",
            SyncError::InvalidStoreConfig(_) => "InvalidStoreConfig",
            SyncError::StoreNotManaged { .. } => "StoreNotManaged",
            SyncError::KeyNotFound { .. } => "KeyNotFound",
            SyncError::PropertyNotFound { .. } => "PropertyNotFound",
            SyncError::MalformedPayload { .. } => "MalformedPayload",
            SyncError::Unauthorized(_) => "Unauthorized",
            SyncError::Unavailable(_) => "Unavailable",
            SyncError::Timeout(_) => "Timeout",
            SyncError::TemplateRender { .. } => "TemplateRenderError",
            SyncError::WriteConflict { .. } => "WriteConflict",
            SyncError::InvalidDeclaration(_) => "InvalidDeclaration",
            SyncError::Superseded => "Superseded",
            SyncError::TargetApi(_) => "TargetApiError",
        }
    }
}

impl From<ProviderError> for SyncError {
    fn from(e: ProviderError) -> Self {
        match e {
            ProviderError::KeyNotFound { key } => SyncError::KeyNotFound { key },
            ProviderError::Unauthorized(msg) => SyncError::Unauthorized(msg),
            ProviderError::Unavailable(msg) => SyncError::Unavailable(msg),
            ProviderError::Timeout(msg) => SyncError::Timeout(msg),
            ProviderError::InvalidConfig(msg) => SyncError::InvalidStoreConfig(msg),
        }
    }
}

impl From<kube::Error> for SyncError {
    fn from(e: kube::Error) -> Self {
        SyncError::TargetApi(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_errors() {
        for err in [
            SyncError::Unavailable("503".to_string()),
            SyncError::Timeout("10s".to_string()),
            SyncError::WriteConflict { attempts: 4 },
            SyncError::TargetApi("connection reset".to_string()),
        ] {
            assert_eq!(err.severity(), Severity::Transient, "{err}");
        }
    }

    #[test]
    fn test_permanent_errors() {
        for err in [
            SyncError::StoreNotFound {
                name: "missing".to_string(),
                kind: StoreKind::SecretStore,
            },
            SyncError::InvalidStoreConfig("no provider".to_string()),
            SyncError::KeyNotFound {
                key: "k".to_string(),
            },
            SyncError::PropertyNotFound {
                key: "k".to_string(),
                property: "p".to_string(),
            },
            SyncError::Unauthorized("denied".to_string()),
            SyncError::TemplateRender {
                field: "f".to_string(),
                reason: "undefined".to_string(),
            },
            SyncError::InvalidDeclaration("empty key".to_string()),
        ] {
            assert_eq!(err.severity(), Severity::Permanent, "{err}");
        }
    }

    #[test]
    fn test_ignored_errors() {
        assert_eq!(SyncError::Superseded.severity(), Severity::Ignored);
        assert_eq!(
            SyncError::StoreNotManaged {
                name: "s".to_string(),
                class: "other".to_string()
            }
            .severity(),
            Severity::Ignored
        );
    }

    #[test]
    fn test_store_not_found_message_carries_requested_name() {
        let err = SyncError::StoreNotFound {
            name: "vault-prod".to_string(),
            kind: StoreKind::ClusterSecretStore,
        };
        assert_eq!(err.to_string(), r#"ClusterSecretStore "vault-prod" not found"#);
    }

    #[test]
    fn test_provider_errors_convert() {
        assert_eq!(
            SyncError::from(ProviderError::key_not_found("a/b")),
            SyncError::KeyNotFound {
                key: "a/b".to_string()
            }
        );
        assert!(matches!(
            SyncError::from(ProviderError::InvalidConfig("bad ca".to_string())),
            SyncError::InvalidStoreConfig(_)
        ));
    }
}
