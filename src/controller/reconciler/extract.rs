//! # Data Extraction
//!
//! Selects the value of a data request out of a fetched payload.
//!
//! Without a property the payload is used as-is. With a property the payload must
//! be a JSON document and the property is resolved against it:
//!
//! 1. an exact top-level key wins (so `"tls.crt"` addresses a key containing a dot)
//! 2. otherwise the property is a dot path, numeric segments index into arrays
//!    (`"servers.0.host"`)
//!
//! A string value is returned as its raw bytes; any other JSON value is returned
//! in its compact JSON encoding.

use super::SyncError;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    #[error("property {0:?} not found")]
    PropertyNotFound(String),
    #[error("payload is not valid JSON: {0}")]
    MalformedPayload(String),
}

impl ExtractError {
    /// Attach the remote key the payload came from
    #[must_use]
    pub fn into_sync_error(self, key: &str) -> SyncError {
        match self {
            ExtractError::PropertyNotFound(property) => SyncError::PropertyNotFound {
                key: key.to_string(),
                property,
            },
            ExtractError::MalformedPayload(reason) => SyncError::MalformedPayload {
                key: key.to_string(),
                reason,
            },
        }
    }
}

/// Extract the value addressed by `property` from `payload`
///
/// # Errors
///
/// - `MalformedPayload` when a property is given and the payload is not JSON
/// - `PropertyNotFound` when the property does not resolve
pub fn extract(payload: &[u8], property: Option<&str>) -> Result<Vec<u8>, ExtractError> {
    let Some(property) = property.filter(|p| !p.is_empty()) else {
        return Ok(payload.to_vec());
    };

    let document: Value = serde_json::from_slice(payload)
        .map_err(|e| ExtractError::MalformedPayload(e.to_string()))?;

    let value = lookup(&document, property)
        .ok_or_else(|| ExtractError::PropertyNotFound(property.to_string()))?;

    Ok(match value {
        Value::String(s) => s.as_bytes().to_vec(),
        other => other.to_string().into_bytes(),
    })
}

fn lookup<'a>(document: &'a Value, property: &str) -> Option<&'a Value> {
    if let Some(value) = document.as_object().and_then(|o| o.get(property)) {
        return Some(value);
    }

    property.split('.').try_fold(document, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}
