//! # Fake Provider
//!
//! Serves values embedded in the store itself. Useful for smoke tests and demos
//! where no real backend is available.

use crate::crd::{FakeProvider, RemoteReference};
use crate::provider::{ProviderClient, ProviderError};
use async_trait::async_trait;
use std::collections::HashMap;

/// In-memory backend built from a `FakeProvider` store spec
#[derive(Debug, Clone, Default)]
pub struct FakeProviderClient {
    /// (key, version) -> value; unversioned entries are stored under `None`
    values: HashMap<(String, Option<String>), Vec<u8>>,
}

impl FakeProviderClient {
    #[must_use]
    pub fn new(spec: &FakeProvider) -> Self {
        let values = spec
            .data
            .iter()
            .map(|entry| {
                (
                    (entry.key.clone(), entry.version.clone()),
                    entry.value.as_bytes().to_vec(),
                )
            })
            .collect();
        Self { values }
    }
}

#[async_trait]
impl ProviderClient for FakeProviderClient {
    fn provider_name(&self) -> &'static str {
        "fake"
    }

    async fn fetch(&self, remote: &RemoteReference) -> Result<Vec<u8>, ProviderError> {
        self.values
            .get(&(remote.key.clone(), remote.version.clone()))
            .cloned()
            .ok_or_else(|| ProviderError::key_not_found(&remote.key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::FakeProviderData;

    fn spec() -> FakeProvider {
        FakeProvider {
            data: vec![
                FakeProviderData {
                    key: "db".to_string(),
                    version: None,
                    value: r#"{"user":"admin"}"#.to_string(),
                },
                FakeProviderData {
                    key: "db".to_string(),
                    version: Some("1".to_string()),
                    value: r#"{"user":"old"}"#.to_string(),
                },
            ],
        }
    }

    #[tokio::test]
    async fn test_fetch_latest_and_versioned() {
        let client = FakeProviderClient::new(&spec());
        let latest = client.fetch(&RemoteReference::new("db")).await.unwrap();
        assert_eq!(latest, br#"{"user":"admin"}"#);

        let mut versioned = RemoteReference::new("db");
        versioned.version = Some("1".to_string());
        assert_eq!(client.fetch(&versioned).await.unwrap(), br#"{"user":"old"}"#);
    }

    #[tokio::test]
    async fn test_fetch_missing_key() {
        let client = FakeProviderClient::new(&spec());
        let err = client.fetch(&RemoteReference::new("nope")).await.unwrap_err();
        assert_eq!(err, ProviderError::key_not_found("nope"));

        let mut unknown_version = RemoteReference::new("db");
        unknown_version.version = Some("9".to_string());
        assert!(matches!(
            client.fetch(&unknown_version).await,
            Err(ProviderError::KeyNotFound { .. })
        ));
    }
}
