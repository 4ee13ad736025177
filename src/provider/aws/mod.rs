//! # AWS Secrets Manager Client
//!
//! Reads secret values from AWS Secrets Manager.
//!
//! Version selection:
//! - no version: the `AWSCURRENT` stage
//! - `uuid/<id>`: that exact version id
//! - anything else: a version stage label (e.g. `AWSPREVIOUS`)

mod auth;

pub use auth::AwsCredentials;

use crate::crd::RemoteReference;
use crate::provider::{ProviderClient, ProviderError};
use async_trait::async_trait;
use aws_sdk_secretsmanager::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_secretsmanager::operation::get_secret_value::GetSecretValueError;
use aws_sdk_secretsmanager::Client as SecretsManagerClient;
use std::time::Duration;
use tracing::Instrument;

const CURRENT_STAGE: &str = "AWSCURRENT";
const VERSION_ID_PREFIX: &str = "uuid/";

/// How a requested version maps onto the GetSecretValue API
#[derive(Debug, Clone, PartialEq, Eq)]
enum VersionSelector<'a> {
    Stage(&'a str),
    Id(&'a str),
}

fn version_selector(version: Option<&str>) -> VersionSelector<'_> {
    match version {
        None | Some("") => VersionSelector::Stage(CURRENT_STAGE),
        Some(version) => match version.strip_prefix(VERSION_ID_PREFIX) {
            Some(id) => VersionSelector::Id(id),
            None => VersionSelector::Stage(version),
        },
    }
}

/// AWS Secrets Manager provider implementation
pub struct AwsSecretsManager {
    client: SecretsManagerClient,
    region: String,
}

impl std::fmt::Debug for AwsSecretsManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsSecretsManager")
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}

impl AwsSecretsManager {
    /// Create a client for `region`
    ///
    /// No network traffic happens here; bad credentials surface on the first fetch.
    pub async fn new(region: &str, credentials: AwsCredentials, timeout: Duration) -> Self {
        let sdk_config = auth::sdk_config(region, credentials, timeout).await;
        Self {
            client: SecretsManagerClient::new(&sdk_config),
            region: region.to_string(),
        }
    }
}

#[async_trait]
impl ProviderClient for AwsSecretsManager {
    fn provider_name(&self) -> &'static str {
        "aws"
    }

    async fn fetch(&self, remote: &RemoteReference) -> Result<Vec<u8>, ProviderError> {
        let span = tracing::debug_span!(
            "aws.secret.get",
            secret.name = %remote.key,
            region = %self.region
        );

        async move {
            let request = self.client.get_secret_value().secret_id(&remote.key);
            let request = match version_selector(remote.version.as_deref()) {
                VersionSelector::Stage(stage) => request.version_stage(stage),
                VersionSelector::Id(id) => request.version_id(id),
            };

            let response = request
                .send()
                .await
                .map_err(|e| map_sdk_error(&remote.key, &e))?;

            response
                .secret_string()
                .map(|s| s.as_bytes().to_vec())
                .or_else(|| response.secret_binary().map(|blob| blob.as_ref().to_vec()))
                .ok_or_else(|| ProviderError::key_not_found(&remote.key))
        }
        .instrument(span)
        .await
    }
}

fn map_sdk_error<R>(key: &str, e: &SdkError<GetSecretValueError, R>) -> ProviderError
where
    R: std::fmt::Debug,
{
    let message = DisplayErrorContext(e).to_string();
    match e {
        SdkError::TimeoutError(_) => ProviderError::Timeout(message),
        SdkError::DispatchFailure(failure) if failure.is_timeout() => {
            ProviderError::Timeout(message)
        }
        SdkError::ServiceError(service) => match service.err() {
            GetSecretValueError::ResourceNotFoundException(_) => ProviderError::key_not_found(key),
            GetSecretValueError::DecryptionFailure(_) => ProviderError::Unauthorized(message),
            other => match other.code() {
                Some(
                    "AccessDeniedException"
                    | "UnrecognizedClientException"
                    | "InvalidSignatureException"
                    | "ExpiredTokenException",
                ) => ProviderError::Unauthorized(message),
                _ => ProviderError::Unavailable(message),
            },
        },
        _ => ProviderError::Unavailable(message),
    }
}
