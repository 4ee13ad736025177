//! AWS SDK configuration
//!
//! Static access keys from a credential Secret, or the ambient credential chain
//! (IRSA, instance profile, environment) when the store sets no auth.

use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_credential_types::Credentials;
use std::time::Duration;
use tracing::debug;
use zeroize::Zeroizing;

/// Credentials used to sign Secrets Manager requests
pub enum AwsCredentials {
    /// Access key pair read from a Secret
    Static {
        access_key_id: Zeroizing<String>,
        secret_access_key: Zeroizing<String>,
    },
    /// Default provider chain; IRSA requires the pod service account annotation
    /// `eks.amazonaws.com/role-arn`
    Ambient,
}

impl std::fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Static { .. } => f.debug_struct("Static").finish_non_exhaustive(),
            Self::Ambient => f.write_str("Ambient"),
        }
    }
}

/// Build the SDK configuration for one store
pub(super) async fn sdk_config(
    region: &str,
    credentials: AwsCredentials,
    timeout: Duration,
) -> SdkConfig {
    let timeouts = aws_config::timeout::TimeoutConfig::builder()
        .operation_timeout(timeout)
        .build();
    let loader = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(region.to_string()))
        .timeout_config(timeouts);

    match credentials {
        AwsCredentials::Static {
            access_key_id,
            secret_access_key,
        } => {
            debug!(region, "using static access key credentials");
            let credentials = Credentials::new(
                access_key_id.as_str(),
                secret_access_key.as_str(),
                None,
                None,
                "external-secrets-secret-ref",
            );
            loader.credentials_provider(credentials).load().await
        }
        AwsCredentials::Ambient => {
            debug!(region, "using default credential chain");
            loader.load().await
        }
    }
}
