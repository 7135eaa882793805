use aws_config::{BehaviorVersion, SdkConfig};
use aws_credential_types::Credentials;
use aws_types::region::Region;

use crate::config::AwsClientConfig;

pub mod ethers_signer;

pub use ethers_signer::{AwsSigner, AwsSignerError};

/// Builds the shared SDK configuration for AWS clients.
///
/// Anything not set in `config` falls back to the default provider chain
/// (environment, profile, instance metadata).
pub async fn load_sdk_config(config: Option<&AwsClientConfig>) -> SdkConfig {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());

    let Some(config) = config else {
        return loader.load().await;
    };

    if let Some(region) = &config.region {
        loader = loader.region(Region::new(region.clone()));
    }

    if let Some(endpoint) = &config.endpoint {
        loader = loader.endpoint_url(endpoint.as_str());
    }

    if let Some(credentials) = &config.credentials {
        loader = loader.credentials_provider(Credentials::from_keys(
            credentials.access_key_id.clone(),
            credentials.secret_access_key.expose().to_owned(),
            credentials
                .session_token
                .as_ref()
                .map(|token| token.expose().to_owned()),
        ));
    }

    loader.load().await
}

pub async fn kms_client(config: Option<&AwsClientConfig>) -> aws_sdk_kms::Client {
    let sdk_config = load_sdk_config(config).await;

    aws_sdk_kms::Client::new(&sdk_config)
}

pub async fn secrets_manager_client(
    config: Option<&AwsClientConfig>,
) -> aws_sdk_secretsmanager::Client {
    let sdk_config = load_sdk_config(config).await;

    aws_sdk_secretsmanager::Client::new(&sdk_config)
}
