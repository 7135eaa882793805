use gcloud_sdk::google::cloud::kms::v1::key_management_service_client::KeyManagementServiceClient;
use gcloud_sdk::{GoogleApi, GoogleAuthMiddleware};

use crate::config::GcpClientConfig;

pub mod ethers_signer;

pub use ethers_signer::{GcpSigner, GcpSignerError};

pub const DEFAULT_KMS_ENDPOINT: &str = "https://cloudkms.googleapis.com";

pub type KmsClient =
    GoogleApi<KeyManagementServiceClient<GoogleAuthMiddleware>>;

/// Builds a Cloud KMS client.
///
/// Credentials are resolved through Application Default Credentials
/// (`GOOGLE_APPLICATION_CREDENTIALS`, gcloud config, metadata server).
pub async fn kms_client(
    config: Option<&GcpClientConfig>,
) -> eyre::Result<KmsClient> {
    let endpoint = config
        .and_then(|c| c.endpoint.as_deref())
        .unwrap_or(DEFAULT_KMS_ENDPOINT);

    let client =
        GoogleApi::from_function(KeyManagementServiceClient::new, endpoint, None)
            .await
            .map_err(|e| eyre::eyre!("Failed to create Cloud KMS client: {e}"))?;

    Ok(client)
}
