use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::secret_fields::SecretFields;
use super::{KeyMaterial, KeySource, KeySourceError};
use crate::aws::secrets_manager_client;
use crate::config::AwsClientConfig;

/// Identifies the secret holding the key and the JSON field it is stored
/// under
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SecretRequest {
    /// Secret name or ARN
    pub secret_id: String,
    pub secret_key_name: String,

    #[serde(default)]
    pub version_id: Option<String>,

    #[serde(default)]
    pub version_stage: Option<String>,
}

impl SecretRequest {
    pub fn new(
        secret_id: impl Into<String>,
        secret_key_name: impl Into<String>,
    ) -> Self {
        Self {
            secret_id: secret_id.into(),
            secret_key_name: secret_key_name.into(),
            version_id: None,
            version_stage: None,
        }
    }
}

/// Key stored as a field of a JSON secret in AWS Secrets Manager.
///
/// The secret is fetched again on every call to `private_key`.
#[derive(Debug, Clone)]
pub struct AwsSecretsManagerKeySource {
    client: aws_sdk_secretsmanager::Client,
    request: SecretRequest,
}

impl AwsSecretsManagerKeySource {
    /// Builds the client. No request is made until the key is requested.
    pub async fn new(
        request: SecretRequest,
        config: Option<&AwsClientConfig>,
    ) -> Self {
        let client = secrets_manager_client(config).await;

        Self::with_client(client, request)
    }

    pub fn with_client(
        client: aws_sdk_secretsmanager::Client,
        request: SecretRequest,
    ) -> Self {
        Self { client, request }
    }

    pub fn request(&self) -> &SecretRequest {
        &self.request
    }
}

#[async_trait::async_trait]
impl KeySource for AwsSecretsManagerKeySource {
    #[instrument(err, skip(self), fields(secret_id = %self.request.secret_id))]
    async fn private_key(&self) -> Result<KeyMaterial, KeySourceError> {
        let secret_id = self.request.secret_id.as_str();

        let output = self
            .client
            .get_secret_value()
            .secret_id(secret_id)
            .set_version_id(self.request.version_id.clone())
            .set_version_stage(self.request.version_stage.clone())
            .send()
            .await;

        let output = match output {
            Ok(output) => output,
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_resource_not_found_exception()) =>
            {
                return Err(KeySourceError::SecretNotFound(
                    secret_id.to_owned(),
                ));
            }
            Err(err) => return Err(Box::new(err).into()),
        };

        tracing::debug!("Fetched secret value");

        let private_key = private_key_from_secret_string(
            secret_id,
            output.secret_string(),
            &self.request.secret_key_name,
        )?;

        Ok(private_key)
    }
}

fn private_key_from_secret_string(
    secret_id: &str,
    secret_string: Option<&str>,
    key: &str,
) -> Result<KeyMaterial, KeySourceError> {
    let secret_string = match secret_string {
        Some(s) if !s.is_empty() => s,
        _ => return Err(KeySourceError::SecretNotFound(secret_id.to_owned())),
    };

    let fields = SecretFields::parse(secret_id, secret_string)?;

    Ok(fields.field(key)?.into())
}
