use aws_sdk_secretsmanager::operation::get_secret_value::GetSecretValueError;
use aws_smithy_runtime_api::client::orchestrator::HttpResponse;
use aws_smithy_runtime_api::client::result::SdkError;
use ethers::core::types::Address;
use thiserror::Error;

/// Errors produced while resolving private key material
#[derive(Debug, Error)]
pub enum KeySourceError {
    #[error("Environment variable {0} does not exist")]
    MissingEnv(String),

    #[error("Environment variable {0} is not valid unicode")]
    NonUnicodeEnv(String),

    #[error(
        "At least one of login methods `token`, `appRole`, `cert`, `k8s`, \
         `ldap`, `userpass` for Hashicorp Vault must be provided"
    )]
    NoLoginMethod,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("No secret found at {0}")]
    SecretNotFound(String),

    #[error("Secret {secret_id} does not have key {key}")]
    MissingSecretKey { secret_id: String, key: String },

    #[error("Secret {secret_id} has a non-string value at key {key}")]
    NonStringSecretKey { secret_id: String, key: String },

    #[error("Secret {secret_id} is not a JSON object: {source}")]
    MalformedSecret {
        secret_id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Hashicorp Vault login failed: {0}")]
    VaultLogin(String),

    #[error("Hashicorp Vault readKVSecret failed: {0}")]
    VaultRead(String),

    #[error("AWS Secrets Manager error: {0}")]
    SecretsManager(#[from] Box<SdkError<GetSecretValueError, HttpResponse>>),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid private key: {0}")]
    InvalidKey(String),

    #[error("Private key belongs to {derived:?}, expected {expected:?}")]
    AddressMismatch { expected: Address, derived: Address },
}

impl KeySourceError {
    /// True for errors raised because a secret or a key within it is absent
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::SecretNotFound(_) | Self::MissingSecretKey { .. }
        )
    }
}
