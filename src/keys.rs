pub mod aws_secrets_manager;
pub mod env;
pub mod error;
pub mod hashicorp_vault;
pub mod key_material;
pub mod plain;
mod secret_fields;
pub mod universal_signer;

pub use aws_secrets_manager::{AwsSecretsManagerKeySource, SecretRequest};
pub use env::EnvKeySource;
pub use error::KeySourceError;
pub use hashicorp_vault::{HashicorpVaultKeySource, LoginParams, SecretParams};
pub use key_material::{ExternallyOwnedAccount, KeyMaterial, RawKey};
pub use plain::PlainKeySource;
pub use universal_signer::UniversalSigner;

#[async_trait::async_trait]
pub trait KeySource: Send + Sync {
    /// Resolves the private key held by this source.
    ///
    /// Sources backed by a remote store fetch on every call, nothing is
    /// cached between calls.
    async fn private_key(&self) -> Result<KeyMaterial, KeySourceError>;
}

#[async_trait::async_trait]
impl<T> KeySource for Box<T>
where
    T: KeySource + ?Sized,
{
    async fn private_key(&self) -> Result<KeyMaterial, KeySourceError> {
        (**self).private_key().await
    }
}

#[async_trait::async_trait]
impl<T> KeySource for std::sync::Arc<T>
where
    T: KeySource + ?Sized,
{
    async fn private_key(&self) -> Result<KeyMaterial, KeySourceError> {
        (**self).private_key().await
    }
}
