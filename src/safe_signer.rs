use std::sync::Arc;

use ethers::core::k256::ecdsa::SigningKey;
use ethers::core::types::transaction::eip2718::TypedTransaction;
use ethers::core::types::transaction::eip712::Eip712;
use ethers::core::types::{Address, Signature as EthSig};
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, Middleware, Provider};
use ethers::signers::{Signer, Wallet};
use tracing::instrument;

use crate::aws::{kms_client, AwsSigner};
use crate::config::{
    AwsClientConfig, GcpClientConfig, SafeSignerConfig, SignerConfig,
    VaultConfig,
};
use crate::gcp::GcpSigner;
use crate::keys::universal_signer::UniversalError;
use crate::keys::{
    AwsSecretsManagerKeySource, EnvKeySource, HashicorpVaultKeySource,
    KeyMaterial, KeySource, LoginParams, PlainKeySource, SecretParams,
    SecretRequest, UniversalSigner,
};

pub type HttpProvider = Provider<Http>;

pub type SafeSignerMiddleware =
    SignerMiddleware<Arc<HttpProvider>, UniversalSigner>;

/// Chain id given to KMS signers until one is configured or taken from the
/// provider
pub const DEFAULT_CHAIN_ID: u64 = 1;

/// Anything [`SafeSigner::from_source`] can turn into a signer
pub enum SignerSource {
    /// Private key that still has to be resolved
    Key(Box<dyn KeySource>),
    /// Signer that is ready to use
    Signer(SafeSigner),
}

impl From<Box<dyn KeySource>> for SignerSource {
    fn from(source: Box<dyn KeySource>) -> Self {
        Self::Key(source)
    }
}

impl From<PlainKeySource> for SignerSource {
    fn from(source: PlainKeySource) -> Self {
        Self::Key(Box::new(source))
    }
}

impl From<EnvKeySource> for SignerSource {
    fn from(source: EnvKeySource) -> Self {
        Self::Key(Box::new(source))
    }
}

impl From<AwsSecretsManagerKeySource> for SignerSource {
    fn from(source: AwsSecretsManagerKeySource) -> Self {
        Self::Key(Box::new(source))
    }
}

impl From<HashicorpVaultKeySource> for SignerSource {
    fn from(source: HashicorpVaultKeySource) -> Self {
        Self::Key(Box::new(source))
    }
}

impl From<SafeSigner> for SignerSource {
    fn from(signer: SafeSigner) -> Self {
        Self::Signer(signer)
    }
}

impl From<UniversalSigner> for SignerSource {
    fn from(signer: UniversalSigner) -> Self {
        Self::Signer(SafeSigner::new(signer))
    }
}

impl From<AwsSigner> for SignerSource {
    fn from(signer: AwsSigner) -> Self {
        Self::from(UniversalSigner::Aws(signer))
    }
}

impl From<GcpSigner> for SignerSource {
    fn from(signer: GcpSigner) -> Self {
        Self::from(UniversalSigner::Gcp(signer))
    }
}

impl From<Wallet<SigningKey>> for SignerSource {
    fn from(signer: Wallet<SigningKey>) -> Self {
        Self::from(UniversalSigner::Local(signer))
    }
}

/// A signer, optionally bound to a JSON-RPC provider.
///
/// All the `from_*` constructors go through [`SafeSigner::from_source`]:
/// key sources are resolved into a local wallet, ready signers (KMS) are
/// used as they are.
///
/// Binding a provider does no I/O. The chain id is only taken from the
/// provider when [`SafeSigner::middleware`] is built, and only if none was
/// set with `with_chain_id`.
#[derive(Debug, Clone)]
pub struct SafeSigner {
    signer: UniversalSigner,
    provider: Option<Arc<HttpProvider>>,
    chain_id: Option<u64>,
}

impl SafeSigner {
    pub fn new(signer: UniversalSigner) -> Self {
        Self {
            signer,
            provider: None,
            chain_id: None,
        }
    }

    #[instrument(skip_all, fields(bound = provider.is_some()))]
    pub async fn from_source(
        source: impl Into<SignerSource>,
        provider: Option<Arc<HttpProvider>>,
    ) -> eyre::Result<Self> {
        match source.into() {
            SignerSource::Signer(signer) => {
                tracing::debug!(address = ?signer.address(), "Using ready-made signer");

                Ok(match provider {
                    Some(provider) => signer.connect(provider),
                    None => signer,
                })
            }
            SignerSource::Key(source) => {
                let private_key = source.private_key().await?;
                let wallet = private_key.into_wallet()?;

                tracing::debug!(address = ?wallet.address(), "Resolved local signer");

                Ok(Self {
                    signer: UniversalSigner::Local(wallet),
                    provider,
                    chain_id: None,
                })
            }
        }
    }

    pub async fn from_private_key(
        private_key: impl Into<KeyMaterial>,
        provider: Option<Arc<HttpProvider>>,
    ) -> eyre::Result<Self> {
        let source = PlainKeySource::new(private_key);

        Self::from_source(source, provider).await
    }

    pub async fn from_env(
        name: &str,
        provider: Option<Arc<HttpProvider>>,
    ) -> eyre::Result<Self> {
        let source = EnvKeySource::new(name)?;

        Self::from_source(source, provider).await
    }

    pub async fn from_aws_secrets_manager(
        request: SecretRequest,
        config: Option<&AwsClientConfig>,
        provider: Option<Arc<HttpProvider>>,
    ) -> eyre::Result<Self> {
        let source = AwsSecretsManagerKeySource::new(request, config).await;

        Self::from_source(source, provider).await
    }

    /// Signs with a key that never leaves AWS KMS
    pub async fn from_aws_kms(
        key_id: &str,
        config: Option<&AwsClientConfig>,
        provider: Option<Arc<HttpProvider>>,
    ) -> eyre::Result<Self> {
        let client = kms_client(config).await;
        let signer = AwsSigner::new(client, key_id, DEFAULT_CHAIN_ID).await?;

        Self::from_source(signer, provider).await
    }

    /// Signs with a key version that never leaves Google Cloud KMS
    pub async fn from_gcp_kms(
        key_name: &str,
        config: Option<&GcpClientConfig>,
        provider: Option<Arc<HttpProvider>>,
    ) -> eyre::Result<Self> {
        let client = crate::gcp::kms_client(config).await?;
        let signer = GcpSigner::new(client, key_name, DEFAULT_CHAIN_ID).await?;

        Self::from_source(signer, provider).await
    }

    pub async fn from_hashicorp_vault(
        config: &VaultConfig,
        login_params: &LoginParams,
        secret_params: SecretParams,
        provider: Option<Arc<HttpProvider>>,
    ) -> eyre::Result<Self> {
        let source =
            HashicorpVaultKeySource::create(config, login_params, secret_params)
                .await?;

        Self::from_source(source, provider).await
    }

    pub async fn from_config(config: &SafeSignerConfig) -> eyre::Result<Self> {
        let provider = match &config.rpc_url {
            Some(url) => Some(Arc::new(HttpProvider::try_from(url.as_str())?)),
            None => None,
        };

        let signer = match &config.signer {
            SignerConfig::Plain(c) => {
                Self::from_private_key(c.private_key.clone(), provider).await?
            }
            SignerConfig::Env(c) => Self::from_env(&c.variable, provider).await?,
            SignerConfig::AwsSecretsManager(c) => {
                Self::from_aws_secrets_manager(
                    c.secret.clone(),
                    c.aws.as_ref(),
                    provider,
                )
                .await?
            }
            SignerConfig::AwsKms(c) => {
                Self::from_aws_kms(&c.key_id, c.aws.as_ref(), provider).await?
            }
            SignerConfig::GcpKms(c) => {
                Self::from_gcp_kms(&c.key_name, c.gcp.as_ref(), provider)
                    .await?
            }
            SignerConfig::HashicorpVault(c) => {
                Self::from_hashicorp_vault(
                    &c.vault,
                    &c.login,
                    c.secret.clone(),
                    provider,
                )
                .await?
            }
        };

        Ok(match config.chain_id {
            Some(chain_id) => signer.with_chain_id(chain_id),
            None => signer,
        })
    }

    /// Returns a copy of this signer bound to `provider`
    pub fn connect(&self, provider: Arc<HttpProvider>) -> Self {
        Self {
            signer: self.signer.clone(),
            provider: Some(provider),
            chain_id: self.chain_id,
        }
    }

    pub fn provider(&self) -> Option<&Arc<HttpProvider>> {
        self.provider.as_ref()
    }

    pub fn signer(&self) -> &UniversalSigner {
        &self.signer
    }

    pub fn into_inner(self) -> UniversalSigner {
        self.signer
    }

    /// Middleware that signs and broadcasts through the bound provider.
    ///
    /// Asks the provider for its chain id unless one was set explicitly.
    pub async fn middleware(&self) -> eyre::Result<SafeSignerMiddleware> {
        let provider = self.provider.clone().ok_or_else(|| {
            eyre::eyre!("Signer is not connected to a provider")
        })?;

        let chain_id = resolve_chain_id(&*provider, self.chain_id).await?;

        tracing::debug!(chain_id, "Binding signer middleware");

        Ok(SignerMiddleware::new(
            provider,
            self.signer.clone().with_chain_id(chain_id),
        ))
    }
}

async fn resolve_chain_id<M>(
    provider: &M,
    configured: Option<u64>,
) -> eyre::Result<u64>
where
    M: Middleware,
    M::Error: 'static,
{
    if let Some(chain_id) = configured {
        return Ok(chain_id);
    }

    Ok(provider.get_chainid().await?.as_u64())
}

#[async_trait::async_trait]
impl Signer for SafeSigner {
    type Error = UniversalError;

    async fn sign_message<S: Send + Sync + AsRef<[u8]>>(
        &self,
        message: S,
    ) -> Result<EthSig, Self::Error> {
        self.signer.sign_message(message).await
    }

    async fn sign_transaction(
        &self,
        tx: &TypedTransaction,
    ) -> Result<EthSig, Self::Error> {
        self.signer.sign_transaction(tx).await
    }

    async fn sign_typed_data<T: Eip712 + Send + Sync>(
        &self,
        payload: &T,
    ) -> Result<EthSig, Self::Error> {
        self.signer.sign_typed_data(payload).await
    }

    fn address(&self) -> Address {
        self.signer.address()
    }

    fn chain_id(&self) -> u64 {
        self.signer.chain_id()
    }

    fn with_chain_id<T: Into<u64>>(self, chain_id: T) -> Self {
        let chain_id = chain_id.into();

        Self {
            signer: self.signer.with_chain_id(chain_id),
            provider: self.provider,
            chain_id: Some(chain_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use ethers::core::types::U256;

    use super::*;
    use crate::keys::KeySourceError;

    const PRIVATE_KEY: &str =
        "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn provider() -> eyre::Result<Arc<HttpProvider>> {
        Ok(Arc::new(HttpProvider::try_from("http://127.0.0.1:8545")?))
    }

    #[tokio::test]
    async fn ready_signer_without_provider_is_passed_through(
    ) -> eyre::Result<()> {
        let signer = SafeSigner::from_private_key(PRIVATE_KEY, None)
            .await?
            .with_chain_id(31337u64);

        let passed = SafeSigner::from_source(signer.clone(), None).await?;

        assert_eq!(passed.address(), signer.address());
        assert_eq!(passed.chain_id(), 31337);
        assert!(passed.provider().is_none());

        Ok(())
    }

    #[tokio::test]
    async fn binding_a_provider_leaves_original_untouched() -> eyre::Result<()>
    {
        let signer = SafeSigner::from_private_key(PRIVATE_KEY, None)
            .await?
            .with_chain_id(31337u64);
        let provider = provider()?;

        let bound =
            SafeSigner::from_source(signer.clone(), Some(provider.clone()))
                .await?;

        assert!(signer.provider().is_none());
        assert!(signer.middleware().await.is_err());
        assert!(Arc::ptr_eq(bound.provider().unwrap(), &provider));
        assert_eq!(bound.address(), signer.address());

        // An explicit chain id means no RPC call is needed
        let middleware = bound.middleware().await?;
        assert_eq!(middleware.address(), signer.address());
        assert_eq!(middleware.signer().chain_id(), 31337);
        assert!(Arc::ptr_eq(middleware.inner(), &provider));

        Ok(())
    }

    #[tokio::test]
    async fn chain_id_comes_from_provider_when_unset() -> eyre::Result<()> {
        let (provider, mock) = Provider::mocked();
        mock.push(U256::from(31337u64))?;

        let chain_id = resolve_chain_id(&provider, None).await?;

        assert_eq!(chain_id, 31337);

        Ok(())
    }

    #[tokio::test]
    async fn configured_chain_id_wins_over_provider() -> eyre::Result<()> {
        // No responses queued: any RPC call would fail
        let (provider, _mock) = Provider::mocked();

        let chain_id = resolve_chain_id(&provider, Some(10)).await?;

        assert_eq!(chain_id, 10);

        Ok(())
    }

    #[tokio::test]
    async fn key_source_errors_propagate() {
        std::env::remove_var("SAFE_SIGNER_TEST_FACTORY_MISSING");

        let err = SafeSigner::from_env("SAFE_SIGNER_TEST_FACTORY_MISSING", None)
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<KeySourceError>(),
            Some(KeySourceError::MissingEnv(_))
        ));
    }

    #[tokio::test]
    async fn plain_config_builds_bound_signer() -> eyre::Result<()> {
        let config = SafeSignerConfig {
            signer: SignerConfig::Plain(crate::config::PlainSignerConfig {
                private_key: PRIVATE_KEY.into(),
            }),
            rpc_url: Some("http://127.0.0.1:8545".parse()?),
            chain_id: Some(31337),
        };

        let signer = SafeSigner::from_config(&config).await?;

        assert!(signer.provider().is_some());
        assert_eq!(signer.chain_id(), 31337);
        assert!(!signer.signer().is_remote());

        Ok(())
    }
}
