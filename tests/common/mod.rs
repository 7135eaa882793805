#![allow(dead_code)] // Needed because this module is imported as module by many test crates

use std::net::SocketAddr;
use std::sync::Arc;

use ethers::signers::LocalWallet;
use ethers::types::{Address, H160};
use fake_vault::FakeVault;
use safe_signer::config::{AwsClientConfig, AwsCredentialsConfig, VaultConfig};
use tokio::task::JoinHandle;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

pub mod prelude {
    pub use std::sync::Arc;

    pub use ethers::signers::Signer;
    pub use ethers::types::Address;
    pub use safe_signer::config::VaultConfig;
    pub use safe_signer::keys::{KeySourceError, LoginParams, SecretParams};
    pub use safe_signer::SafeSigner;

    pub use super::*;
}

pub const DEFAULT_ANVIL_ACCOUNT: Address = H160(hex_literal::hex!(
    "f39Fd6e51aad88F6F4ce6aB8827279cffFb92266"
));

pub const DEFAULT_ANVIL_PRIVATE_KEY: &[u8] = &hex_literal::hex!(
    "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80"
);

pub const VAULT_ROOT_TOKEN: &str = "vault-plaintext-root-token";

pub const MESSAGE: &str = "hello";

pub fn setup_tracing() {
    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().pretty().compact())
        .with(EnvFilter::from_default_env())
        .try_init();
}

pub fn random_wallet() -> LocalWallet {
    LocalWallet::new(&mut rand::thread_rng())
}

pub fn private_key_hex(wallet: &LocalWallet) -> String {
    format!("0x{}", hex::encode(wallet.signer().to_bytes()))
}

pub struct FakeVaultHandle {
    pub vault: Arc<FakeVault>,
    local_addr: SocketAddr,
    server_handle: JoinHandle<eyre::Result<()>>,
}

impl FakeVaultHandle {
    pub fn config(&self) -> eyre::Result<VaultConfig> {
        let base_url = format!("http://{}/v1", self.local_addr).parse()?;

        Ok(VaultConfig::new(base_url))
    }
}

impl Drop for FakeVaultHandle {
    fn drop(&mut self) {
        self.server_handle.abort();
    }
}

pub async fn setup_fake_vault() -> eyre::Result<FakeVaultHandle> {
    let (vault, server) = fake_vault::serve(0, VAULT_ROOT_TOKEN).await;

    let local_addr = server.local_addr();

    let server_handle = tokio::spawn(async move {
        server.await?;
        Ok(())
    });

    Ok(FakeVaultHandle {
        vault,
        local_addr,
        server_handle,
    })
}

/// Client config for a LocalStack instance at `AWS_ENDPOINT_URL`, if set
pub fn localstack_config() -> Option<AwsClientConfig> {
    let endpoint = std::env::var("AWS_ENDPOINT_URL").ok()?;

    Some(AwsClientConfig {
        region: Some("us-east-1".to_string()),
        endpoint: Some(endpoint),
        credentials: Some(AwsCredentialsConfig {
            access_key_id: "test".to_string(),
            secret_access_key: "test".into(),
            session_token: None,
        }),
    })
}
