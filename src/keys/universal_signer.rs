use ethers::core::k256::ecdsa::SigningKey;
use ethers::core::types::transaction::eip2718::TypedTransaction;
use ethers::core::types::transaction::eip712::Eip712;
use ethers::core::types::{Address, Signature as EthSig};
use ethers::signers::{Signer, Wallet, WalletError};
use thiserror::Error;

use crate::aws::AwsSigner;
use crate::gcp::GcpSigner;

/// Common signer type for keys held locally and keys held in KMS
#[derive(Debug, Clone)]
pub enum UniversalSigner {
    Aws(AwsSigner),
    Gcp(GcpSigner),
    Local(Wallet<SigningKey>),
}

impl UniversalSigner {
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Aws(_) | Self::Gcp(_))
    }
}

impl From<AwsSigner> for UniversalSigner {
    fn from(signer: AwsSigner) -> Self {
        Self::Aws(signer)
    }
}

impl From<GcpSigner> for UniversalSigner {
    fn from(signer: GcpSigner) -> Self {
        Self::Gcp(signer)
    }
}

impl From<Wallet<SigningKey>> for UniversalSigner {
    fn from(signer: Wallet<SigningKey>) -> Self {
        Self::Local(signer)
    }
}

#[derive(Debug, Error)]
pub enum UniversalError {
    #[error("AWS Signer Error: {0}")]
    Aws(<AwsSigner as Signer>::Error),
    #[error("GCP Signer Error: {0}")]
    Gcp(<GcpSigner as Signer>::Error),
    #[error("Local Signer Error: {0}")]
    Local(#[from] WalletError),
}

impl From<<AwsSigner as Signer>::Error> for UniversalError {
    fn from(e: <AwsSigner as Signer>::Error) -> Self {
        Self::Aws(e)
    }
}

impl From<<GcpSigner as Signer>::Error> for UniversalError {
    fn from(e: <GcpSigner as Signer>::Error) -> Self {
        Self::Gcp(e)
    }
}

#[async_trait::async_trait]
impl Signer for UniversalSigner {
    type Error = UniversalError;

    async fn sign_message<S: Send + Sync + AsRef<[u8]>>(
        &self,
        message: S,
    ) -> Result<EthSig, Self::Error> {
        Ok(match self {
            Self::Aws(signer) => signer.sign_message(message).await?,
            Self::Gcp(signer) => signer.sign_message(message).await?,
            Self::Local(signer) => signer.sign_message(message).await?,
        })
    }

    async fn sign_transaction(
        &self,
        tx: &TypedTransaction,
    ) -> Result<EthSig, Self::Error> {
        Ok(match self {
            Self::Aws(signer) => signer.sign_transaction(tx).await?,
            Self::Gcp(signer) => signer.sign_transaction(tx).await?,
            Self::Local(signer) => signer.sign_transaction(tx).await?,
        })
    }

    async fn sign_typed_data<T: Eip712 + Send + Sync>(
        &self,
        payload: &T,
    ) -> Result<EthSig, Self::Error> {
        Ok(match self {
            Self::Aws(signer) => signer.sign_typed_data(payload).await?,
            Self::Gcp(signer) => signer.sign_typed_data(payload).await?,
            Self::Local(signer) => signer.sign_typed_data(payload).await?,
        })
    }

    fn address(&self) -> Address {
        match self {
            Self::Aws(signer) => signer.address(),
            Self::Gcp(signer) => signer.address(),
            Self::Local(signer) => signer.address(),
        }
    }

    /// Returns the signer's chain id
    fn chain_id(&self) -> u64 {
        match self {
            Self::Aws(signer) => signer.chain_id(),
            Self::Gcp(signer) => signer.chain_id(),
            Self::Local(signer) => signer.chain_id(),
        }
    }

    /// Sets the signer's chain id
    fn with_chain_id<T: Into<u64>>(self, chain_id: T) -> Self {
        match self {
            Self::Aws(signer) => Self::Aws(signer.with_chain_id(chain_id)),
            Self::Gcp(signer) => Self::Gcp(signer.with_chain_id(chain_id)),
            Self::Local(signer) => Self::Local(signer.with_chain_id(chain_id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use ethers::signers::LocalWallet;

    use super::*;

    const PRIVATE_KEY: [u8; 32] = hex_literal::hex!(
        "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80"
    );

    fn local_signer() -> eyre::Result<UniversalSigner> {
        let wallet = LocalWallet::from(SigningKey::from_slice(&PRIVATE_KEY)?);

        Ok(UniversalSigner::from(wallet))
    }

    #[tokio::test]
    async fn signs_messages() -> eyre::Result<()> {
        let signer = local_signer()?;

        let sig = signer.sign_message("hello").await?;

        assert_eq!(sig.recover("hello")?, signer.address());
        assert!(!signer.is_remote());

        Ok(())
    }
}
