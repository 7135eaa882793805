//! Google Cloud KMS-based Signer

use std::sync::Arc;

use ethers::core::k256::ecdsa::{
    Error as K256Error, Signature as KSig, VerifyingKey,
};
use ethers::core::types::transaction::eip2718::TypedTransaction;
use ethers::core::types::transaction::eip712::Eip712;
use ethers::core::types::{Address, Signature as EthSig, H256};
use ethers::core::utils::hash_message;
use gcloud_sdk::google::cloud::kms::v1::{
    digest, AsymmetricSignRequest, Digest, GetPublicKeyRequest,
};
use gcloud_sdk::tonic::Status;
use spki::der::DecodePem;
use spki::SubjectPublicKeyInfoOwned;
use tracing::{debug, instrument};

use super::KmsClient;
use crate::ecdsa::{
    apply_eip155, sig_from_digest_bytes_trial_recovery, signature_from_der,
    verifying_key_to_address,
};

/// An ethers Signer that uses a key version held in Google Cloud KMS.
///
/// The key must be an `EC_SIGN_SECP256K1_SHA256` key version, named by its
/// full resource name
/// (`projects/*/locations/*/keyRings/*/cryptoKeys/*/cryptoKeyVersions/*`).
/// Like [`crate::aws::AwsSigner`] the public key is fetched on
/// instantiation.
#[derive(Clone)]
pub struct GcpSigner {
    kms: Arc<KmsClient>,
    chain_id: u64,
    key_name: String,
    pubkey: VerifyingKey,
    address: Address,
}

impl std::fmt::Debug for GcpSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GcpSigner")
            .field("key_name", &self.key_name)
            .field("chain_id", &self.chain_id)
            .field("address", &self.address)
            .finish()
    }
}

/// Errors produced by the GcpSigner
#[derive(thiserror::Error, Debug)]
pub enum GcpSignerError {
    #[error("{0}")]
    Grpc(#[from] Status),
    #[error("{0}")]
    K256(#[from] K256Error),
    #[error("{0}")]
    Pem(#[from] spki::der::Error),
    #[error("{0}")]
    Other(String),
    #[error("error encoding eip712 struct: {0:?}")]
    Eip712Error(String),
}

/// Parses the PEM public key returned by `GetPublicKey`
fn decode_pubkey(pem: &str) -> Result<VerifyingKey, GcpSignerError> {
    let spki = SubjectPublicKeyInfoOwned::from_pem(pem)?;

    Ok(VerifyingKey::from_sec1_bytes(
        spki.subject_public_key.raw_bytes(),
    )?)
}

impl GcpSigner {
    #[instrument(err, skip(kms, key_name, chain_id), fields(key_name = %key_name.as_ref()))]
    pub async fn new<T>(
        kms: KmsClient,
        key_name: T,
        chain_id: u64,
    ) -> Result<GcpSigner, GcpSignerError>
    where
        T: AsRef<str>,
    {
        debug!("Dispatching get_public_key");

        let public_key = kms
            .get()
            .get_public_key(GetPublicKeyRequest {
                name: key_name.as_ref().to_owned(),
                ..Default::default()
            })
            .await?
            .into_inner();

        let pubkey = decode_pubkey(&public_key.pem)?;
        let address = verifying_key_to_address(&pubkey);

        debug!(%address, "Instantiated Cloud KMS signer");

        Ok(Self {
            kms: Arc::new(kms),
            chain_id,
            key_name: key_name.as_ref().to_owned(),
            pubkey,
            address,
        })
    }

    pub fn key_name(&self) -> &str {
        &self.key_name
    }

    /// Sign a digest with this signer's key
    #[instrument(err, skip(self, digest), fields(digest = %hex::encode(digest)))]
    pub async fn sign_digest(
        &self,
        digest: [u8; 32],
    ) -> Result<KSig, GcpSignerError> {
        debug!("Dispatching asymmetric_sign");

        // Cloud KMS only checks the digest length, so the keccak hash is
        // passed in the sha256 slot
        let response = self
            .kms
            .get()
            .asymmetric_sign(AsymmetricSignRequest {
                name: self.key_name.clone(),
                digest: Some(Digest {
                    digest: Some(digest::Digest::Sha256(digest.to_vec())),
                }),
                ..Default::default()
            })
            .await?
            .into_inner();

        Ok(signature_from_der(&response.signature)?)
    }

    /// Sign a digest and attach the raw recovery id as `v`
    async fn sign_recoverable(
        &self,
        digest: [u8; 32],
    ) -> Result<EthSig, GcpSignerError> {
        let sig = self.sign_digest(digest).await?;

        sig_from_digest_bytes_trial_recovery(&sig, digest, &self.pubkey)
            .ok_or_else(|| {
                GcpSignerError::Other(
                    "Signature does not recover to the Cloud KMS public key"
                        .to_owned(),
                )
            })
    }

    async fn sign_digest_with_eip155(
        &self,
        digest: H256,
        chain_id: u64,
    ) -> Result<EthSig, GcpSignerError> {
        let mut sig = self.sign_recoverable(digest.into()).await?;
        apply_eip155(&mut sig, chain_id);
        Ok(sig)
    }
}

#[async_trait::async_trait]
impl ethers::signers::Signer for GcpSigner {
    type Error = GcpSignerError;

    async fn sign_message<S: Send + Sync + AsRef<[u8]>>(
        &self,
        message: S,
    ) -> Result<EthSig, Self::Error> {
        let message_hash = hash_message(message.as_ref());

        let mut sig = self.sign_recoverable(message_hash.into()).await?;
        sig.v += 27;

        Ok(sig)
    }

    async fn sign_transaction(
        &self,
        tx: &TypedTransaction,
    ) -> Result<EthSig, Self::Error> {
        let mut tx_with_chain = tx.clone();
        let chain_id = tx_with_chain
            .chain_id()
            .map(|id| id.as_u64())
            .unwrap_or(self.chain_id);
        tx_with_chain.set_chain_id(chain_id);

        let sighash = tx_with_chain.sighash();
        self.sign_digest_with_eip155(sighash, chain_id).await
    }

    async fn sign_typed_data<T: Eip712 + Send + Sync>(
        &self,
        payload: &T,
    ) -> Result<EthSig, Self::Error> {
        let digest = payload
            .encode_eip712()
            .map_err(|e| Self::Error::Eip712Error(e.to_string()))?;

        let mut sig = self.sign_recoverable(digest).await?;
        sig.v += 27;

        Ok(sig)
    }

    fn address(&self) -> Address {
        self.address
    }

    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    fn with_chain_id<T: Into<u64>>(mut self, chain_id: T) -> Self {
        self.chain_id = chain_id.into();
        self
    }
}
