//! Helpers for converting KMS responses into ethers types

use aws_sdk_kms::operation::get_public_key::GetPublicKeyOutput;
use aws_sdk_kms::operation::sign::SignOutput;
use ethers::core::k256::ecdsa::{Signature as KSig, VerifyingKey};

use super::AwsSignerError;
use crate::ecdsa::signature_from_der;

/// Decode an AWS KMS Pubkey response
pub(super) fn decode_pubkey(
    resp: GetPublicKeyOutput,
) -> Result<VerifyingKey, AwsSignerError> {
    let raw = resp.public_key.ok_or_else(|| {
        AwsSignerError::from("Pubkey not found in response".to_owned())
    })?;

    let spki = spki::SubjectPublicKeyInfoRef::try_from(raw.as_ref())?;
    let key =
        VerifyingKey::from_sec1_bytes(spki.subject_public_key.raw_bytes())?;

    Ok(key)
}

/// Decode an AWS KMS Signature response
pub(super) fn decode_signature(
    resp: SignOutput,
) -> Result<KSig, AwsSignerError> {
    let raw = resp.signature.ok_or_else(|| {
        AwsSignerError::from("Signature not found in response".to_owned())
    })?;

    Ok(signature_from_der(raw.as_ref())?)
}
