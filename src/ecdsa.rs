//! secp256k1 helpers shared by the KMS-backed signers

use ethers::core::k256::ecdsa::{
    Error as K256Error, RecoveryId, Signature as KSig, VerifyingKey,
};
use ethers::core::k256::elliptic_curve::sec1::ToEncodedPoint;
use ethers::core::types::{Address, Signature as EthSig, U256};
use ethers::core::utils::keccak256;

/// Makes a trial recovery to find the recovery id matching `vk`.
///
/// The returned signature has `v` set to the raw recovery id (0 or 1).
pub(crate) fn sig_from_digest_bytes_trial_recovery(
    sig: &KSig,
    digest: [u8; 32],
    vk: &VerifyingKey,
) -> Option<EthSig> {
    let bytes = sig.to_bytes();
    let r = U256::from_big_endian(&bytes[..32]);
    let s = U256::from_big_endian(&bytes[32..]);

    for v in 0..=1u8 {
        let Some(recovery_id) = RecoveryId::from_byte(v) else {
            continue;
        };

        let recovered =
            VerifyingKey::recover_from_prehash(&digest, sig, recovery_id);

        if matches!(recovered, Ok(key) if key == *vk) {
            return Some(EthSig { r, s, v: v as u64 });
        }
    }

    None
}

/// Modify the v value of a signature to conform to eip155
pub(crate) fn apply_eip155(sig: &mut EthSig, chain_id: u64) {
    let v = (chain_id * 2 + 35) + sig.v;
    sig.v = v;
}

/// Convert a verifying key to an ethereum address
pub(crate) fn verifying_key_to_address(key: &VerifyingKey) -> Address {
    // false for uncompressed
    let uncompressed_pub_key = key.to_encoded_point(false);
    let public_key = uncompressed_pub_key.to_bytes();
    debug_assert_eq!(public_key[0], 0x04);
    let hash = keccak256(&public_key[1..]);
    Address::from_slice(&hash[12..])
}

/// Parses a DER signature, normalized to low-s as Ethereum requires
pub(crate) fn signature_from_der(der: &[u8]) -> Result<KSig, K256Error> {
    let sig = KSig::from_der(der)?;
    Ok(sig.normalize_s().unwrap_or(sig))
}
