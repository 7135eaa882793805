use std::fmt;

use ethers::core::k256::ecdsa::SigningKey;
use ethers::core::types::Address;
use ethers::signers::{LocalWallet, Signer};

use super::KeySourceError;
use crate::types::SecretString;

/// Private key in one of the encodings a wallet can be built from
#[derive(Clone)]
pub enum KeyMaterial {
    Raw(RawKey),
    Account(ExternallyOwnedAccount),
    SigningKey(SigningKey),
}

/// Raw private key bytes, either hex encoded or as is
#[derive(Clone, PartialEq, Eq)]
pub enum RawKey {
    /// Hex string, with or without a `0x` prefix
    Hex(SecretString),
    Bytes(Vec<u8>),
}

/// An address together with the private key that controls it
#[derive(Clone, PartialEq, Eq)]
pub struct ExternallyOwnedAccount {
    pub address: Address,
    pub private_key: RawKey,
}

impl RawKey {
    pub fn to_signing_key(&self) -> Result<SigningKey, KeySourceError> {
        let bytes = match self {
            Self::Hex(s) => {
                let s = s.expose().trim();
                let s = s.strip_prefix("0x").unwrap_or(s);

                hex::decode(s)
                    .map_err(|e| KeySourceError::InvalidKey(e.to_string()))?
            }
            Self::Bytes(bytes) => bytes.clone(),
        };

        SigningKey::from_slice(&bytes)
            .map_err(|e| KeySourceError::InvalidKey(e.to_string()))
    }
}

impl KeyMaterial {
    /// Builds a local wallet from the key.
    ///
    /// For [`KeyMaterial::Account`] the address derived from the private key
    /// must match the declared address.
    pub fn into_wallet(self) -> Result<LocalWallet, KeySourceError> {
        match self {
            Self::Raw(raw) => Ok(LocalWallet::from(raw.to_signing_key()?)),
            Self::Account(account) => {
                let wallet =
                    LocalWallet::from(account.private_key.to_signing_key()?);

                if wallet.address() != account.address {
                    return Err(KeySourceError::AddressMismatch {
                        expected: account.address,
                        derived: wallet.address(),
                    });
                }

                Ok(wallet)
            }
            Self::SigningKey(signing_key) => Ok(LocalWallet::from(signing_key)),
        }
    }
}

impl PartialEq for KeyMaterial {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Raw(a), Self::Raw(b)) => a == b,
            (Self::Account(a), Self::Account(b)) => a == b,
            (Self::SigningKey(a), Self::SigningKey(b)) => {
                a.to_bytes() == b.to_bytes()
            }
            _ => false,
        }
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Raw(raw) => f.debug_tuple("Raw").field(raw).finish(),
            Self::Account(account) => {
                f.debug_tuple("Account").field(account).finish()
            }
            Self::SigningKey(_) => f.write_str("SigningKey(********)"),
        }
    }
}

impl fmt::Debug for RawKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hex(_) => f.write_str("Hex(********)"),
            Self::Bytes(_) => f.write_str("Bytes(********)"),
        }
    }
}

impl fmt::Debug for ExternallyOwnedAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExternallyOwnedAccount")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

impl From<SecretString> for KeyMaterial {
    fn from(s: SecretString) -> Self {
        Self::Raw(RawKey::Hex(s))
    }
}

impl From<String> for KeyMaterial {
    fn from(s: String) -> Self {
        Self::Raw(RawKey::Hex(SecretString::new(s)))
    }
}

impl From<&str> for KeyMaterial {
    fn from(s: &str) -> Self {
        Self::Raw(RawKey::Hex(SecretString::from(s)))
    }
}

impl From<Vec<u8>> for KeyMaterial {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Raw(RawKey::Bytes(bytes))
    }
}

impl From<&[u8]> for KeyMaterial {
    fn from(bytes: &[u8]) -> Self {
        Self::Raw(RawKey::Bytes(bytes.to_vec()))
    }
}

impl From<ExternallyOwnedAccount> for KeyMaterial {
    fn from(account: ExternallyOwnedAccount) -> Self {
        Self::Account(account)
    }
}

impl From<SigningKey> for KeyMaterial {
    fn from(signing_key: SigningKey) -> Self {
        Self::SigningKey(signing_key)
    }
}

#[cfg(test)]
mod tests {
    use ethers::core::types::H160;
    use test_case::test_case;

    use super::*;

    const PRIVATE_KEY: &str =
        "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    const ADDRESS: Address = H160(hex_literal::hex!(
        "f39Fd6e51aad88F6F4ce6aB8827279cffFb92266"
    ));

    #[test_case(KeyMaterial::from(PRIVATE_KEY) ; "hex without prefix")]
    #[test_case(KeyMaterial::from(format!("0x{PRIVATE_KEY}")) ; "hex with prefix")]
    #[test_case(KeyMaterial::from(hex::decode(PRIVATE_KEY).unwrap()) ; "bytes")]
    #[test_case(
        KeyMaterial::from(SigningKey::from_slice(&hex::decode(PRIVATE_KEY).unwrap()).unwrap())
        ; "signing key"
    )]
    #[test_case(
        KeyMaterial::from(ExternallyOwnedAccount {
            address: ADDRESS,
            private_key: RawKey::Hex(PRIVATE_KEY.into()),
        })
        ; "account"
    )]
    fn builds_wallet(key: KeyMaterial) {
        let wallet = key.into_wallet().unwrap();

        assert_eq!(wallet.address(), ADDRESS);
    }

    #[test]
    fn account_with_wrong_address_is_rejected() {
        let key = KeyMaterial::from(ExternallyOwnedAccount {
            address: Address::zero(),
            private_key: RawKey::Hex(PRIVATE_KEY.into()),
        });

        let err = key.into_wallet().unwrap_err();

        assert!(matches!(
            err,
            KeySourceError::AddressMismatch { derived, .. } if derived == ADDRESS
        ));
    }

    #[test_case("0xnothex" ; "not hex")]
    #[test_case("0x1234" ; "too short")]
    #[test_case("" ; "empty")]
    fn invalid_keys_are_rejected(key: &str) {
        let err = KeyMaterial::from(key).into_wallet().unwrap_err();

        assert!(matches!(err, KeySourceError::InvalidKey(_)));
    }

    #[test]
    fn debug_output_hides_key() {
        let key = KeyMaterial::from(PRIVATE_KEY);

        assert!(!format!("{key:?}").contains(PRIVATE_KEY));
    }
}
