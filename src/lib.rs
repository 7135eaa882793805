#![recursion_limit = "256"]

pub mod aws;
pub mod config;
mod ecdsa;
pub mod gcp;
pub mod keys;
pub mod safe_signer;
pub mod types;
pub mod vault;

pub use keys::{KeyMaterial, KeySource, KeySourceError, UniversalSigner};
pub use safe_signer::{SafeSigner, SignerSource};
