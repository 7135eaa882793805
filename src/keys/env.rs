use std::env::VarError;

use super::{KeyMaterial, KeySource, KeySourceError};
use crate::types::SecretString;

/// Key read from a process environment variable.
///
/// The variable is read once, when the source is created. An unset or empty
/// variable is reported as missing, a value that is not valid unicode gets
/// its own error.
#[derive(Debug, Clone)]
pub struct EnvKeySource {
    name: String,
    private_key: SecretString,
}

impl EnvKeySource {
    pub fn new(name: impl Into<String>) -> Result<Self, KeySourceError> {
        let name = name.into();

        let private_key = match std::env::var(&name) {
            Ok(value) if !value.is_empty() => SecretString::new(value),
            Err(VarError::NotUnicode(_)) => {
                return Err(KeySourceError::NonUnicodeEnv(name))
            }
            _ => return Err(KeySourceError::MissingEnv(name)),
        };

        tracing::debug!(env = %name, "Loaded private key from environment");

        Ok(Self { name, private_key })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait::async_trait]
impl KeySource for EnvKeySource {
    async fn private_key(&self) -> Result<KeyMaterial, KeySourceError> {
        Ok(self.private_key.clone().into())
    }
}
