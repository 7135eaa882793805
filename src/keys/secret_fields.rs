use serde_json::{Map, Value};

use super::KeySourceError;
use crate::types::SecretString;

/// Decoded JSON payload of a remote secret
#[derive(Clone)]
pub(crate) struct SecretFields<'a> {
    secret_id: &'a str,
    fields: Map<String, Value>,
}

impl<'a> SecretFields<'a> {
    pub fn parse(
        secret_id: &'a str,
        payload: &str,
    ) -> Result<Self, KeySourceError> {
        let fields = serde_json::from_str(payload).map_err(|source| {
            KeySourceError::MalformedSecret {
                secret_id: secret_id.to_owned(),
                source,
            }
        })?;

        Ok(Self { secret_id, fields })
    }

    pub fn new(secret_id: &'a str, fields: Map<String, Value>) -> Self {
        Self { secret_id, fields }
    }

    /// Looks up a string field. Absent and falsy values count as missing.
    pub fn field(&self, key: &str) -> Result<SecretString, KeySourceError> {
        match self.fields.get(key) {
            Some(Value::String(s)) if !s.is_empty() => {
                Ok(SecretString::new(s.clone()))
            }
            None | Some(Value::Null) | Some(Value::Bool(false)) => {
                Err(self.missing(key))
            }
            Some(Value::String(_)) => Err(self.missing(key)),
            Some(Value::Number(n)) if n.as_f64() == Some(0.0) => {
                Err(self.missing(key))
            }
            Some(_) => Err(KeySourceError::NonStringSecretKey {
                secret_id: self.secret_id.to_owned(),
                key: key.to_owned(),
            }),
        }
    }

    fn missing(&self, key: &str) -> KeySourceError {
        KeySourceError::MissingSecretKey {
            secret_id: self.secret_id.to_owned(),
            key: key.to_owned(),
        }
    }
}
