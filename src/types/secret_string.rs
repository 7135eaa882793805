use std::fmt;
use std::ops::Deref;

use serde::{Deserialize, Serialize};

/// A string holding secret material (private keys, passwords, vault tokens).
///
/// Never printed by `Debug` or `Display`, so it is safe to log structs that
/// contain it.
#[derive(Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecretString(String);

impl SecretString {
    #[must_use]
    pub fn new(str: String) -> Self {
        Self(str)
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.as_str()
    }

    fn format(&self) -> String {
        "********".to_owned()
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.format().fmt(f)
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.format().fmt(f)
    }
}

impl From<String> for SecretString {
    fn from(str: String) -> Self {
        Self::new(str)
    }
}

impl From<&str> for SecretString {
    fn from(str: &str) -> Self {
        Self::new(str.to_owned())
    }
}

impl From<SecretString> for String {
    fn from(secret_string: SecretString) -> Self {
        secret_string.0
    }
}

impl Deref for SecretString {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        self.0.deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str =
        "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn exposes_inner_value() {
        let secret = SecretString::from(KEY);

        assert_eq!(secret.expose(), KEY);
        assert_eq!(String::from(secret), KEY);
    }

    #[test]
    fn redacts_when_formatted() {
        let secret = SecretString::from(KEY);

        assert!(!format!("{secret}").contains("ac0974"));
        assert!(!format!("{secret:?}").contains("ac0974"));
    }
}
