use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::instrument;

use super::secret_fields::SecretFields;
use super::{KeyMaterial, KeySource, KeySourceError};
use crate::config::VaultConfig;
use crate::types::SecretString;
use crate::vault::{HttpVaultClient, VaultClient};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoginWithAppRole {
    pub role_id: String,
    pub secret_id: SecretString,
    #[serde(default)]
    pub mount: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoginWithCert {
    pub cert_name: String,
    #[serde(default)]
    pub mount: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoginWithK8s {
    pub role: String,
    pub jwt: SecretString,
    #[serde(default)]
    pub mount: Option<String>,
}

/// Credentials for the `ldap` and `userpass` methods
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoginWithPassword {
    pub username: String,
    pub password: SecretString,
    #[serde(default)]
    pub mount: Option<String>,
}

/// Authentication for Vault. When several methods are set the first one
/// in field order wins, and a `token` skips login altogether.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoginParams {
    #[serde(default)]
    pub token: Option<SecretString>,
    #[serde(default)]
    pub app_role: Option<LoginWithAppRole>,
    #[serde(default)]
    pub cert: Option<LoginWithCert>,
    #[serde(default)]
    pub k8s: Option<LoginWithK8s>,
    #[serde(default)]
    pub ldap: Option<LoginWithPassword>,
    #[serde(default)]
    pub userpass: Option<LoginWithPassword>,
}

impl LoginParams {
    pub fn token(token: impl Into<SecretString>) -> Self {
        Self {
            token: Some(token.into()),
            ..Default::default()
        }
    }

    /// Picks the authentication method to use
    pub fn method(&self) -> Result<LoginMethod<'_>, KeySourceError> {
        if let Some(token) = &self.token {
            Ok(LoginMethod::Token(token))
        } else if let Some(app_role) = &self.app_role {
            Ok(LoginMethod::AppRole(app_role))
        } else if let Some(cert) = &self.cert {
            Ok(LoginMethod::Cert(cert))
        } else if let Some(k8s) = &self.k8s {
            Ok(LoginMethod::K8s(k8s))
        } else if let Some(ldap) = &self.ldap {
            Ok(LoginMethod::Ldap(ldap))
        } else if let Some(userpass) = &self.userpass {
            Ok(LoginMethod::Userpass(userpass))
        } else {
            Err(KeySourceError::NoLoginMethod)
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum LoginMethod<'a> {
    Token(&'a SecretString),
    AppRole(&'a LoginWithAppRole),
    Cert(&'a LoginWithCert),
    K8s(&'a LoginWithK8s),
    Ldap(&'a LoginWithPassword),
    Userpass(&'a LoginWithPassword),
}

impl LoginMethod<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Token(_) => "token",
            Self::AppRole(_) => "appRole",
            Self::Cert(_) => "cert",
            Self::K8s(_) => "k8s",
            Self::Ldap(_) => "ldap",
            Self::Userpass(_) => "userpass",
        }
    }

    async fn login(
        self,
        vault: &dyn VaultClient,
    ) -> Result<SecretString, KeySourceError> {
        let response = match self {
            Self::Token(token) => return Ok(token.clone()),
            Self::AppRole(p) => {
                vault
                    .login_with_app_role(
                        &p.role_id,
                        &p.secret_id,
                        p.mount.as_deref(),
                    )
                    .await?
            }
            Self::Cert(p) => {
                vault
                    .login_with_cert(&p.cert_name, p.mount.as_deref())
                    .await?
            }
            Self::K8s(p) => {
                vault
                    .login_with_k8s(&p.role, &p.jwt, p.mount.as_deref())
                    .await?
            }
            Self::Ldap(p) => {
                vault
                    .login_with_ldap(&p.username, &p.password, p.mount.as_deref())
                    .await?
            }
            Self::Userpass(p) => {
                vault
                    .login_with_userpass(
                        &p.username,
                        &p.password,
                        p.mount.as_deref(),
                    )
                    .await?
            }
        };

        match response.get("client_token").and_then(Value::as_str) {
            Some(token) => Ok(SecretString::from(token)),
            None => Err(KeySourceError::VaultLogin(response.to_string())),
        }
    }
}

/// Location of the key inside Vault's KV v2 engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SecretParams {
    /// Path of the secret, relative to the engine mount
    pub secret_name: String,
    /// Field of the secret holding the key
    pub secret_key: String,
}

impl SecretParams {
    pub fn new(
        secret_name: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        Self {
            secret_name: secret_name.into(),
            secret_key: secret_key.into(),
        }
    }
}

/// Key stored in Hashicorp Vault.
///
/// Only obtainable through [`HashicorpVaultKeySource::create`], which logs
/// in first. The secret is read again on every call to `private_key`.
#[derive(Clone)]
pub struct HashicorpVaultKeySource {
    vault: Arc<dyn VaultClient>,
    token: SecretString,
    secret_params: SecretParams,
}

impl std::fmt::Debug for HashicorpVaultKeySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashicorpVaultKeySource")
            .field("token", &self.token)
            .field("secret_params", &self.secret_params)
            .finish_non_exhaustive()
    }
}

impl HashicorpVaultKeySource {
    pub async fn create(
        config: &VaultConfig,
        login_params: &LoginParams,
        secret_params: SecretParams,
    ) -> Result<Self, KeySourceError> {
        // Fail on missing credentials before building anything
        login_params.method()?;

        let vault = HttpVaultClient::new(config)?;

        Self::with_client(Arc::new(vault), login_params, secret_params).await
    }

    #[instrument(err, skip_all, fields(secret_name = %secret_params.secret_name))]
    pub async fn with_client(
        vault: Arc<dyn VaultClient>,
        login_params: &LoginParams,
        secret_params: SecretParams,
    ) -> Result<Self, KeySourceError> {
        let method = login_params.method()?;

        tracing::debug!(method = method.name(), "Logging in to Vault");

        let token = method.login(vault.as_ref()).await?;

        Ok(Self {
            vault,
            token,
            secret_params,
        })
    }

    pub fn secret_params(&self) -> &SecretParams {
        &self.secret_params
    }
}

#[async_trait::async_trait]
impl KeySource for HashicorpVaultKeySource {
    #[instrument(err, skip(self), fields(secret_name = %self.secret_params.secret_name))]
    async fn private_key(&self) -> Result<KeyMaterial, KeySourceError> {
        let secret_name = self.secret_params.secret_name.as_str();

        let response =
            self.vault.read_kv_secret(&self.token, secret_name).await?;

        let data = match response.get("data") {
            Some(Value::Object(data)) => data.clone(),
            _ => return Err(KeySourceError::VaultRead(response.to_string())),
        };

        let fields = SecretFields::new(secret_name, data);

        Ok(fields.field(&self.secret_params.secret_key)?.into())
    }
}
