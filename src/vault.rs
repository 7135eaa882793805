//! Client for the Hashicorp Vault HTTP API

use reqwest::{Response, StatusCode};
use serde_json::{json, Value};
use tracing::instrument;
use url::Url;

use crate::config::VaultConfig;
use crate::keys::KeySourceError;
use crate::types::SecretString;

const TOKEN_HEADER: &str = "X-Vault-Token";
const NAMESPACE_HEADER: &str = "X-Vault-Namespace";

/// The subset of Vault operations needed to obtain a key.
///
/// Login calls return the `auth` object of a successful response, or the raw
/// error body otherwise. Reads return the KV v2 `data` object (which wraps
/// the secret under another `data` key), or the raw error body.
#[async_trait::async_trait]
pub trait VaultClient: Send + Sync {
    async fn login_with_app_role(
        &self,
        role_id: &str,
        secret_id: &SecretString,
        mount: Option<&str>,
    ) -> Result<Value, KeySourceError>;

    async fn login_with_cert(
        &self,
        cert_name: &str,
        mount: Option<&str>,
    ) -> Result<Value, KeySourceError>;

    async fn login_with_k8s(
        &self,
        role: &str,
        jwt: &SecretString,
        mount: Option<&str>,
    ) -> Result<Value, KeySourceError>;

    async fn login_with_ldap(
        &self,
        username: &str,
        password: &SecretString,
        mount: Option<&str>,
    ) -> Result<Value, KeySourceError>;

    async fn login_with_userpass(
        &self,
        username: &str,
        password: &SecretString,
        mount: Option<&str>,
    ) -> Result<Value, KeySourceError>;

    async fn read_kv_secret(
        &self,
        token: &SecretString,
        name: &str,
    ) -> Result<Value, KeySourceError>;
}

pub struct HttpVaultClient {
    client: reqwest::Client,
    base_url: Url,
    root_path: String,
    namespace: Option<String>,
}

impl HttpVaultClient {
    pub fn new(config: &VaultConfig) -> Result<Self, KeySourceError> {
        let mut builder = reqwest::Client::builder().timeout(config.timeout);

        if let Some(path) = &config.ca_cert {
            let pem = read_pem(path)?;
            builder = builder
                .add_root_certificate(reqwest::Certificate::from_pem(&pem)?);
        }

        if let Some(path) = &config.client_identity {
            let pem = read_pem(path)?;
            builder = builder.identity(reqwest::Identity::from_pem(&pem)?);
        }

        Ok(Self {
            client: builder.build()?,
            base_url: config.base_url.clone(),
            root_path: config.root_path.trim_matches('/').to_owned(),
            namespace: config.namespace.clone(),
        })
    }

    /// Appends `segments` to the API root, percent-encoding each of them
    fn url<'a>(
        &self,
        segments: impl IntoIterator<Item = &'a str>,
    ) -> Result<Url, KeySourceError> {
        let mut url = self.base_url.clone();

        url.path_segments_mut()
            .map_err(|()| {
                KeySourceError::InvalidConfig(format!(
                    "{} cannot be used as a Vault API root",
                    self.base_url
                ))
            })?
            .pop_if_empty()
            .extend(segments);

        Ok(url)
    }

    fn login_url(
        &self,
        mount: &str,
        username: Option<&str>,
    ) -> Result<Url, KeySourceError> {
        self.url(["auth", mount, "login"].into_iter().chain(username))
    }

    /// KV v2 data path of `name`. Slashes in the name address nested secrets.
    fn secret_url(&self, name: &str) -> Result<Url, KeySourceError> {
        self.url(
            self.root_path
                .split('/')
                .chain(["data"])
                .chain(name.split('/').filter(|s| !s.is_empty())),
        )
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.namespace {
            Some(namespace) => builder.header(NAMESPACE_HEADER, namespace),
            None => builder,
        }
    }

    #[instrument(err, skip(self, body))]
    async fn login(
        &self,
        mount: &str,
        username: Option<&str>,
        body: Value,
    ) -> Result<Value, KeySourceError> {
        let url = self.login_url(mount, username)?;

        let response = self
            .request(self.client.post(url))
            .json(&body)
            .send()
            .await?;

        let (status, body) = Self::response_body(response).await?;

        if !status.is_success() {
            tracing::warn!(%status, "Vault login rejected");
            return Ok(body);
        }

        Ok(match body {
            Value::Object(mut map) => {
                map.remove("auth").unwrap_or(Value::Object(map))
            }
            other => other,
        })
    }

    async fn response_body(
        response: Response,
    ) -> Result<(StatusCode, Value), KeySourceError> {
        let status = response.status();
        let text = response.text().await?;

        let body = serde_json::from_str(&text).unwrap_or(Value::String(text));

        Ok((status, body))
    }
}

fn read_pem(path: &std::path::Path) -> Result<Vec<u8>, KeySourceError> {
    std::fs::read(path).map_err(|e| {
        KeySourceError::InvalidConfig(format!(
            "failed to read {}: {e}",
            path.display()
        ))
    })
}

#[async_trait::async_trait]
impl VaultClient for HttpVaultClient {
    async fn login_with_app_role(
        &self,
        role_id: &str,
        secret_id: &SecretString,
        mount: Option<&str>,
    ) -> Result<Value, KeySourceError> {
        let body = json!({
            "role_id": role_id,
            "secret_id": secret_id.expose(),
        });

        self.login(mount.unwrap_or("approle"), None, body).await
    }

    async fn login_with_cert(
        &self,
        cert_name: &str,
        mount: Option<&str>,
    ) -> Result<Value, KeySourceError> {
        let body = json!({ "name": cert_name });

        self.login(mount.unwrap_or("cert"), None, body).await
    }

    async fn login_with_k8s(
        &self,
        role: &str,
        jwt: &SecretString,
        mount: Option<&str>,
    ) -> Result<Value, KeySourceError> {
        let body = json!({
            "role": role,
            "jwt": jwt.expose(),
        });

        self.login(mount.unwrap_or("kubernetes"), None, body).await
    }

    async fn login_with_ldap(
        &self,
        username: &str,
        password: &SecretString,
        mount: Option<&str>,
    ) -> Result<Value, KeySourceError> {
        let body = json!({ "password": password.expose() });

        self.login(mount.unwrap_or("ldap"), Some(username), body)
            .await
    }

    async fn login_with_userpass(
        &self,
        username: &str,
        password: &SecretString,
        mount: Option<&str>,
    ) -> Result<Value, KeySourceError> {
        let body = json!({ "password": password.expose() });

        self.login(mount.unwrap_or("userpass"), Some(username), body)
            .await
    }

    #[instrument(err, skip(self, token))]
    async fn read_kv_secret(
        &self,
        token: &SecretString,
        name: &str,
    ) -> Result<Value, KeySourceError> {
        let url = self.secret_url(name)?;

        let response = self
            .request(self.client.get(url))
            .header(TOKEN_HEADER, token.expose())
            .send()
            .await?;

        let (status, body) = Self::response_body(response).await?;

        if !status.is_success() {
            tracing::warn!(%status, "Vault secret read rejected");
            return Ok(body);
        }

        Ok(match body {
            Value::Object(mut map) => {
                map.remove("data").unwrap_or(Value::Object(map))
            }
            other => other,
        })
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    fn client(base_url: &str) -> eyre::Result<HttpVaultClient> {
        let mut config = VaultConfig::new(base_url.parse()?);
        config.root_path = "/kv/team/".to_string();

        Ok(HttpVaultClient::new(&config)?)
    }

    #[test_case("http://vault:8200/v1" ; "no trailing slash")]
    #[test_case("http://vault:8200/v1/" ; "trailing slash")]
    fn login_url_encodes_username(base_url: &str) -> eyre::Result<()> {
        let client = client(base_url)?;

        let url = client.login_url("userpass", Some("ops?team#1"))?;

        assert_eq!(
            url.as_str(),
            "http://vault:8200/v1/auth/userpass/login/ops%3Fteam%231"
        );

        Ok(())
    }

    #[test]
    fn login_url_without_username() -> eyre::Result<()> {
        let client = client("http://vault:8200/v1")?;

        let url = client.login_url("approle", None)?;

        assert_eq!(url.as_str(), "http://vault:8200/v1/auth/approle/login");

        Ok(())
    }

    #[test]
    fn secret_url_keeps_nested_path() -> eyre::Result<()> {
        let client = client("http://vault:8200/v1")?;

        let url = client.secret_url("/wallets/main?v=2")?;

        assert_eq!(
            url.as_str(),
            "http://vault:8200/v1/kv/team/data/wallets/main%3Fv=2"
        );

        Ok(())
    }
}
