use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::keys::{LoginParams, SecretParams, SecretRequest};
use crate::types::SecretString;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SafeSignerConfig {
    pub signer: SignerConfig,

    /// JSON-RPC endpoint the signer is bound to
    #[serde(default)]
    pub rpc_url: Option<Url>,

    #[serde(default)]
    pub chain_id: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum SignerConfig {
    Plain(PlainSignerConfig),
    Env(EnvSignerConfig),
    AwsSecretsManager(AwsSecretsManagerSignerConfig),
    AwsKms(AwsKmsSignerConfig),
    GcpKms(GcpKmsSignerConfig),
    HashicorpVault(HashicorpVaultSignerConfig),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PlainSignerConfig {
    pub private_key: SecretString,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EnvSignerConfig {
    pub variable: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AwsSecretsManagerSignerConfig {
    pub secret: SecretRequest,

    #[serde(default)]
    pub aws: Option<AwsClientConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AwsKmsSignerConfig {
    pub key_id: String,

    #[serde(default)]
    pub aws: Option<AwsClientConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct GcpKmsSignerConfig {
    /// Full resource name of the key version
    pub key_name: String,

    #[serde(default)]
    pub gcp: Option<GcpClientConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct HashicorpVaultSignerConfig {
    pub vault: VaultConfig,
    pub login: LoginParams,
    pub secret: SecretParams,
}

/// Overrides for AWS clients. Unset fields use the default provider chain.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AwsClientConfig {
    #[serde(default)]
    pub region: Option<String>,

    /// Custom endpoint, e.g. a LocalStack instance
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default)]
    pub credentials: Option<AwsCredentialsConfig>,
}

/// Overrides for the Cloud KMS client. Credentials always come from
/// Application Default Credentials.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct GcpClientConfig {
    #[serde(default)]
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AwsCredentialsConfig {
    pub access_key_id: String,
    pub secret_access_key: SecretString,

    #[serde(default)]
    pub session_token: Option<SecretString>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct VaultConfig {
    /// API root, including the version prefix (`http://127.0.0.1:8200/v1`)
    pub base_url: Url,

    /// Mount of the KV v2 secrets engine
    #[serde(default = "default::root_path")]
    pub root_path: String,

    #[serde(with = "humantime_serde", default = "default::timeout")]
    pub timeout: Duration,

    #[serde(default)]
    pub namespace: Option<String>,

    /// PEM bundle of additional trusted CAs
    #[serde(default)]
    pub ca_cert: Option<PathBuf>,

    /// PEM file with the client certificate and private key, used for cert
    /// authentication
    #[serde(default)]
    pub client_identity: Option<PathBuf>,
}

impl VaultConfig {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            root_path: default::root_path(),
            timeout: default::timeout(),
            namespace: None,
            ca_cert: None,
            client_identity: None,
        }
    }
}

mod default {
    use std::time::Duration;

    pub fn root_path() -> String {
        "secret".to_string()
    }

    pub fn timeout() -> Duration {
        Duration::from_secs(6)
    }
}

/// Loads the configuration from the given files, then applies
/// `SAFE_SIGNER__*` environment overrides
pub fn load_config<'a>(
    config_files: impl Iterator<Item = &'a Path>,
) -> eyre::Result<SafeSignerConfig> {
    let mut settings = config::Config::builder();

    for config_file in config_files {
        settings = settings.add_source(config::File::from(config_file));
    }

    let settings = settings
        .add_source(
            config::Environment::with_prefix("SAFE_SIGNER")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let config = settings.try_deserialize::<SafeSignerConfig>()?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;

    const VAULT_CONFIG: &str = indoc! {r#"
        rpc_url = "http://127.0.0.1:8545/"
        chain_id = 31337

        [signer]
        kind = "hashicorp_vault"

        [signer.vault]
        base_url = "http://127.0.0.1:8200/v1"
        timeout = "10s"

        [signer.login.userpass]
        username = "alice"
        password = "hunter2"

        [signer.secret]
        secret_name = "wallet-secret"
        secret_key = "privateKey"
    "#};

    const SECRETS_MANAGER_CONFIG: &str = indoc! {r#"
        [signer]
        kind = "aws_secrets_manager"

        [signer.secret]
        secret_id = "MyWallet"
        secret_key_name = "privateKey"

        [signer.aws]
        region = "us-east-1"
        endpoint = "http://localhost:4566"

        [signer.aws.credentials]
        access_key_id = "test"
        secret_access_key = "test"
    "#};

    const GCP_KMS_CONFIG: &str = indoc! {r#"
        [signer]
        kind = "gcp_kms"
        key_name = "projects/p/locations/global/keyRings/r/cryptoKeys/k/cryptoKeyVersions/1"
    "#};

    #[test]
    fn deserialize_gcp_kms_config() {
        let config: SafeSignerConfig = toml::from_str(GCP_KMS_CONFIG).unwrap();

        let SignerConfig::GcpKms(gcp) = config.signer else {
            panic!("expected gcp kms config");
        };

        assert!(gcp.key_name.ends_with("cryptoKeyVersions/1"));
        assert!(gcp.gcp.is_none());
    }

    #[test]
    fn deserialize_vault_config() {
        let config: SafeSignerConfig = toml::from_str(VAULT_CONFIG).unwrap();

        assert_eq!(config.chain_id, Some(31337));

        let SignerConfig::HashicorpVault(vault) = config.signer else {
            panic!("expected vault config");
        };

        assert_eq!(vault.vault.root_path, "secret");
        assert_eq!(vault.vault.timeout, Duration::from_secs(10));
        assert_eq!(vault.secret.secret_name, "wallet-secret");
        assert!(vault.login.token.is_none());

        let userpass = vault.login.userpass.unwrap();
        assert_eq!(userpass.username, "alice");
        assert_eq!(userpass.password.expose(), "hunter2");
        assert!(userpass.mount.is_none());
    }

    #[test]
    fn deserialize_secrets_manager_config() {
        let config: SafeSignerConfig =
            toml::from_str(SECRETS_MANAGER_CONFIG).unwrap();

        let SignerConfig::AwsSecretsManager(sm) = config.signer else {
            panic!("expected secrets manager config");
        };

        assert_eq!(sm.secret.secret_id, "MyWallet");
        assert_eq!(sm.secret.secret_key_name, "privateKey");

        let aws = sm.aws.unwrap();
        assert_eq!(aws.region.as_deref(), Some("us-east-1"));
        assert_eq!(aws.credentials.unwrap().access_key_id, "test");
    }

    #[test]
    fn load_config_from_file() -> eyre::Result<()> {
        let path = std::env::temp_dir().join(format!(
            "safe-signer-{}.toml",
            rand::random::<u64>()
        ));
        std::fs::write(&path, VAULT_CONFIG)?;

        let config = load_config(std::iter::once(path.as_path()));
        std::fs::remove_file(&path)?;
        let config = config?;

        assert_eq!(
            config.rpc_url.map(String::from).as_deref(),
            Some("http://127.0.0.1:8545/")
        );
        assert!(matches!(config.signer, SignerConfig::HashicorpVault(_)));

        Ok(())
    }

    #[test]
    fn sample() {
        let config = SafeSignerConfig {
            signer: SignerConfig::AwsKms(AwsKmsSignerConfig {
                key_id: "arn:aws:kms:us-east-1:000000000000:key/1".to_string(),
                aws: Some(AwsClientConfig {
                    region: Some("us-east-1".to_string()),
                    ..Default::default()
                }),
            }),
            rpc_url: None,
            chain_id: Some(1),
        };

        let toml = toml::to_string_pretty(&config).unwrap();

        println!("{}", toml);
    }
}
