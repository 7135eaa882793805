use clap::Parser;
use fake_vault::AuthBackend;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Parser)]
struct Args {
    #[clap(short, long, default_value = "8200")]
    port: u16,

    #[clap(long, env = "VAULT_DEV_ROOT_TOKEN_ID", default_value = "root")]
    root_token: String,

    /// Enables `userpass` login for `username:password`
    #[clap(long)]
    userpass: Option<String>,
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().pretty().compact())
        .with(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let (vault, server) = fake_vault::serve(args.port, &args.root_token).await;

    if let Some(userpass) = &args.userpass {
        let (username, password) = userpass
            .split_once(':')
            .ok_or_else(|| eyre::eyre!("expected username:password"))?;

        vault
            .enable_auth(
                "userpass",
                AuthBackend::Password {
                    username: username.to_string(),
                    password: password.to_string(),
                },
            )
            .await;
    }

    tracing::info!("Serving fake Vault at {}", server.local_addr());

    server.await?;

    Ok(())
}
