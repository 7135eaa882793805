//! In-memory stand-in for the parts of the Hashicorp Vault HTTP API used to
//! log in and read KV v2 secrets.

use std::collections::{HashMap, HashSet};
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{post, IntoMakeService};
use axum::{Json, Router};
use hyper::server::conn::AddrIncoming;
use serde_json::{json, Value};
use tokio::sync::Mutex;

pub const TOKEN_HEADER: &str = "x-vault-token";

/// Credentials accepted by an auth mount
#[derive(Debug, Clone)]
pub enum AuthBackend {
    AppRole { role_id: String, secret_id: String },
    Cert { name: String },
    Kubernetes { role: String, jwt: String },
    /// Both `ldap` and `userpass` check a username and password
    Password { username: String, password: String },
}

pub struct FakeVault {
    root_token: String,
    auth_mounts: Mutex<HashMap<String, AuthBackend>>,
    tokens: Mutex<HashSet<String>>,
    secrets: Mutex<HashMap<(String, String), Value>>,
}

impl FakeVault {
    pub fn root_token(&self) -> &str {
        &self.root_token
    }

    pub async fn enable_auth(&self, mount: &str, backend: AuthBackend) {
        self.auth_mounts
            .lock()
            .await
            .insert(mount.to_string(), backend);
    }

    pub async fn write_secret(&self, mount: &str, path: &str, data: Value) {
        self.secrets
            .lock()
            .await
            .insert((mount.to_string(), path.to_string()), data);
    }

    async fn is_valid_token(&self, token: &str) -> bool {
        token == self.root_token || self.tokens.lock().await.contains(token)
    }

    async fn login(
        &self,
        mount: &str,
        username: Option<&str>,
        body: &Value,
    ) -> Option<String> {
        let backend = self.auth_mounts.lock().await.get(mount).cloned()?;
        let field = |name: &str| body.get(name).and_then(Value::as_str);

        let accepted = match (&backend, username) {
            (AuthBackend::AppRole { role_id, secret_id }, None) => {
                field("role_id") == Some(role_id.as_str())
                    && field("secret_id") == Some(secret_id.as_str())
            }
            (AuthBackend::Cert { name }, None) => {
                field("name") == Some(name.as_str())
            }
            (AuthBackend::Kubernetes { role, jwt }, None) => {
                field("role") == Some(role.as_str())
                    && field("jwt") == Some(jwt.as_str())
            }
            (
                AuthBackend::Password { username, password },
                Some(requested),
            ) => {
                requested == username.as_str()
                    && field("password") == Some(password.as_str())
            }
            _ => false,
        };

        if !accepted {
            return None;
        }

        let token = format!("hvs.{}", uuid::Uuid::new_v4().to_simple());
        self.tokens.lock().await.insert(token.clone());

        Some(token)
    }
}

type Reply = (StatusCode, Json<Value>);

fn errors(status: StatusCode, message: &str) -> Reply {
    (status, Json(json!({ "errors": [message] })))
}

fn login_reply(token: Option<String>) -> Reply {
    match token {
        Some(token) => (
            StatusCode::OK,
            Json(json!({
                "auth": {
                    "client_token": token,
                    "lease_duration": 3600,
                    "renewable": true,
                }
            })),
        ),
        None => errors(StatusCode::BAD_REQUEST, "invalid credentials"),
    }
}

async fn login(
    State(vault): State<Arc<FakeVault>>,
    Path(mount): Path<String>,
    Json(body): Json<Value>,
) -> Reply {
    tracing::info!(%mount, "login");

    login_reply(vault.login(&mount, None, &body).await)
}

async fn login_with_username(
    State(vault): State<Arc<FakeVault>>,
    Path((mount, username)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Reply {
    tracing::info!(%mount, %username, "login");

    login_reply(vault.login(&mount, Some(&username), &body).await)
}

fn token(headers: &HeaderMap) -> &str {
    headers
        .get(TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
}

async fn read_secret(
    State(vault): State<Arc<FakeVault>>,
    Path((mount, path)): Path<(String, String)>,
    headers: HeaderMap,
) -> Reply {
    if !vault.is_valid_token(token(&headers)).await {
        return errors(StatusCode::FORBIDDEN, "permission denied");
    }

    let key = (mount, path.trim_start_matches('/').to_string());
    tracing::info!(?key, "read secret");

    match vault.secrets.lock().await.get(&key) {
        Some(data) => (
            StatusCode::OK,
            Json(json!({
                "data": {
                    "data": data,
                    "metadata": { "version": 1 },
                }
            })),
        ),
        None => (StatusCode::NOT_FOUND, Json(json!({ "errors": [] }))),
    }
}

async fn write_secret(
    State(vault): State<Arc<FakeVault>>,
    Path((mount, path)): Path<(String, String)>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Reply {
    if !vault.is_valid_token(token(&headers)).await {
        return errors(StatusCode::FORBIDDEN, "permission denied");
    }

    let Some(data) = body.get("data").cloned() else {
        return errors(StatusCode::BAD_REQUEST, "no data provided");
    };

    let path = path.trim_start_matches('/');
    vault.write_secret(&mount, path, data).await;

    (StatusCode::OK, Json(json!({ "data": { "version": 1 } })))
}

pub async fn serve(
    port: u16,
    root_token: impl ToString,
) -> (
    Arc<FakeVault>,
    axum::Server<AddrIncoming, IntoMakeService<Router>>,
) {
    let state = Arc::new(FakeVault {
        root_token: root_token.to_string(),
        auth_mounts: Mutex::new(HashMap::new()),
        tokens: Mutex::new(HashSet::new()),
        secrets: Mutex::new(HashMap::new()),
    });

    let router = Router::new()
        .route("/v1/auth/:mount/login", post(login))
        .route("/v1/auth/:mount/login/:username", post(login_with_username))
        .route("/v1/:mount/data/*path", post(write_secret).get(read_secret))
        .with_state(state.clone())
        .layer(tower_http::trace::TraceLayer::new_for_http());

    let host = Ipv4Addr::new(127, 0, 0, 1);
    let socket_addr = SocketAddr::new(host.into(), port);

    let server =
        axum::Server::bind(&socket_addr).serve(router.into_make_service());

    (state, server)
}
