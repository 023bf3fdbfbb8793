//! Request/response collaborator used for every command call.

use async_trait::async_trait;
use bunker_shared::{lobby_path, NewWorld, RpcError, World, HEADER_RPC_MARKER};
use reqwest::{header::CONTENT_TYPE, Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// Code used when a request payload could not be encoded.
const CODE_INVALID_REQUEST: &str = "INVALID_REQUEST";

/// A call identified by a path plus a JSON payload, answered with decoded
/// JSON or a structured [`RpcError`]. A `204` answers `Value::Null`.
#[async_trait]
pub trait RpcClient: Send + Sync {
    async fn rpc(&self, path: &str, body: Value) -> Result<Value, RpcError>;
}

/// Typed convenience over [`RpcClient::rpc`].
pub async fn call<TRes: DeserializeOwned>(
    rpc: &dyn RpcClient,
    path: &str,
    body: impl Serialize,
) -> Result<TRes, RpcError> {
    let body = serde_json::to_value(body)
        .map_err(|e| RpcError::new(0, e.to_string(), CODE_INVALID_REQUEST))?;
    let value = rpc.rpc(path, body).await?;
    serde_json::from_value(value).map_err(|e| RpcError::invalid_response(200, e.to_string()))
}

/// Empty JSON object, the payload of calls that take no arguments.
pub fn no_args() -> Value {
    Value::Object(serde_json::Map::new())
}

/// HTTP implementation of [`RpcClient`]: every call is a `POST` to
/// `<base_url>/<path>`.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Create a new API client
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            base_url: String::new(),
        }
    }

    /// Set the base URL for API requests
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Use a preconfigured HTTP client (cookie store, proxies, TLS roots).
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        if self.base_url.is_empty() {
            if path.starts_with('/') {
                path.to_string()
            } else {
                format!("/{path}")
            }
        } else {
            let base = self.base_url.trim_end_matches('/');
            let path = path.trim_start_matches('/');
            format!("{base}/{path}")
        }
    }

    // --- Lobby ---

    pub async fn get_worlds(&self) -> Result<Vec<World>, RpcError> {
        call(self, &lobby_path("get_worlds"), no_args()).await
    }

    pub async fn get_user_worlds(&self) -> Result<Vec<World>, RpcError> {
        call(self, &lobby_path("get_user_worlds"), no_args()).await
    }

    /// Create a world and return its id.
    pub async fn create_world(&self, world: &NewWorld) -> Result<i32, RpcError> {
        call(self, &lobby_path("create_world"), world).await
    }

    pub async fn join_world(&self, world_id: i32) -> Result<(), RpcError> {
        call(self, &lobby_path("join_world"), serde_json::json!({ "worldId": world_id })).await
    }
}

impl Default for ApiClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RpcClient for ApiClient {
    async fn rpc(&self, path: &str, body: Value) -> Result<Value, RpcError> {
        let url = self.url(path);
        crate::log_debug!("RPC {}", url);

        let resp = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .header(HEADER_RPC_MARKER, "1")
            .json(&body)
            .send()
            .await
            .map_err(|e| RpcError::connection_error(e.to_string()))?;

        let status = resp.status();
        let status_text = status.canonical_reason().unwrap_or_default().to_string();
        if status == StatusCode::NO_CONTENT {
            return Ok(Value::Null);
        }

        let text = resp
            .text()
            .await
            .map_err(|e| RpcError::connection_error(format!("failed to read body: {e}")))?;

        if !status.is_success() {
            return Err(RpcError::from_response(status.as_u16(), status_text, &text));
        }

        if text.is_empty() {
            Ok(Value::Null)
        } else {
            serde_json::from_str(&text)
                .map_err(|e| RpcError::invalid_response(status.as_u16(), e.to_string()))
        }
    }
}
