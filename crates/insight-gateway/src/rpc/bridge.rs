//! Bridge to the full node's JSON-RPC interface.
//!
//! Calls are positional (`method`, `[params]`) over HTTP with basic auth and
//! a bounded timeout. Every failure comes back as an [`RpcError`]; callers
//! choose the HTTP status they surface.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

/// RPC bridge errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RpcError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("rpc call timed out after {0:?}")]
    Timeout(Duration),
    #[error("node error {code}: {message}")]
    Node { code: i64, message: String },
    #[error("decode error: {0}")]
    Decode(String),
    #[error("upstream unavailable: {0}")]
    Unavailable(String),
}

impl RpcError {
    /// Message reported by the node itself, if any
    pub fn node_message(&self) -> Option<&str> {
        match self {
            RpcError::Node { message, .. } => Some(message),
            _ => None,
        }
    }
}

/// Point queries against the full node
#[async_trait]
pub trait NodeRpc: Send + Sync {
    async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, RpcError>;
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

/// JSON-RPC 1.0 client over HTTP
#[derive(Debug)]
pub struct HttpNodeRpc {
    client: reqwest::Client,
    url: String,
    user: String,
    password: String,
    timeout: Duration,
    next_id: AtomicU64,
}

impl HttpNodeRpc {
    pub fn new(
        url: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self::with_client(reqwest::Client::new(), url, user, password, timeout)
    }

    /// Use a preconfigured HTTP client
    pub fn with_client(
        client: reqwest::Client,
        url: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            url: url.into(),
            user: user.into(),
            password: password.into(),
            timeout,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn from_config(config: &crate::domain::config::RpcConfig) -> Self {
        Self::new(
            config.url.clone(),
            config.user.clone(),
            config.password.clone(),
            config.timeout,
        )
    }

    async fn send(&self, method: &str, params: Vec<Value>) -> Result<Value, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = serde_json::json!({
            "jsonrpc": "1.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let mut request = self.client.post(&self.url).json(&body);
        if !self.user.is_empty() {
            request = request.basic_auth(&self.user, Some(&self.password));
        }

        let response = request
            .send()
            .await
            .map_err(|e| RpcError::Transport(e.to_string()))?;

        // bitcoind reports RPC errors with HTTP 500 and a JSON body
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| RpcError::Transport(e.to_string()))?;
        let parsed: RpcResponse = serde_json::from_slice(&bytes).map_err(|e| {
            RpcError::Decode(format!("HTTP {}: {}", status.as_u16(), e))
        })?;

        if let Some(error) = parsed.error {
            return Err(RpcError::Node {
                code: error.code,
                message: error.message,
            });
        }
        Ok(parsed.result)
    }
}

#[async_trait]
impl NodeRpc for HttpNodeRpc {
    async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, RpcError> {
        debug!(method, "rpc call");
        match tokio::time::timeout(self.timeout, self.send(method, params)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(method, timeout = ?self.timeout, "rpc call timed out");
                Err(RpcError::Timeout(self.timeout))
            }
        }
    }
}
