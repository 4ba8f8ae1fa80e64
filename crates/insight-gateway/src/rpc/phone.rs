//! Phone-number directory lookup (`GET <endpoint>/<phone>`).

use crate::rpc::bridge::RpcError;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

#[async_trait]
pub trait PhoneDirectory: Send + Sync {
    /// Fetch the directory's JSON body for `phone`
    async fn lookup(&self, phone: &str) -> Result<Value, RpcError>;
}

#[derive(Debug)]
pub struct HttpPhoneDirectory {
    client: reqwest::Client,
    endpoint: Option<String>,
    timeout: Duration,
}

impl HttpPhoneDirectory {
    pub fn new(endpoint: Option<String>, timeout: Duration) -> Self {
        Self::with_client(reqwest::Client::new(), endpoint, timeout)
    }

    pub fn with_client(client: reqwest::Client, endpoint: Option<String>, timeout: Duration) -> Self {
        Self {
            client,
            endpoint: endpoint.map(|e| e.trim_end_matches('/').to_string()),
            timeout,
        }
    }

    pub fn from_config(config: &crate::domain::config::PhoneConfig) -> Self {
        Self::new(config.endpoint.clone(), config.timeout)
    }
}

#[async_trait]
impl PhoneDirectory for HttpPhoneDirectory {
    async fn lookup(&self, phone: &str) -> Result<Value, RpcError> {
        let endpoint = self
            .endpoint
            .as_deref()
            .ok_or_else(|| RpcError::Unavailable("phone directory not configured".into()))?;
        let url = format!("{endpoint}/{phone}");

        let fetch = async {
            self.client
                .get(&url)
                .send()
                .await
                .map_err(|e| RpcError::Transport(e.to_string()))?
                .json::<Value>()
                .await
                .map_err(|e| RpcError::Decode(e.to_string()))
        };

        tokio::time::timeout(self.timeout, fetch)
            .await
            .map_err(|_| RpcError::Timeout(self.timeout))?
    }
}
