//! Route handlers.
//!
//! Handlers are thin: validate input, call the node or the credential store,
//! shape the JSON. Every collaborator failure is mapped to an [`ApiError`]
//! here, at the call site.

pub mod addresses;
pub mod blocks;
pub mod chain;
pub mod messages;
pub mod status;
pub mod transactions;
pub mod users;

use crate::auth::{CredentialStore, SessionIssuer};
use crate::domain::config::GatewayConfig;
use crate::domain::error::ApiError;
use crate::rpc::{NodeRpc, PhoneDirectory, RpcError};
use async_trait::async_trait;
use axum::{
    extract::{FromRequest, Request},
    http::{header, Method, StatusCode},
    Form, Json,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

/// Shared state for all handlers
#[derive(Clone)]
pub struct AppState {
    pub rpc: Arc<dyn NodeRpc>,
    pub phone: Arc<dyn PhoneDirectory>,
    pub store: Arc<dyn CredentialStore>,
    pub issuer: Arc<SessionIssuer>,
    pub config: Arc<GatewayConfig>,
}

impl AppState {
    /// Call the node, mapping failures to the configured upstream status
    pub async fn rpc_call(&self, method: &str, params: Vec<Value>) -> Result<Value, ApiError> {
        self.rpc
            .call(method, params)
            .await
            .map_err(|e| self.upstream_error(method, e))
    }

    /// Call the node, keeping the raw error for handlers that surface node messages
    pub async fn rpc_call_raw(&self, method: &str, params: Vec<Value>) -> Result<Value, RpcError> {
        self.rpc.call(method, params).await
    }

    pub fn upstream_error(&self, method: &str, error: RpcError) -> ApiError {
        warn!(method, error = %error, "rpc call failed");
        ApiError::upstream(self.failure_status())
    }

    fn failure_status(&self) -> StatusCode {
        StatusCode::from_u16(self.config.rpc.failure_status).unwrap_or(StatusCode::NOT_FOUND)
    }
}

/// Request body accepted as JSON or urlencoded form.
///
/// A body without a content type deserializes as an empty object, so
/// handlers with all-optional fields can report missing fields themselves.
#[derive(Debug, Clone)]
pub struct Payload<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for Payload<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_ascii_lowercase());

        match content_type {
            Some(ct) if ct.starts_with("application/json") => {
                let Json(value) = Json::<T>::from_request(req, state)
                    .await
                    .map_err(|e| ApiError::bad_request(e.body_text()))?;
                Ok(Payload(value))
            }
            Some(_) => {
                let Form(value) = Form::<T>::from_request(req, state)
                    .await
                    .map_err(|e| ApiError::bad_request(e.body_text()))?;
                Ok(Payload(value))
            }
            None if req.method() == Method::GET => {
                let Form(value) = Form::<T>::from_request(req, state)
                    .await
                    .map_err(|e| ApiError::bad_request(e.body_text()))?;
                Ok(Payload(value))
            }
            None => serde_json::from_value(Value::Object(Default::default()))
                .map(Payload)
                .map_err(|e| ApiError::bad_request(e.to_string())),
        }
    }
}

/// 64 hex characters (block hash, txid)
pub fn is_hash(s: &str) -> bool {
    s.len() == 64 && s.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Satoshis to coins
pub fn to_coins(satoshis: i64) -> f64 {
    satoshis as f64 / 100_000_000.0
}
