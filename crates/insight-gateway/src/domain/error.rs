//! Gateway error types and the HTTP error envelope.
//!
//! Every failure that reaches a client is an [`ApiError`]. Handlers and guards
//! return it without knowing the request path; the response-shaping stage
//! renders the final body and fills in `url`.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Standard error envelope: `{status, url, error}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub status: u16,
    pub url: String,
    pub error: String,
}

impl ErrorEnvelope {
    pub fn new(status: u16, url: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            status,
            url: url.into(),
            error: error.into(),
        }
    }
}

/// Shape of the JSON body an [`ApiError`] renders to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorBody {
    /// `{status: <body_status>, url, error}`
    Envelope(String),
    /// `{message}` - used by the register/login endpoints
    Message(String),
    /// `{status: "error"}` - upstream failures, detail stays in the logs
    Upstream,
}

/// HTTP-facing error.
///
/// `http_status` is what goes on the wire; `body_status` is the numeric
/// `status` field inside the envelope. They are kept apart because the
/// unauthorized fallback may be configured to report a different body status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub http_status: StatusCode,
    pub body_status: u16,
    pub body: ErrorBody,
}

impl ApiError {
    /// Envelope error whose body status matches the HTTP status
    pub fn new(http_status: StatusCode, error: impl Into<String>) -> Self {
        Self {
            http_status,
            body_status: http_status.as_u16(),
            body: ErrorBody::Envelope(error.into()),
        }
    }

    /// 400 - client input error
    pub fn bad_request(error: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, error)
    }

    /// 404 - no matching route or resource
    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "Not found")
    }

    /// 401 - missing, invalid or expired session token
    pub fn unauthorized(body_status: u16) -> Self {
        Self {
            http_status: StatusCode::UNAUTHORIZED,
            body_status,
            body: ErrorBody::Envelope("Unauthorized".into()),
        }
    }

    /// 429 (or the configured status) - rate limit exceeded
    pub fn rate_limited(http_status: StatusCode) -> Self {
        Self::new(http_status, "Rate limit exceeded")
    }

    /// `{message}` body with the given status
    pub fn message(http_status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            http_status,
            body_status: http_status.as_u16(),
            body: ErrorBody::Message(message.into()),
        }
    }

    /// `{status: "error"}` body with the given status
    pub fn upstream(http_status: StatusCode) -> Self {
        Self {
            http_status,
            body_status: http_status.as_u16(),
            body: ErrorBody::Upstream,
        }
    }

    /// Render the final JSON body for a request to `url`
    pub fn to_body(&self, url: &str) -> serde_json::Value {
        match &self.body {
            ErrorBody::Envelope(error) => serde_json::to_value(ErrorEnvelope::new(
                self.body_status,
                url,
                error.clone(),
            ))
            .unwrap_or_default(),
            ErrorBody::Message(message) => serde_json::json!({ "message": message }),
            ErrorBody::Upstream => serde_json::json!({ "status": "error" }),
        }
    }

    /// Build a complete response for a known request path
    pub fn into_response_for(self, url: &str) -> Response {
        let body = self.to_body(url);
        (self.http_status, Json(body)).into_response()
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.body {
            ErrorBody::Envelope(e) | ErrorBody::Message(e) => {
                write!(f, "[{}] {}", self.http_status.as_u16(), e)
            }
            ErrorBody::Upstream => write!(f, "[{}] upstream error", self.http_status.as_u16()),
        }
    }
}

impl std::error::Error for ApiError {}

/// Marker the shaping stage looks for in response extensions
#[derive(Debug, Clone)]
pub struct PendingError(pub ApiError);

impl IntoResponse for ApiError {
    /// The url is unknown here, so the body is written with an empty url and
    /// the error is attached for the shaping stage to re-render.
    fn into_response(self) -> Response {
        let mut response = (self.http_status, Json(self.to_body(""))).into_response();
        response
            .headers_mut()
            .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        response.extensions_mut().insert(PendingError(self));
        response
    }
}

/// Result type for route handlers
pub type ApiResult<T> = Result<T, ApiError>;

/// Service-level errors (startup, bind, serve)
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Server socket bind error
    #[error("server bind error: {0}")]
    Bind(String),

    /// Server loop error
    #[error("server error: {0}")]
    Serve(String),
}
