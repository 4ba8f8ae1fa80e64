//! Response shaping.
//!
//! Handlers and the auth guard return [`ApiError`] without knowing the
//! request path. This stage re-renders those responses so the envelope's
//! `url` is the original request path. Status and headers are preserved.

use crate::domain::error::PendingError;
use axum::{
    body::Body,
    http::{header, HeaderValue, Request, StatusCode},
    response::Response,
};
use std::any::Any;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tracing::error;

/// Response shaping layer
#[derive(Debug, Clone, Copy, Default)]
pub struct ShapingLayer;

impl ShapingLayer {
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for ShapingLayer {
    type Service = ShapingService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ShapingService { inner }
    }
}

/// Response shaping service
#[derive(Clone)]
pub struct ShapingService<S> {
    inner: S,
}

impl<S> Service<Request<Body>> for ShapingService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let mut inner = self.inner.clone();
        let path = req.uri().path().to_string();

        Box::pin(async move {
            let response = inner.call(req).await?;
            Ok(render_pending(response, &path))
        })
    }
}

/// Re-render a response carrying a [`PendingError`] for `path`
pub fn render_pending(mut response: Response, path: &str) -> Response {
    let Some(PendingError(error)) = response.extensions_mut().remove::<PendingError>() else {
        return response;
    };

    let body = serde_json::to_vec(&error.to_body(path)).unwrap_or_default();
    let headers = response.headers_mut();
    headers.remove(header::CONTENT_LENGTH);
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    *response.body_mut() = Body::from(body);
    response
}

/// Panic handler for the catch-panic stage: 500 `{status: "error"}`
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!(detail, "request handler panicked");

    let mut response = Response::new(Body::from(r#"{"status":"error"}"#));
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}
