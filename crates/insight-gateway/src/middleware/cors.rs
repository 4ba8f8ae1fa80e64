//! CORS headers and preflight short-circuit.
//!
//! Every response gets the configured allow headers. Any `OPTIONS` request
//! is answered here with 204 and never reaches the inner stages.

use crate::domain::config::CorsConfig;
use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderValue, Method, Request, StatusCode},
    response::Response,
};
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tracing::warn;

/// Pre-validated header values
#[derive(Debug, Clone)]
struct CorsHeaders {
    allow_origin: HeaderValue,
    allow_methods: HeaderValue,
    allow_headers: HeaderValue,
}

impl CorsHeaders {
    fn from_config(config: &CorsConfig) -> Self {
        fn value(raw: &str, fallback: &'static str, name: &str) -> HeaderValue {
            HeaderValue::from_str(raw).unwrap_or_else(|_| {
                warn!(header = name, value = raw, "invalid CORS header value, using default");
                HeaderValue::from_static(fallback)
            })
        }

        Self {
            allow_origin: value(&config.allow_origin, "*", "allow_origin"),
            allow_methods: value(
                &config.allow_methods,
                "GET, HEAD, PUT, POST, OPTIONS",
                "allow_methods",
            ),
            allow_headers: value(
                &config.allow_headers,
                "Origin, X-Requested-With, Content-Type, Accept",
                "allow_headers",
            ),
        }
    }

    fn apply(&self, headers: &mut HeaderMap) {
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, self.allow_origin.clone());
        headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, self.allow_methods.clone());
        headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, self.allow_headers.clone());
    }
}

/// CORS layer
#[derive(Clone)]
pub struct CorsLayer {
    headers: Arc<CorsHeaders>,
}

impl CorsLayer {
    pub fn new(config: &CorsConfig) -> Self {
        Self {
            headers: Arc::new(CorsHeaders::from_config(config)),
        }
    }
}

impl<S> Layer<S> for CorsLayer {
    type Service = CorsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CorsService {
            inner,
            headers: Arc::clone(&self.headers),
        }
    }
}

/// CORS service
#[derive(Clone)]
pub struct CorsService<S> {
    inner: S,
    headers: Arc<CorsHeaders>,
}

impl<S> Service<Request<Body>> for CorsService<S>
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
        let headers = Arc::clone(&self.headers);

        if req.method() == Method::OPTIONS {
            let mut response = Response::new(Body::empty());
            *response.status_mut() = StatusCode::NO_CONTENT;
            headers.apply(response.headers_mut());
            return Box::pin(async move { Ok(response) });
        }

        let mut inner = self.inner.clone();
        Box::pin(async move {
            let mut response = inner.call(req).await?;
            headers.apply(response.headers_mut());
            Ok(response)
        })
    }
}
