//! Authentication guard for protected routes.
//!
//! Reads `Authorization: Bearer <token>`, validates it with the session
//! issuer and either attaches the [`Claims`] to the request or answers with
//! the unauthorized fallback. Applied per route, never globally.

use crate::auth::session::{Claims, SessionIssuer};
use crate::domain::error::ApiError;
use crate::middleware::metrics::GatewayMetrics;
use crate::ports::AuthHooks;
use axum::{
    body::Body,
    http::{header, HeaderValue, Request},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// Guard configuration
#[derive(Clone)]
pub struct AuthGuard {
    issuer: Arc<SessionIssuer>,
    hooks: Arc<dyn AuthHooks>,
    metrics: Arc<GatewayMetrics>,
    /// `status` field of the unauthorized envelope
    body_status: u16,
}

impl AuthGuard {
    pub fn new(
        issuer: Arc<SessionIssuer>,
        hooks: Arc<dyn AuthHooks>,
        metrics: Arc<GatewayMetrics>,
        body_status: u16,
    ) -> Self {
        Self {
            issuer,
            hooks,
            metrics,
            body_status,
        }
    }

    /// Decide on a request; `Ok` carries the validated claims
    fn authorize<B>(&self, req: &Request<B>) -> Result<Claims, Response> {
        let Some(token) = bearer_token(req) else {
            self.hooks.on_absent();
            return Err(self.unauthorized());
        };

        match self.issuer.validate(token) {
            Ok(claims) => {
                self.hooks.on_valid(&claims);
                Ok(claims)
            }
            Err(error) => {
                self.hooks.on_invalid(&error);
                Err(self.unauthorized())
            }
        }
    }

    fn unauthorized(&self) -> Response {
        self.metrics.record_unauthorized();
        let mut response = ApiError::unauthorized(self.body_status).into_response();
        response
            .headers_mut()
            .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        response
    }
}

/// Token from an `Authorization: Bearer` header
fn bearer_token<B>(req: &Request<B>) -> Option<&str> {
    let value = req.headers().get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Authentication layer
#[derive(Clone)]
pub struct AuthLayer {
    guard: AuthGuard,
}

impl AuthLayer {
    pub fn new(guard: AuthGuard) -> Self {
        Self { guard }
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = AuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthService {
            inner,
            guard: self.guard.clone(),
        }
    }
}

/// Authentication service
#[derive(Clone)]
pub struct AuthService<S> {
    inner: S,
    guard: AuthGuard,
}

impl<S> Service<Request<Body>> for AuthService<S>
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

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        match self.guard.authorize(&req) {
            Ok(claims) => {
                req.extensions_mut().insert(claims);
                let mut inner = self.inner.clone();
                Box::pin(async move { inner.call(req).await })
            }
            Err(response) => Box::pin(async move { Ok(response) }),
        }
    }
}
