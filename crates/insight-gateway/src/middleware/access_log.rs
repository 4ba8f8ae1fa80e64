//! Access logging.
//!
//! One `info` event per request on the `insight_gateway::access` target, after
//! the response is produced. Observational only; the request and response
//! pass through untouched.

use crate::middleware::client_ip::ClientIp;
use crate::middleware::metrics::GatewayMetrics;
use axum::{
    body::Body,
    http::{header, Request},
    response::Response,
};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;
use tower::{Layer, Service};
use tracing::info;

/// Access log layer
#[derive(Clone)]
pub struct AccessLogLayer {
    metrics: Arc<GatewayMetrics>,
}

impl AccessLogLayer {
    pub fn new(metrics: Arc<GatewayMetrics>) -> Self {
        Self { metrics }
    }
}

impl<S> Layer<S> for AccessLogLayer {
    type Service = AccessLogService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AccessLogService {
            inner,
            metrics: Arc::clone(&self.metrics),
        }
    }
}

/// Access log service
#[derive(Clone)]
pub struct AccessLogService<S> {
    inner: S,
    metrics: Arc<GatewayMetrics>,
}

impl<S> Service<Request<Body>> for AccessLogService<S>
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
        let metrics = Arc::clone(&self.metrics);

        let started = Instant::now();
        let method = req.method().clone();
        let url = req
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| req.uri().path().to_string());
        let remote = req
            .extensions()
            .get::<ClientIp>()
            .map(|ClientIp(ip)| ip.to_string())
            .unwrap_or_else(|| "-".to_string());
        let user_agent = req
            .headers()
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-")
            .to_string();

        Box::pin(async move {
            let response = inner.call(req).await?;

            let elapsed = started.elapsed();
            let status = response.status().as_u16();
            let content_length = response
                .headers()
                .get(header::CONTENT_LENGTH)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("-")
                .to_string();
            metrics.record_request(status, elapsed.as_millis() as u64);

            info!(
                target: "insight_gateway::access",
                remote = %remote,
                method = %method,
                url = %url,
                status,
                content_length = %content_length,
                response_time_ms = elapsed.as_secs_f64() * 1000.0,
                user_agent = %user_agent,
                "request"
            );

            Ok(response)
        })
    }
}
