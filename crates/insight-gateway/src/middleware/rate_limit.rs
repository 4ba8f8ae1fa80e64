//! Per-client rate limiting.
//!
//! Fixed-window counters keyed by client IP. Whitelisted and blacklisted
//! clients get their own limits; a limit of zero rejects every request.
//! Runs before every other stage, so a rejected request never reaches the
//! access log, the auth guard or a handler.

use crate::domain::config::RateLimitConfig;
use crate::domain::error::ApiError;
use crate::middleware::client_ip::{extract_client_ip, ClientIp};
use crate::middleware::metrics::GatewayMetrics;
use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Request, StatusCode},
    response::Response,
};
use dashmap::DashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower::{Layer, Service};
use tracing::{debug, warn};

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");

/// Limit class a client falls into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientClass {
    Normal,
    Whitelisted,
    Blacklisted,
}

/// Counter for one client
#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

/// Admission decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { limit: u32, remaining: u32 },
    Rejected { limit: u32, retry_after: Duration },
}

/// Rate limiter state shared across requests
#[derive(Debug)]
pub struct RateLimitState {
    windows: DashMap<IpAddr, Window>,
    config: RateLimitConfig,
}

impl RateLimitState {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            windows: DashMap::new(),
            config,
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    pub fn classify(&self, ip: IpAddr) -> ClientClass {
        if self.config.blacklist.contains(&ip) {
            ClientClass::Blacklisted
        } else if self.config.whitelist.contains(&ip) {
            ClientClass::Whitelisted
        } else {
            ClientClass::Normal
        }
    }

    fn limit_for(&self, class: ClientClass) -> u32 {
        match class {
            ClientClass::Normal => self.config.limit,
            ClientClass::Whitelisted => self.config.whitelist_limit,
            ClientClass::Blacklisted => self.config.blacklist_limit,
        }
    }

    /// Count a request from `ip`
    pub fn check(&self, ip: IpAddr) -> RateDecision {
        self.check_at(ip, Instant::now())
    }

    /// Count a request from `ip` as of `now`
    pub fn check_at(&self, ip: IpAddr, now: Instant) -> RateDecision {
        let limit = self.limit_for(self.classify(ip));
        let window = self.config.window;

        // The entry guard holds the shard lock for the whole read-modify-write
        let mut entry = self.windows.entry(ip).or_insert_with(|| {
            debug!(ip = %ip, "tracking new client");
            Window {
                started: now,
                count: 0,
            }
        });

        let elapsed = now.saturating_duration_since(entry.started);
        if elapsed >= window {
            entry.started = now;
            entry.count = 0;
        }

        if entry.count >= limit {
            let retry_after = window.saturating_sub(now.saturating_duration_since(entry.started));
            return RateDecision::Rejected { limit, retry_after };
        }

        entry.count += 1;
        RateDecision::Allowed {
            limit,
            remaining: limit - entry.count,
        }
    }

    /// Drop clients whose window ended more than `max_age` ago
    pub fn cleanup(&self, max_age: Duration) {
        let now = Instant::now();
        let window = self.config.window;
        self.windows.retain(|ip, w| {
            let age = now.saturating_duration_since(w.started);
            let keep = age < window + max_age;
            if !keep {
                debug!(ip = %ip, age_secs = age.as_secs(), "removing stale rate limit window");
            }
            keep
        });
    }

    /// Number of tracked clients
    pub fn client_count(&self) -> usize {
        self.windows.len()
    }
}

/// Rate limit layer
#[derive(Clone)]
pub struct RateLimitLayer {
    state: Arc<RateLimitState>,
    metrics: Arc<GatewayMetrics>,
}

impl RateLimitLayer {
    pub fn new(config: RateLimitConfig, metrics: Arc<GatewayMetrics>) -> Self {
        Self {
            state: Arc::new(RateLimitState::new(config)),
            metrics,
        }
    }

    pub fn state(&self) -> Arc<RateLimitState> {
        Arc::clone(&self.state)
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimitService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimitService {
            inner,
            state: Arc::clone(&self.state),
            metrics: Arc::clone(&self.metrics),
        }
    }
}

/// Rate limit service
#[derive(Clone)]
pub struct RateLimitService<S> {
    inner: S,
    state: Arc<RateLimitState>,
    metrics: Arc<GatewayMetrics>,
}

impl<S> Service<Request<Body>> for RateLimitService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let state = Arc::clone(&self.state);
        let metrics = Arc::clone(&self.metrics);
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let config = state.config();
            let ip = extract_client_ip(&req, &config.client_ip_header);
            req.extensions_mut().insert(ClientIp(ip));

            if !config.enabled {
                return inner.call(req).await;
            }

            match state.check(ip) {
                RateDecision::Allowed { limit, remaining } => {
                    let mut response = inner.call(req).await?;
                    set_limit_headers(&mut response, limit, remaining);
                    Ok(response)
                }
                RateDecision::Rejected { limit, retry_after } => {
                    metrics.record_rate_limit_rejection();
                    warn!(
                        ip = %ip,
                        limit,
                        retry_after_secs = retry_after.as_secs(),
                        "rate limit exceeded"
                    );
                    let status = StatusCode::from_u16(config.rejection_status)
                        .unwrap_or(StatusCode::TOO_MANY_REQUESTS);
                    Ok(rate_limit_response(status, req.uri().path(), limit, retry_after))
                }
            }
        })
    }
}

fn set_limit_headers(response: &mut Response, limit: u32, remaining: u32) {
    let headers = response.headers_mut();
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(remaining));
}

/// Rejection response; rendered here because shaping runs further in
fn rate_limit_response(status: StatusCode, path: &str, limit: u32, retry_after: Duration) -> Response {
    let mut response = ApiError::rate_limited(status).into_response_for(path);
    set_limit_headers(&mut response, limit, 0);
    // round up to whole seconds
    let retry_secs = retry_after.as_millis().div_ceil(1000) as u64;
    response
        .headers_mut()
        .insert(axum::http::header::RETRY_AFTER, HeaderValue::from(retry_secs));
    response
}

/// Background task to clean up stale rate limit windows
pub async fn cleanup_task(state: Arc<RateLimitState>, interval: Duration, max_age: Duration) {
    let mut cleanup_interval = tokio::time::interval(interval);
    cleanup_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        cleanup_interval.tick().await;
        state.cleanup(max_age);
    }
}
