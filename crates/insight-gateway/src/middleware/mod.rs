//! Request pipeline stages.
//!
//! Layer order, outermost first:
//!
//! ```text
//! CatchPanic → RateLimit → AccessLog → Compression → Cors → Shaping → Router
//!                                                                      │
//!                                     per route: Auth (protected) → Cache → Handler
//!                                     unmatched: 404 fallback
//! ```
//!
//! `OPTIONS` stops at `Cors` with 204. The auth guard and the 404 fallback
//! return [`ApiError`](crate::domain::ApiError) responses which `Shaping`
//! renders with the request path.

pub mod access_log;
pub mod auth;
pub mod cache;
pub mod client_ip;
pub mod cors;
pub mod metrics;
pub mod rate_limit;
pub mod shaping;

pub use access_log::AccessLogLayer;
pub use auth::{AuthGuard, AuthLayer};
pub use cache::{CacheLayer, CachePolicy};
pub use client_ip::{extract_client_ip, ClientIp};
pub use cors::CorsLayer;
pub use metrics::{GatewayMetrics, MetricsSnapshot};
pub use rate_limit::{RateLimitLayer, RateLimitState};
pub use shaping::{panic_response, ShapingLayer};

use crate::auth::SessionIssuer;
use crate::domain::config::GatewayConfig;
use crate::ports::AuthHooks;
use std::sync::Arc;

/// Middleware stack builder
pub struct MiddlewareStack {
    pub rate_limit: RateLimitLayer,
    pub access_log: AccessLogLayer,
    pub cors: CorsLayer,
    pub shaping: ShapingLayer,
    pub auth: AuthLayer,
    pub metrics: Arc<GatewayMetrics>,
}

impl MiddlewareStack {
    pub fn from_config(
        config: &GatewayConfig,
        issuer: Arc<SessionIssuer>,
        hooks: Arc<dyn AuthHooks>,
        metrics: Arc<GatewayMetrics>,
    ) -> Self {
        Self {
            rate_limit: RateLimitLayer::new(config.rate_limit.clone(), Arc::clone(&metrics)),
            access_log: AccessLogLayer::new(Arc::clone(&metrics)),
            cors: CorsLayer::new(&config.cors),
            shaping: ShapingLayer::new(),
            auth: AuthLayer::new(AuthGuard::new(
                issuer,
                hooks,
                Arc::clone(&metrics),
                config.auth.unauthorized_body_status,
            )),
            metrics,
        }
    }

    pub fn metrics(&self) -> Arc<GatewayMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn rate_limit_state(&self) -> Arc<RateLimitState> {
        self.rate_limit.state()
    }
}
