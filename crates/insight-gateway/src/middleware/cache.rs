//! Cache policy.
//!
//! Annotates successful responses of cacheable routes with
//! `Cache-Control: public, max-age=<n>`. Nothing is stored; caching is left to
//! whatever sits in front of the gateway.

use crate::domain::config::CacheConfig;
use crate::domain::routes::CachePreset;
use axum::{
    body::Body,
    http::{header, HeaderValue, Request},
    response::Response,
};
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// Resolved cache directive for one route
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    max_age: Option<u64>,
}

impl CachePolicy {
    pub fn new(config: &CacheConfig, preset: CachePreset) -> Self {
        let max_age = match (config.enabled, preset) {
            (false, _) | (_, CachePreset::None) => None,
            (true, CachePreset::Short) => Some(config.short_seconds),
            (true, CachePreset::Long) => Some(config.long_seconds),
        };
        Self { max_age }
    }

    pub fn max_age(&self) -> Option<u64> {
        self.max_age
    }

    pub fn header_value(&self) -> Option<HeaderValue> {
        self.max_age
            .and_then(|secs| HeaderValue::from_str(&format!("public, max-age={secs}")).ok())
    }
}

/// Cache policy layer
#[derive(Debug, Clone, Copy)]
pub struct CacheLayer {
    policy: CachePolicy,
}

impl CacheLayer {
    pub fn new(policy: CachePolicy) -> Self {
        Self { policy }
    }
}

impl<S> Layer<S> for CacheLayer {
    type Service = CacheService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CacheService {
            inner,
            policy: self.policy,
        }
    }
}

/// Cache policy service
#[derive(Clone)]
pub struct CacheService<S> {
    inner: S,
    policy: CachePolicy,
}

impl<S> Service<Request<Body>> for CacheService<S>
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
        let directive = self.policy.header_value();

        Box::pin(async move {
            let mut response = inner.call(req).await?;
            if let Some(value) = directive {
                if response.status().is_success() {
                    response.headers_mut().insert(header::CACHE_CONTROL, value);
                }
            }
            Ok(response)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use tower::{service_fn, ServiceExt};

    fn enabled() -> CacheConfig {
        CacheConfig {
            enabled: true,
            short_seconds: 30,
            long_seconds: 86400,
        }
    }

    #[test]
    fn test_presets() {
        assert_eq!(CachePolicy::new(&enabled(), CachePreset::Short).max_age(), Some(30));
        assert_eq!(CachePolicy::new(&enabled(), CachePreset::Long).max_age(), Some(86400));
        assert_eq!(CachePolicy::new(&enabled(), CachePreset::None).max_age(), None);

        let disabled = CacheConfig {
            enabled: false,
            ..enabled()
        };
        assert_eq!(CachePolicy::new(&disabled, CachePreset::Long).max_age(), None);
    }

    #[tokio::test]
    async fn test_header_added() {
        let svc = CacheLayer::new(CachePolicy::new(&enabled(), CachePreset::Long)).layer(
            service_fn(|_req: Request<Body>| async {
                Ok::<_, Infallible>(Response::new(Body::empty()))
            }),
        );
        let response = svc
            .oneshot(Request::builder().body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.headers()["cache-control"], "public, max-age=86400");
    }
}
