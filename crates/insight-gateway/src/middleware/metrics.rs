//! Gateway counters.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide counters
#[derive(Debug, Default)]
pub struct GatewayMetrics {
    // HTTP
    pub requests_total: AtomicU64,
    pub requests_error: AtomicU64,
    pub rate_limit_rejected: AtomicU64,
    pub unauthorized: AtomicU64,

    // Fan-out
    pub events_published: AtomicU64,
    pub deliveries: AtomicU64,
    pub delivery_failures: AtomicU64,

    // Latency (sum, for averaging)
    pub total_latency_ms: AtomicU64,
}

impl GatewayMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed request
    pub fn record_request(&self, status: u16, latency_ms: u64) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        if status >= 400 {
            self.requests_error.fetch_add(1, Ordering::Relaxed);
        }
        self.total_latency_ms.fetch_add(latency_ms, Ordering::Relaxed);
    }

    pub fn record_rate_limit_rejection(&self) {
        self.rate_limit_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unauthorized(&self) {
        self.unauthorized.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one publish and its per-subscriber outcomes
    pub fn record_event(&self, delivered: u64, failed: u64) {
        self.events_published.fetch_add(1, Ordering::Relaxed);
        self.deliveries.fetch_add(delivered, Ordering::Relaxed);
        self.delivery_failures.fetch_add(failed, Ordering::Relaxed);
    }

    pub fn average_latency_ms(&self) -> f64 {
        let total = self.requests_total.load(Ordering::Relaxed);
        if total == 0 {
            return 0.0;
        }
        self.total_latency_ms.load(Ordering::Relaxed) as f64 / total as f64
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_total: self.requests_total.load(Ordering::Relaxed),
            requests_error: self.requests_error.load(Ordering::Relaxed),
            rate_limit_rejected: self.rate_limit_rejected.load(Ordering::Relaxed),
            unauthorized: self.unauthorized.load(Ordering::Relaxed),
            events_published: self.events_published.load(Ordering::Relaxed),
            deliveries: self.deliveries.load(Ordering::Relaxed),
            delivery_failures: self.delivery_failures.load(Ordering::Relaxed),
            average_latency_ms: self.average_latency_ms(),
        }
    }
}

/// Point-in-time copy of [`GatewayMetrics`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub requests_total: u64,
    pub requests_error: u64,
    pub rate_limit_rejected: u64,
    pub unauthorized: u64,
    pub events_published: u64,
    pub deliveries: u64,
    pub delivery_failures: u64,
    pub average_latency_ms: f64,
}
