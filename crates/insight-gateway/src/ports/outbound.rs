//! Outbound ports: clock and authentication callbacks.

use crate::auth::session::{Claims, SessionError};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Time source trait for testability
pub trait TimeSource: Send + Sync {
    /// Seconds since the Unix epoch
    fn now(&self) -> u64;
}

/// System time implementation
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            // Clock before Unix epoch
            .unwrap_or(0)
    }
}

/// Manually driven clock
#[derive(Debug, Default)]
pub struct ManualTimeSource {
    now: AtomicU64,
}

impl ManualTimeSource {
    pub fn new(now: u64) -> Self {
        Self {
            now: AtomicU64::new(now),
        }
    }

    pub fn set(&self, now: u64) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: u64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl TimeSource for ManualTimeSource {
    fn now(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Callbacks invoked by the authentication guard.
///
/// Called once per guarded request, before the handler runs (or before the
/// unauthorized response is produced).
pub trait AuthHooks: Send + Sync {
    fn on_valid(&self, claims: &Claims) {
        debug!(user = %claims.username, "session token accepted");
    }

    fn on_invalid(&self, error: &SessionError) {
        debug!(error = %error, "session token rejected");
    }

    fn on_absent(&self) {
        debug!("no session token presented");
    }
}

/// Hooks that only log
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingAuthHooks;

impl AuthHooks for LoggingAuthHooks {}
