// Allow missing docs for internal items in development
#![allow(missing_docs)]

//! Insight Gateway - authenticated REST front for a bitcoin full node.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                          INSIGHT GATEWAY                             │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │  HTTP :3001                                                          │
//! │    CatchPanic → RateLimit → AccessLog → Compression → Cors → Shaping │
//! │                                   │                                  │
//! │                    route table (Auth? → Cache → handler)             │
//! │                                   │                                  │
//! │        ┌──────────────────────────┼───────────────────────┐          │
//! │        ▼                          ▼                       ▼          │
//! │  NodeRpc (JSON-RPC)      CredentialStore +        PhoneDirectory     │
//! │                          SessionIssuer                               │
//! │                                                                      │
//! │  NodeEvent channel → NodeEventListener → EventFanOut → subscribers   │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use insight_gateway::{Collaborators, GatewayConfig, GatewayService};
//!
//! let config = GatewayConfig::from_env()?;
//! let service = GatewayService::new(config.clone(), Collaborators::from_config(&config))?;
//! let listener = service.bind().await?;
//! service.serve(listener, shutdown_signal()).await?;
//! ```

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod auth;
pub mod domain;
pub mod events;
pub mod handlers;
pub mod middleware;
pub mod ports;
pub mod router;
pub mod rpc;
pub mod service;

// Re-exports for public API
pub use auth::{CredentialStore, InMemoryCredentialStore, SessionIssuer};
pub use domain::config::GatewayConfig;
pub use domain::error::{ApiError, ApiResult, GatewayError};
pub use events::{EventFanOut, NodeEvent, NodeEventListener, NodePoller, Subscriber};
pub use middleware::GatewayMetrics;
pub use router::build_router;
pub use rpc::{HttpNodeRpc, NodeRpc, RpcError};
pub use service::{Collaborators, GatewayService};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
