//! Domain types for the gateway.
//!
//! Configuration, errors, the route table, chain primitives.

pub mod config;
pub mod error;
pub mod ids;
pub mod network;
pub mod routes;
pub mod transaction;

pub use config::{GatewayConfig, LimitsConfig};
pub use error::{ApiError, ApiResult, ErrorEnvelope, GatewayError};
pub use ids::UserId;
pub use network::Network;
pub use routes::{Access, CachePreset, Endpoint, HttpMethod, RouteSpec, ROUTE_TABLE};
pub use transaction::{DecodeError, InvTransaction, RawTransaction};
