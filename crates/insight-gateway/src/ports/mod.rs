//! Ports for the gateway.

pub mod outbound;

pub use outbound::{AuthHooks, LoggingAuthHooks, ManualTimeSource, SystemTimeSource, TimeSource};
