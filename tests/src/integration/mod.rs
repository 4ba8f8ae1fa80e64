//! Cross-module flows.

pub mod events;
pub mod flows;
