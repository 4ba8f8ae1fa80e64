//! Upstream collaborators: the node's RPC interface and the phone directory.

pub mod bridge;
pub mod phone;

pub use bridge::{HttpNodeRpc, NodeRpc, RpcError};
pub use phone::{HttpPhoneDirectory, PhoneDirectory};
