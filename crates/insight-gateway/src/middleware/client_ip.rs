//! Client identity resolution.

use axum::{extract::ConnectInfo, http::Request};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Resolved client address, attached to request extensions by the rate limiter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientIp(pub IpAddr);

/// Resolve the client address: trusted proxy header first (leftmost entry),
/// then the transport peer, then loopback for in-process callers.
pub fn extract_client_ip<B>(req: &Request<B>, trusted_header: &str) -> IpAddr {
    if let Some(ClientIp(ip)) = req.extensions().get::<ClientIp>() {
        return *ip;
    }

    if !trusted_header.is_empty() {
        let forwarded = req
            .headers()
            .get(trusted_header)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|v| v.trim().parse::<IpAddr>().ok());
        if let Some(ip) = forwarded {
            return ip;
        }
    }

    if let Some(connect_info) = req.extensions().get::<ConnectInfo<SocketAddr>>() {
        return connect_info.0.ip();
    }

    IpAddr::V4(Ipv4Addr::LOCALHOST)
}
