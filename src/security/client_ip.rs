//! Client address extraction.
//!
//! Precedence: first entry of `X-Forwarded-For`, then `X-Real-IP`, then the
//! transport peer. Unparseable candidates are skipped, not fatal.

use std::net::{IpAddr, SocketAddr};

use axum::http::HeaderMap;

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";
pub const X_REAL_IP: &str = "x-real-ip";

/// Resolve the address access control should judge.
///
/// Returns `None` when no candidate parses.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<IpAddr> {
    forwarded_for(headers)
        .or_else(|| real_ip(headers))
        .or_else(|| peer.map(|p| p.ip()))
}

fn forwarded_for(headers: &HeaderMap) -> Option<IpAddr> {
    let value = headers.get(X_FORWARDED_FOR)?.to_str().ok()?;
    value.split(',').next()?.trim().parse().ok()
}

fn real_ip(headers: &HeaderMap) -> Option<IpAddr> {
    headers.get(X_REAL_IP)?.to_str().ok()?.trim().parse().ok()
}
