//! Forwarding header interpretation.
//!
//! # Responsibilities
//! - Derive the client address used as the admission-control key
//!
//! # Design Decisions
//! - Only the last `trusted_hops` entries of `X-Forwarded-For` are trusted;
//!   anything further left was written by the client and can be forged
//! - With one trusted hop the client is the entry appended by that proxy
//!   (the rightmost one)
//! - Without forwarding headers the socket peer is the client

use std::net::{IpAddr, SocketAddr};

use axum::http::HeaderMap;

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Resolve the client identity for a request.
///
/// Walks the address chain from the socket peer outward (`peer`, then the
/// `X-Forwarded-For` entries right to left) and stops after `trusted_hops`
/// trusted addresses, or at the last known one.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>, trusted_hops: usize) -> Option<String> {
    // Repeated headers concatenate left to right, oldest hop first.
    let forwarded: Vec<String> = headers
        .get_all(X_FORWARDED_FOR)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(normalize)
        .collect();

    let chain: Vec<String> = peer
        .map(|peer| peer.ip().to_string())
        .into_iter()
        .chain(forwarded.into_iter().rev())
        .collect();

    if chain.is_empty() {
        return None;
    }

    // Without a peer the first forwarded entry stands in for the nearest hop.
    let index = if peer.is_some() { trusted_hops } else { trusted_hops.saturating_sub(1) };
    chain.get(index.min(chain.len() - 1)).cloned()
}

fn normalize(entry: &str) -> String {
    if let Ok(ip) = entry.parse::<IpAddr>() {
        return ip.to_string();
    }
    if let Ok(addr) = entry.parse::<SocketAddr>() {
        return addr.ip().to_string();
    }
    entry.to_string()
}
