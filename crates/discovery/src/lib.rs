//! Local address discovery for fast-share.
//!
//! Enumerates the host's IPv4 interface addresses and ranks them by how
//! likely a peer on the same network can reach them, so the first entry is
//! the best URL to hand to a human.

pub mod interfaces;
pub mod rank;

use std::net::Ipv4Addr;

pub use interfaces::local_ipv4_addrs;
pub use rank::{AddressClass, classify, rank, score};

/// Errors for discovery operations.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("failed to list network interfaces: {0}")]
    Interfaces(#[from] std::io::Error),
}

/// Returns local IPv4 addresses, best first.
///
/// Never fails: enumeration errors are logged and treated as "no addresses",
/// and an empty result falls back to `127.0.0.1`.
pub fn ranked_addresses() -> Vec<Ipv4Addr> {
    let found = local_ipv4_addrs().unwrap_or_else(|e| {
        tracing::warn!("error fetching IP addresses: {e}");
        Vec::new()
    });
    with_loopback_fallback(rank(found))
}

fn with_loopback_fallback(mut ranked: Vec<Ipv4Addr>) -> Vec<Ipv4Addr> {
    if ranked.is_empty() {
        tracing::debug!("no usable interface addresses, falling back to loopback");
        ranked.push(Ipv4Addr::LOCALHOST);
    }
    ranked
}
