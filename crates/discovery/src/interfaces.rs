use std::net::{IpAddr, Ipv4Addr};

use crate::DiscoveryError;
use crate::rank::{classify, score};

/// Returns local IPv4 addresses in interface order.
///
/// Skips loopback (127.0.0.0/8) and the benchmarking range 198.18.0.0/15,
/// which VPN and proxy TUN adapters commonly claim. Duplicates are dropped,
/// keeping the first occurrence.
pub fn local_ipv4_addrs() -> Result<Vec<Ipv4Addr>, DiscoveryError> {
    let interfaces = if_addrs::get_if_addrs()?;

    let mut ips = Vec::new();
    for iface in interfaces {
        if iface.is_loopback() {
            continue;
        }
        let IpAddr::V4(ipv4) = iface.ip() else {
            continue;
        };
        tracing::trace!(
            iface = %iface.name,
            %ipv4,
            class = %classify(ipv4),
            score = score(ipv4),
            "found interface address"
        );
        if is_usable(ipv4) && !ips.contains(&ipv4) {
            ips.push(ipv4);
        }
    }

    Ok(ips)
}

/// Returns `false` for addresses that are never useful to share.
pub(crate) fn is_usable(ip: Ipv4Addr) -> bool {
    let [a, b, ..] = ip.octets();
    if ip.is_loopback() || ip.is_unspecified() {
        return false;
    }
    // 198.18.0.0/15
    if a == 198 && (b == 18 || b == 19) {
        return false;
    }
    true
}
