use std::fmt::Write;
use std::net::Ipv4Addr;

use fast_share_server::SharedFile;

/// Hosts to advertise for a listener bound to `bind`.
///
/// A wildcard bind is reachable on every interface, so the ranked interface
/// addresses are used; a specific bind is only reachable on itself.
pub fn share_hosts(bind: Ipv4Addr) -> Vec<Ipv4Addr> {
    if bind.is_unspecified() {
        fast_share_discovery::ranked_addresses()
    } else {
        vec![bind]
    }
}

/// Text printed once the server is listening.
pub fn banner(file: &SharedFile, port: u16, hosts: &[Ipv4Addr], auto_close: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Sharing {} at the following URLs:\n", file.name());
    for host in hosts {
        let _ = writeln!(out, "{}", file.url((*host).into(), port));
    }
    if auto_close {
        let _ = writeln!(out, "\nServer will automatically exit after first download.");
    }
    let _ = write!(out, "\nPress Ctrl+C to stop sharing.");
    out
}
