use std::fmt;
use std::net::Ipv4Addr;

/// Penalty for addresses that look like a gateway (`x.x.x.1`, `x.x.x.254`).
///
/// Kept smaller than the gap between adjacent classes so a gateway-looking
/// address never drops below the next class down.
const GATEWAY_PENALTY: i32 = 50;

/// Coarse classification of an IPv4 address for sharing purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressClass {
    /// 10.0.0.0/8
    Private10,
    /// 192.168.0.0/16
    Private192,
    /// 172.16.0.0/12
    Private172,
    /// 172.x outside the private block.
    Public172,
    /// 169.254.0.0/16 (APIPA).
    LinkLocal,
    Other,
}

impl AddressClass {
    /// Base score before the gateway penalty.
    fn base_score(self) -> i32 {
        match self {
            AddressClass::Private10 => 400,
            AddressClass::Private192 => 300,
            AddressClass::Private172 => 200,
            AddressClass::Other => 100,
            AddressClass::Public172 => 0,
            AddressClass::LinkLocal => -100,
        }
    }
}

impl fmt::Display for AddressClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressClass::Private10 => write!(f, "private-10"),
            AddressClass::Private192 => write!(f, "private-192"),
            AddressClass::Private172 => write!(f, "private-172"),
            AddressClass::Public172 => write!(f, "public-172"),
            AddressClass::LinkLocal => write!(f, "link-local"),
            AddressClass::Other => write!(f, "other"),
        }
    }
}

/// Classifies an address by its leading octets.
pub fn classify(ip: Ipv4Addr) -> AddressClass {
    match ip.octets() {
        [10, ..] => AddressClass::Private10,
        [192, 168, ..] => AddressClass::Private192,
        [172, 16..=31, ..] => AddressClass::Private172,
        [172, ..] => AddressClass::Public172,
        [169, 254, ..] => AddressClass::LinkLocal,
        _ => AddressClass::Other,
    }
}

/// Scores an address; higher means more likely to be reachable by a peer.
pub fn score(ip: Ipv4Addr) -> i32 {
    let mut score = classify(ip).base_score();
    if matches!(ip.octets()[3], 1 | 254) {
        score -= GATEWAY_PENALTY;
    }
    score
}

/// Orders addresses by score, highest first.
///
/// The sort is stable, so equally scored addresses keep discovery order.
pub fn rank(addrs: impl IntoIterator<Item = Ipv4Addr>) -> Vec<Ipv4Addr> {
    let mut ranked: Vec<Ipv4Addr> = addrs.into_iter().collect();
    ranked.sort_by_key(|ip| std::cmp::Reverse(score(*ip)));
    ranked
}
