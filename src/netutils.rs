use std::net::Ipv4Addr;

use crate::osdb::OsSet;

/// Smallest power of two >= `n`; 1 for `n == 0`. Used to recover the
/// initial TTL a peer stack most likely started from.
pub fn next_power_of_two(n: u32) -> u32 {
    if n == 0 {
        1
    } else {
        n.next_power_of_two()
    }
}

/// RFC 1918 private space or loopback.
pub fn is_local_ip(ip: Ipv4Addr) -> bool {
    let [a, b, _, _] = ip.octets();
    match a {
        10 | 127 => true,
        172 => (16..=31).contains(&b),
        192 => b == 168,
        _ => false,
    }
}

pub fn intersect(a: &OsSet, b: &OsSet) -> OsSet {
    a.intersection(b).copied().collect()
}

pub fn format_os_set(set: &OsSet) -> String {
    set.iter().copied().collect::<Vec<_>>().join(", ")
}
