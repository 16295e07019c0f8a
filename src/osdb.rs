//! Static fingerprint database: feature value -> candidate OS labels.
//!
//! Lookups never fail; an unknown value yields an empty slice and the caller
//! falls through to the TTL range heuristic or skips the feature.

use std::collections::BTreeSet;
use std::time::Duration;

use crate::netutils::next_power_of_two;

pub type OsSet = BTreeSet<&'static str>;

/// Every label a detection session may narrow down to.
pub const ALL_OS: [&str; 12] = [
    "Linux",
    "FreeBSD",
    "Windows XP",
    "Windows 7",
    "Windows 8",
    "Windows 10",
    "Windows 11",
    "Symbian",
    "Palm OS",
    "Centos",
    "Ubuntu",
    "Debian",
];

/// Ports tried by the TCP-connect extractor, the liveness prober and the
/// default-OS heuristic, in this order.
pub const COMMON_TCP_PORTS: [u16; 13] = [
    22, 80, 443, 135, 139, 445, 1433, 1521, 3306, 3389, 6379, 7001, 8080,
];

/// Upper bound on a single ICMP or TCP round trip.
pub const MAX_RTT: Duration = Duration::from_secs(2);

/// Upper bound on the whole SMB dialogue.
pub const SMB_TIMEOUT: Duration = Duration::from_secs(5);

/// ICMP echo retransmissions before the probe gives up.
pub const RESEND_COUNT: usize = 2;

pub fn all_os_set() -> OsSet {
    ALL_OS.iter().copied().collect()
}

pub fn is_windows_label(os: &str) -> bool {
    os.to_ascii_lowercase().contains("win")
}

/// Candidates compatible with the observed Don't-Fragment flag.
pub fn df_candidates(df: bool) -> &'static [&'static str] {
    if df {
        &[
            "FreeBSD",
            "Linux",
            "Windows XP",
            "Windows 7",
            "Windows 10",
            "Windows 11",
            "Centos",
            "Ubuntu",
            "Debian",
        ]
    } else {
        &[
            "FreeBSD",
            "Symbian",
            "Palm OS",
            "Linux",
            "Windows XP",
            "Windows 7",
            "Windows 10",
            "Windows 11",
            "Centos",
            "Ubuntu",
        ]
    }
}

/// Candidates whose stacks originate packets with the given initial TTL.
/// "Cisco IOS" is kept from the upstream table even though no session can
/// end on it; intersection with [`ALL_OS`] removes it.
pub fn ttl_table(initial: u32) -> &'static [&'static str] {
    match initial {
        64 => &["Linux", "FreeBSD", "Centos", "Ubuntu"],
        128 => &["Windows XP", "Windows 7", "Windows 10", "Windows 11"],
        256 => &["Symbian", "Palm OS", "Cisco IOS", "Debian"],
        _ => &[],
    }
}

pub fn win_size_candidates(win: u32) -> &'static [&'static str] {
    match win {
        8192 => &["Symbian", "Windows 7", "Windows XP", "Windows 10", "Windows 11"],
        14600 => &["Linux"],
        16348 => &["Palm OS"],
        64240 => &["Linux", "Ubuntu", "Centos"],
        65392 => &["Windows 10", "Windows 11", "Windows XP", "Windows 7"],
        65535 => &["FreeBSD", "Windows XP", "Windows 10", "Windows 11"],
        65550 => &["FreeBSD"],
        29200 => &["Centos"],
        26883 => &["Debian"],
        0 => &[
            "Linux",
            "FreeBSD",
            "Windows XP",
            "Windows 7",
            "Windows 10",
            "Windows 11",
            "Symbian",
            "Palm OS",
            "Centos",
            "Ubuntu",
            "Debian",
        ],
        _ => &[],
    }
}

pub fn mss_candidates(mss: u16) -> &'static [&'static str] {
    match mss {
        1350 => &["Palm OS"],
        1440 => &["Windows XP", "Windows 7", "Windows 10", "Windows 11"],
        1460 => &["Linux", "FreeBSD"],
        1200 => &["Centos", "Ubuntu", "Windows 7", "Debian"],
        _ => &[],
    }
}

/// TTL analyzer: estimate the initial TTL as the next power of two and look
/// it up; fall back to coarse ranges when the estimate is not in the table.
pub fn ttl_candidates(observed: u8) -> OsSet {
    let initial = next_power_of_two(observed as u32);
    let table = ttl_table(initial);
    if !table.is_empty() {
        return table.iter().copied().collect();
    }
    ttl_range_candidates(observed)
}

/// Range fallback used when the estimated initial TTL has no table entry.
pub fn ttl_range_candidates(observed: u8) -> OsSet {
    let t = observed as u32;
    let labels: &[&str] = if t > 32 && t <= 64 {
        &["Linux", "FreeBSD", "Centos", "Ubuntu"]
    } else if t > 64 && t <= 128 {
        &["Windows XP", "Windows 7", "Windows 10"]
    } else if t > 128 && t <= 255 {
        &["Symbian", "Palm OS", "Debian"]
    } else {
        &[]
    };
    labels.iter().copied().collect()
}

/// IP-layer reduction: DF candidates intersected with TTL candidates.
pub fn ip_layer_candidates(df: bool, observed_ttl: u8) -> OsSet {
    let df_set: OsSet = df_candidates(df).iter().copied().collect();
    let ttl_set = ttl_candidates(observed_ttl);
    df_set.intersection(&ttl_set).copied().collect()
}

/// TCP-layer reduction: the window-size and MSS matches form one combined
/// candidate pool before it is intersected with the IP layer.
pub fn tcp_layer_candidates(win: u32, mss: u16) -> OsSet {
    let mut set: OsSet = win_size_candidates(win).iter().copied().collect();
    set.extend(mss_candidates(mss).iter().copied());
    set
}

/// All Windows labels, for banner-grade evidence ("Microsoft-IIS", DNS/NTP
/// response shapes) that only speaks to the family.
pub fn windows_family() -> OsSet {
    ALL_OS.iter().copied().filter(|os| is_windows_label(os)).collect()
}

/// Linux-family labels matched by HTTP server banners.
pub fn linux_family() -> OsSet {
    ["Linux", "Centos", "Ubuntu", "Debian"].into_iter().collect()
}

/// Linux family plus FreeBSD, for OpenSSH/DNS/NTP evidence.
pub fn unix_family() -> OsSet {
    let mut set = linux_family();
    set.insert("FreeBSD");
    set
}
