//! Detection session: drives the probes in a fixed order, folds each
//! observation into the running candidate set, accumulates weights, and
//! picks the winner.

use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use tracing::{debug, info};

use crate::netutils::{format_os_set, intersect};
use crate::osdb::{self, OsSet, ALL_OS, COMMON_TCP_PORTS, MAX_RTT, SMB_TIMEOUT};
use crate::probes::{
    helper, icmp, DnsProbe, HttpProbe, IcmpProbe, NtpProbe, Observation, Probe, SmbProbe,
    SshProbe, StackProbe, TcpConnectProbe,
};

pub struct Detector {
    last_checked_port: Option<u16>,
    weights: BTreeMap<&'static str, u32>,
    ports: Vec<u16>,
}

impl Default for Detector {
    fn default() -> Self {
        Self::new()
    }
}

impl Detector {
    pub fn new() -> Self {
        Self::with_ports(COMMON_TCP_PORTS.to_vec())
    }

    /// Session over a custom port list, so tests can aim the liveness
    /// fallback and the TCP walk at local listeners.
    pub fn with_ports(ports: Vec<u16>) -> Self {
        Self {
            last_checked_port: None,
            weights: zeroed_weights(),
            ports,
        }
    }

    pub fn last_checked_port(&self) -> Option<u16> {
        self.last_checked_port
    }

    pub fn weights(&self) -> &BTreeMap<&'static str, u32> {
        &self.weights
    }

    /// Is the host there at all, and did it answer ICMP? Returns
    /// `(alive, icmp_succeeded)`.
    pub async fn survival_detect(&self, target: Ipv4Addr) -> (bool, bool) {
        match icmp::send_echo(target, MAX_RTT, 1).await {
            Ok(_) => {
                info!("target answered the ICMP echo, host is up");
                (true, true)
            }
            Err(e) => {
                debug!("no ICMP echo reply: {e}");
                for &port in &self.ports {
                    if helper::connect_with_timeout(target, port, MAX_RTT)
                        .await
                        .is_some()
                    {
                        info!(port, "open TCP port confirms the host is up");
                        return (true, false);
                    }
                }
                (false, false)
            }
        }
    }

    /// Run the full probe sequence and return the best-guess OS label.
    /// `icmp_ok` is the liveness prober's verdict on ICMP reachability;
    /// without it the ICMP extractor is skipped outright.
    pub async fn detect_os(&mut self, target: Ipv4Addr, icmp_ok: bool) -> String {
        let mut set = osdb::all_os_set();
        self.last_checked_port = None;
        self.weights = zeroed_weights();

        if icmp_ok {
            info!("narrowing OS options with ICMP");
            let obs = IcmpProbe.probe(target, MAX_RTT).await;
            self.apply(&mut set, &obs, "icmp");
            info!("candidates after ICMP: {}", format_os_set(&set));
        }

        info!("narrowing OS options with TCP connects");
        let tcp_probe = TcpConnectProbe {
            ports: self.ports.clone(),
        };
        let tcp_obs = tcp_probe.probe(target, MAX_RTT).await;
        if let Some(port) = tcp_obs.open_port {
            self.last_checked_port = Some(port);
        }
        if !tcp_obs.is_empty() {
            // ICMP discriminates finer than port identity; once it has cut
            // the set down to two or fewer, TCP may only add weight.
            if !icmp_ok || set.len() > 2 {
                set = intersect(&set, &tcp_obs.candidates);
            }
            self.add_weights(&tcp_obs.weights);
            info!("candidates after TCP: {}", format_os_set(&set));
        }
        let windows_seen = set.iter().any(|os| osdb::is_windows_label(os));

        info!("checking SMB for an NTLMSSP version");
        let obs = SmbProbe::default().probe(target, SMB_TIMEOUT).await;
        self.apply(&mut set, &obs, "smb");

        let obs = StackProbe::default().probe(target, MAX_RTT).await;
        self.apply(&mut set, &obs, "tcp-stack");

        let obs = HttpProbe::default().probe(target, MAX_RTT).await;
        self.apply(&mut set, &obs, "http");

        let obs = SshProbe::default().probe(target, MAX_RTT).await;
        self.apply(&mut set, &obs, "ssh");

        let obs = DnsProbe::default().probe(target, MAX_RTT).await;
        self.apply(&mut set, &obs, "dns");

        let obs = NtpProbe::default().probe(target, MAX_RTT).await;
        self.apply(&mut set, &obs, "ntp");

        let label = match select_os(&set, &self.weights, self.last_checked_port, windows_seen) {
            Some(label) => label,
            None => {
                info!("candidate set is empty, falling back to port identity");
                default_os(target, &self.ports).await.to_string()
            }
        };

        info!(
            "final OS selection: {label} (weight {})",
            self.weights.get(label.as_str()).copied().unwrap_or(0)
        );
        label
    }

    /// Fold one observation into the running set. An empty observation
    /// carries no information and leaves the set untouched; an
    /// authoritative one replaces it.
    fn apply(&mut self, set: &mut OsSet, obs: &Observation, probe: &str) {
        if obs.is_empty() {
            debug!(probe, "no information, keeping current candidates");
            return;
        }
        if obs.replace {
            *set = obs.candidates.clone();
        } else {
            *set = intersect(set, &obs.candidates);
        }
        self.add_weights(&obs.weights);
        debug!(probe, "candidates now: {}", format_os_set(set));
    }

    fn add_weights(&mut self, deltas: &[(&'static str, u32)]) {
        for &(os, delta) in deltas {
            *self.weights.entry(os).or_insert(0) += delta;
        }
    }
}

fn zeroed_weights() -> BTreeMap<&'static str, u32> {
    ALL_OS.iter().map(|os| (*os, 0)).collect()
}

/// Pick the winner from the surviving candidates.
///
/// A singleton set decides by itself. Otherwise the weights decide, with a
/// freshness bonus for the current Windows releases; candidates are visited
/// in [`ALL_OS`] declaration order so ties resolve deterministically. When
/// no candidate scored at all, the open-port identity gets the last word.
/// An empty set yields `None` and the caller falls back to [`default_os`].
pub fn select_os(
    set: &OsSet,
    weights: &BTreeMap<&'static str, u32>,
    last_port: Option<u16>,
    windows_seen: bool,
) -> Option<String> {
    if set.is_empty() {
        return None;
    }
    if set.len() == 1 {
        return set.iter().next().map(|os| os.to_string());
    }

    let mut best: Option<&'static str> = None;
    let mut best_score: i64 = -1;
    for os in ALL_OS {
        if !set.contains(os) {
            continue;
        }
        let mut score = weights.get(os).copied().unwrap_or(0) as i64;
        score += match os {
            "Windows 11" => 3,
            "Windows 10" => 2,
            _ => 0,
        };
        if score > best_score {
            best_score = score;
            best = Some(os);
        }
    }

    if best_score <= 0 {
        let label = match last_port {
            Some(135) | Some(139) | Some(445) => "Windows",
            _ if windows_seen => "Windows",
            _ => "Linux",
        };
        return Some(label.to_string());
    }

    best.map(|os| os.to_string())
}

/// Last-resort heuristic when every probe came back empty: walk the ports
/// once more and read the OS off the first telltale one that opens.
pub async fn default_os(target: Ipv4Addr, ports: &[u16]) -> &'static str {
    for &port in ports {
        if helper::connect_with_timeout(target, port, MAX_RTT)
            .await
            .is_some()
        {
            match port {
                22 => return "Linux",
                445 | 3389 => return "Windows",
                _ => {}
            }
        }
    }
    "Unknown"
}
