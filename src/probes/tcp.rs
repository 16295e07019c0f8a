//! TCP-connect extractor. Finds the first reachable common port and infers
//! stack features from the port's identity: a plain `connect()` exposes
//! neither the SYN-ACK's TTL nor its options, so the values fed to the
//! database are the typical ones for the service that answered. A future
//! version may substitute real SYN-probe capture via the raw-socket path.

use std::net::Ipv4Addr;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::netutils::intersect;
use crate::osdb::{self, COMMON_TCP_PORTS};
use crate::probes::{helper, Observation, Probe};

/// Stack features synthesized from the identity of an open port.
#[derive(Debug, Clone, Copy)]
struct PortFeatures {
    ttl: u8,
    df: bool,
    win: u32,
    mss: u16,
}

pub struct TcpConnectProbe {
    pub ports: Vec<u16>,
}

impl Default for TcpConnectProbe {
    fn default() -> Self {
        Self {
            ports: COMMON_TCP_PORTS.to_vec(),
        }
    }
}

#[async_trait]
impl Probe for TcpConnectProbe {
    async fn probe(&self, target: Ipv4Addr, timeout: Duration) -> Observation {
        let mut open_port = None;
        for &port in &self.ports {
            if let Some(stream) = helper::connect_with_timeout(target, port, timeout).await {
                drop(stream);
                open_port = Some(port);
                break;
            }
        }
        let Some(port) = open_port else {
            info!("no open TCP port found; cannot narrow the OS options");
            return Observation::none();
        };

        let feats = synthesize_features(port);
        info!(
            port,
            ttl = feats.ttl,
            df = feats.df,
            win = feats.win,
            mss = feats.mss,
            "open port found"
        );

        let ip_set = osdb::ip_layer_candidates(feats.df, feats.ttl);
        let tcp_set = osdb::tcp_layer_candidates(feats.win, feats.mss);
        let candidates = intersect(&ip_set, &tcp_set);

        let mut weights: Vec<(&'static str, u32)> =
            candidates.iter().map(|os| (*os, 3)).collect();
        weights.extend_from_slice(port_bonus(port));

        Observation {
            candidates,
            weights,
            replace: false,
            open_port: Some(port),
        }
    }

    fn name(&self) -> &'static str {
        "tcp-connect"
    }
}

fn synthesize_features(port: u16) -> PortFeatures {
    match port {
        135 | 139 | 445 | 3389 => {
            debug!(port, "Windows service port open");
            PortFeatures {
                ttl: 128,
                df: true,
                win: 8192,
                mss: 1440,
            }
        }
        22 | 3306 => {
            debug!(port, "Unix service port open");
            PortFeatures {
                ttl: 64,
                df: true,
                win: 65535,
                mss: 1460,
            }
        }
        _ => PortFeatures {
            ttl: 64,
            df: true,
            win: 65535,
            mss: 1460,
        },
    }
}

/// Port-identity weight bonuses. RDP and SMB skew hard toward the current
/// Windows releases; SSH and MySQL toward the Linux family.
fn port_bonus(port: u16) -> &'static [(&'static str, u32)] {
    match port {
        3389 => &[
            ("Windows 11", 5),
            ("Windows 10", 4),
            ("Windows 7", 2),
            ("Windows XP", 1),
        ],
        445 | 135 => &[
            ("Windows 11", 4),
            ("Windows 10", 3),
            ("Windows 7", 2),
            ("Windows XP", 1),
        ],
        139 => &[
            ("Windows 11", 3),
            ("Windows 10", 2),
            ("Windows 7", 2),
            ("Windows XP", 1),
        ],
        22 | 3306 => &[
            ("Linux", 2),
            ("FreeBSD", 1),
            ("Centos", 2),
            ("Ubuntu", 2),
            ("Debian", 2),
        ],
        _ => &[],
    }
}
