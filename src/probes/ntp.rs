//! NTP extractor: a client-mode packet; a mode-4 (server) answer is the
//! expected shape from a Windows time service.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tracing::debug;

use crate::osdb;
use crate::probes::{Observation, Probe};

pub struct NtpProbe {
    pub port: u16,
}

impl Default for NtpProbe {
    fn default() -> Self {
        Self { port: 123 }
    }
}

#[async_trait]
impl Probe for NtpProbe {
    async fn probe(&self, target: Ipv4Addr, timeout: Duration) -> Observation {
        let Ok(socket) = UdpSocket::bind("0.0.0.0:0").await else {
            return Observation::none();
        };
        let addr = SocketAddr::from((target, self.port));
        if socket.connect(addr).await.is_err() {
            return Observation::none();
        }

        let mut request = [0u8; 48];
        request[0] = 0x1b; // LI=0, VN=3, Mode=3 (client)
        if socket.send(&request).await.is_err() {
            return Observation::none();
        }

        let mut buf = [0u8; 512];
        let n = match tokio::time::timeout(timeout, socket.recv(&mut buf)).await {
            Ok(Ok(n)) if n > 0 => n,
            _ => return Observation::none(),
        };

        let mode = buf[0] & 0x07;
        debug!(len = n, mode, "ntp response");
        if mode == 4 {
            Observation::candidates(osdb::windows_family())
        } else {
            Observation::candidates(osdb::unix_family())
        }
    }

    fn name(&self) -> &'static str {
        "ntp"
    }
}
