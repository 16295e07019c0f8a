//! DNS extractor: a bare 12-byte header probe. Whether the resolver echoes
//! a response with the QR bit set is a weak family tell.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tracing::debug;

use crate::osdb;
use crate::probes::{Observation, Probe};

pub struct DnsProbe {
    pub port: u16,
}

impl Default for DnsProbe {
    fn default() -> Self {
        Self { port: 53 }
    }
}

#[async_trait]
impl Probe for DnsProbe {
    async fn probe(&self, target: Ipv4Addr, timeout: Duration) -> Observation {
        let Ok(socket) = UdpSocket::bind("0.0.0.0:0").await else {
            return Observation::none();
        };
        let addr = SocketAddr::from((target, self.port));
        if socket.connect(addr).await.is_err() {
            return Observation::none();
        }

        // header only: ID 0x1234, one question claimed, nothing attached
        let query: [u8; 12] = [
            0x12, 0x34, 0x01, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        ];
        if socket.send(&query).await.is_err() {
            return Observation::none();
        }

        let mut buf = [0u8; 512];
        let n = match tokio::time::timeout(timeout, socket.recv(&mut buf)).await {
            Ok(Ok(n)) if n >= 3 => n,
            _ => return Observation::none(),
        };

        let qr = buf[2] & 0x80 != 0;
        debug!(len = n, qr, "dns response");
        if qr {
            Observation::candidates(osdb::windows_family())
        } else {
            Observation::candidates(osdb::unix_family())
        }
    }

    fn name(&self) -> &'static str {
        "dns"
    }
}
