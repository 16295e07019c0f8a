//! SSH extractor: the version banner is the first thing the server says.

use std::net::Ipv4Addr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tracing::debug;

use crate::osdb;
use crate::probes::{helper, Observation, Probe};

pub struct SshProbe {
    pub port: u16,
}

impl Default for SshProbe {
    fn default() -> Self {
        Self { port: 22 }
    }
}

#[async_trait]
impl Probe for SshProbe {
    async fn probe(&self, target: Ipv4Addr, timeout: Duration) -> Observation {
        let Some(mut stream) = helper::connect_with_timeout(target, self.port, timeout).await
        else {
            return Observation::none();
        };

        let mut buf = [0u8; 256];
        let n = match tokio::time::timeout(timeout, stream.read(&mut buf)).await {
            Ok(Ok(n)) if n > 0 => n,
            _ => return Observation::none(),
        };

        let banner = String::from_utf8_lossy(&buf[..n]).to_string();
        debug!(banner = banner.trim(), "ssh banner");

        if banner.contains("OpenSSH") {
            Observation::candidates(osdb::unix_family())
        } else {
            Observation::none()
        }
    }

    fn name(&self) -> &'static str {
        "ssh"
    }
}
