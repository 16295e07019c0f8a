//! TCP-stack extractor. A connected socket exposes none of the SYN-ACK's
//! header fields, so this probe can only confirm reachability and report
//! no information. Genuine SYN-probe analysis needs the raw-socket path.

use std::net::Ipv4Addr;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::probes::{helper, Observation, Probe};

pub struct StackProbe {
    pub port: u16,
}

impl Default for StackProbe {
    fn default() -> Self {
        Self { port: 80 }
    }
}

#[async_trait]
impl Probe for StackProbe {
    async fn probe(&self, target: Ipv4Addr, timeout: Duration) -> Observation {
        if helper::connect_with_timeout(target, self.port, timeout)
            .await
            .is_some()
        {
            debug!(
                port = self.port,
                "stack probe connected; header capture unavailable over a connected socket"
            );
        }
        Observation::none()
    }

    fn name(&self) -> &'static str {
        "tcp-stack"
    }
}
