//! HTTP extractor: one plain GET, then only the `Server:` header matters.

use std::net::Ipv4Addr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::debug;

use crate::osdb;
use crate::probes::{helper, Observation, Probe};

pub struct HttpProbe {
    pub port: u16,
}

impl Default for HttpProbe {
    fn default() -> Self {
        Self { port: 80 }
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn probe(&self, target: Ipv4Addr, timeout: Duration) -> Observation {
        let Some(mut stream) = helper::connect_with_timeout(target, self.port, timeout).await
        else {
            return Observation::none();
        };

        let request = format!("GET / HTTP/1.1\r\nHost: {target}\r\n\r\n");
        if tokio::time::timeout(timeout, stream.write_all(request.as_bytes()))
            .await
            .is_err()
        {
            return Observation::none();
        }

        let mut buf = [0u8; 1024];
        let n = match tokio::time::timeout(timeout, stream.read(&mut buf)).await {
            Ok(Ok(n)) if n > 0 => n,
            _ => return Observation::none(),
        };

        let response = String::from_utf8_lossy(&buf[..n]).to_string();
        let Some(server) = server_header(&response) else {
            return Observation::none();
        };
        debug!(server, "http Server header");

        if server.contains("Apache") || server.contains("nginx") {
            Observation::candidates(osdb::linux_family())
        } else if server.contains("Microsoft-IIS") {
            Observation::candidates(osdb::windows_family())
        } else {
            Observation::none()
        }
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

fn server_header(response: &str) -> Option<&str> {
    response
        .lines()
        .find_map(|line| line.strip_prefix("Server:"))
        .map(str::trim)
}
