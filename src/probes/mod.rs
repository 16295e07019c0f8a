pub mod dns;
pub mod helper;
pub mod http;
pub mod icmp;
pub mod ntp;
pub mod smb;
pub mod ssh;
pub mod stack;
pub mod tcp;

use std::net::Ipv4Addr;
use std::time::Duration;

use async_trait::async_trait;

use crate::osdb::OsSet;

pub use dns::DnsProbe;
pub use http::HttpProbe;
pub use icmp::IcmpProbe;
pub use ntp::NtpProbe;
pub use smb::SmbProbe;
pub use ssh::SshProbe;
pub use stack::StackProbe;
pub use tcp::TcpConnectProbe;

/// What a single probe learned about the target.
///
/// An empty candidate set means "no information": the session keeps its
/// running set unchanged. `replace` marks authoritative evidence (NTLMSSP
/// version) that overrides the running set instead of intersecting it.
#[derive(Debug, Clone, Default)]
pub struct Observation {
    pub candidates: OsSet,
    pub weights: Vec<(&'static str, u32)>,
    pub replace: bool,
    pub open_port: Option<u16>,
}

impl Observation {
    /// The probe failed or saw nothing it recognizes.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn candidates(candidates: OsSet) -> Self {
        Self {
            candidates,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

/// A per-protocol feature extractor. Implementations fail closed: network
/// errors, timeouts and unrecognized responses all come back as
/// [`Observation::none`], never as an `Err` the session would have to
/// handle.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn probe(&self, target: Ipv4Addr, timeout: Duration) -> Observation;
    fn name(&self) -> &'static str;
}
