//! ICMP echo extractor. Sends an Echo Request over a pnet layer-3 raw
//! socket and reads TTL and the DF flag straight from the reply's IPv4
//! header. Requires CAP_NET_RAW / root; without it the probe reports a
//! privilege error and the session runs without ICMP.

use std::net::{IpAddr, Ipv4Addr};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use pnet::packet::icmp::echo_reply::EchoReplyPacket;
use pnet::packet::icmp::echo_request::MutableEchoRequestPacket;
use pnet::packet::icmp::{self, IcmpCode, IcmpPacket, IcmpTypes, MutableIcmpPacket};
use pnet::packet::ip::IpNextHeaderProtocols;
use pnet::packet::ipv4::{Ipv4Flags, Ipv4Packet, MutableIpv4Packet};
use pnet::packet::Packet;
use pnet::transport::{ipv4_packet_iter, transport_channel, TransportChannelType};
use tracing::{debug, warn};

use crate::error::ProbeError;
use crate::netutils::is_local_ip;
use crate::osdb::{self, RESEND_COUNT};
use crate::probes::{Observation, Probe};

const ECHO_PAYLOAD: &[u8] = b"HELLO-R-U-THERE";
const IPV4_HEADER_LEN: usize = 20;
const ICMP_HEADER_LEN: usize = 8;

/// IP-layer facts read from an echo reply.
#[derive(Debug, Clone, Copy)]
pub struct EchoReply {
    pub peer: Ipv4Addr,
    pub ttl: u8,
    pub df: bool,
}

pub struct IcmpProbe;

#[async_trait]
impl Probe for IcmpProbe {
    async fn probe(&self, target: Ipv4Addr, timeout: Duration) -> Observation {
        let reply = match send_echo(target, timeout, RESEND_COUNT + 1).await {
            Ok(reply) => reply,
            Err(ProbeError::Privilege(e)) => {
                warn!("icmp probe needs a raw socket, skipping: {e}");
                return Observation::none();
            }
            Err(e) => {
                debug!("no icmp echo reply from {target}: {e}");
                return Observation::none();
            }
        };

        let ttl = effective_ttl(&reply);
        debug!(ttl, df = reply.df, "icmp reply parameters");

        let candidates = osdb::ip_layer_candidates(reply.df, ttl);
        let mut weights: Vec<(&'static str, u32)> =
            candidates.iter().map(|os| (*os, 2)).collect();

        // TTL near 128 and a set DF flag are both Windows tells; weight the
        // newer versions harder when the evidence agrees.
        let windows_ttl = ttl > 64 && ttl <= 128;
        if (windows_ttl || reply.df) && candidates.iter().any(|os| osdb::is_windows_label(os)) {
            let bonus: [(&'static str, u32); 4] = if windows_ttl && reply.df {
                [
                    ("Windows 11", 4),
                    ("Windows 10", 3),
                    ("Windows 7", 2),
                    ("Windows XP", 1),
                ]
            } else if windows_ttl {
                [
                    ("Windows 11", 3),
                    ("Windows 10", 2),
                    ("Windows 7", 2),
                    ("Windows XP", 1),
                ]
            } else {
                [
                    ("Windows 11", 3),
                    ("Windows 10", 2),
                    ("Windows 7", 1),
                    ("Windows XP", 1),
                ]
            };
            debug!("icmp reply has Windows features, weighting Windows versions");
            weights.extend(bonus);
        }

        Observation {
            candidates,
            weights,
            replace: false,
            open_port: None,
        }
    }

    fn name(&self) -> &'static str {
        "icmp"
    }
}

/// Send one echo request and wait for a matching reply, retransmitting up
/// to `attempts` times. Blocking pnet I/O runs off the async runtime.
pub async fn send_echo(
    target: Ipv4Addr,
    timeout: Duration,
    attempts: usize,
) -> Result<EchoReply, ProbeError> {
    match tokio::task::spawn_blocking(move || echo_blocking(target, timeout, attempts)).await {
        Ok(res) => res,
        Err(e) => Err(ProbeError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            e,
        ))),
    }
}

fn echo_blocking(
    target: Ipv4Addr,
    timeout: Duration,
    attempts: usize,
) -> Result<EchoReply, ProbeError> {
    let channel_type = TransportChannelType::Layer3(IpNextHeaderProtocols::Icmp);
    let (mut tx, mut rx) = transport_channel(4096, channel_type).map_err(|e| {
        if e.kind() == std::io::ErrorKind::PermissionDenied {
            ProbeError::Privilege(e.to_string())
        } else {
            ProbeError::Io(e)
        }
    })?;

    let request = build_echo_request(target);
    let ident = (std::process::id() & 0xffff) as u16;

    // retransmissions share the one deadline; the probe never waits longer
    // than `timeout` in total
    let deadline = Instant::now() + timeout;
    for _ in 0..attempts {
        if deadline.saturating_duration_since(Instant::now()).is_zero() {
            break;
        }
        let packet = Ipv4Packet::new(&request).expect("echo request buffer is sized statically");
        tx.send_to(packet, IpAddr::V4(target))?;

        let mut iter = ipv4_packet_iter(&mut rx);
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match iter.next_with_timeout(remaining) {
                Ok(Some((ip, addr))) => {
                    if let Some(reply) = match_echo_reply(&ip, addr, target, ident) {
                        return Ok(reply);
                    }
                }
                Ok(None) => break,
                Err(e) => return Err(ProbeError::Io(e)),
            }
        }
    }
    Err(ProbeError::Timeout)
}

fn build_echo_request(dst: Ipv4Addr) -> Vec<u8> {
    let total = IPV4_HEADER_LEN + ICMP_HEADER_LEN + ECHO_PAYLOAD.len();
    let mut buf = vec![0u8; total];
    let (ip_buf, icmp_buf) = buf.split_at_mut(IPV4_HEADER_LEN);

    let mut ip = MutableIpv4Packet::new(ip_buf).expect("ipv4 header buffer is sized statically");
    ip.set_version(4);
    ip.set_header_length(5);
    ip.set_total_length(total as u16);
    ip.set_ttl(64);
    ip.set_flags(Ipv4Flags::DontFragment);
    ip.set_next_level_protocol(IpNextHeaderProtocols::Icmp);
    ip.set_destination(dst);
    // source and header checksum left zero; the kernel fills them in

    let mut echo = MutableEchoRequestPacket::new(&mut icmp_buf[..])
        .expect("icmp buffer is sized statically");
    echo.set_icmp_type(IcmpTypes::EchoRequest);
    echo.set_icmp_code(IcmpCode(0));
    echo.set_identifier((std::process::id() & 0xffff) as u16);
    echo.set_sequence_number(1);
    echo.set_payload(ECHO_PAYLOAD);

    let mut raw = MutableIcmpPacket::new(icmp_buf).expect("icmp buffer is sized statically");
    let checksum = icmp::checksum(&raw.to_immutable());
    raw.set_checksum(checksum);

    buf
}

fn match_echo_reply(
    ip: &Ipv4Packet,
    addr: IpAddr,
    target: Ipv4Addr,
    ident: u16,
) -> Option<EchoReply> {
    if addr != IpAddr::V4(target) {
        return None;
    }
    if ip.get_next_level_protocol() != IpNextHeaderProtocols::Icmp {
        return None;
    }
    let icmp_packet = IcmpPacket::new(ip.payload())?;
    if icmp_packet.get_icmp_type() != IcmpTypes::EchoReply {
        return None;
    }
    let reply = EchoReplyPacket::new(ip.payload())?;
    if reply.get_identifier() != ident {
        return None;
    }
    Some(EchoReply {
        peer: ip.get_source(),
        ttl: ip.get_ttl(),
        df: ip.get_flags() & 0x2 != 0,
    })
}

/// The TTL actually fed to the analyzer. Some stacks surface a zero TTL
/// through raw-socket reads; fall back to a locality guess in that case.
fn effective_ttl(reply: &EchoReply) -> u8 {
    if reply.ttl > 0 {
        reply.ttl
    } else {
        fallback_ttl(reply.peer)
    }
}

/// Coarse initial-TTL guess when the wire value is unusable. Local peers
/// rarely cross a router, so 64 is the safer default there too.
pub fn fallback_ttl(peer: Ipv4Addr) -> u8 {
    if is_local_ip(peer) || !likely_windows_peer(peer) {
        64
    } else {
        128
    }
}

/// Pluggable heuristic for remote peers whose TTL could not be measured.
/// An address alone says nothing about the OS, so the default declines.
fn likely_windows_peer(_peer: Ipv4Addr) -> bool {
    false
}
