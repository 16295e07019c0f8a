//! SMB2/NTLMSSP extractor. Drives a minimal NEGOTIATE -> SESSION_SETUP
//! dialogue against port 445 and captures every byte the server sends. A
//! Windows server answers the session setup with an NTLMSSP CHALLENGE whose
//! Version field carries the exact major.minor.build of the OS, which makes
//! this the one authoritative probe: a parsed version replaces the running
//! candidate set instead of intersecting into it.

use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::time::sleep;
use tracing::{debug, info};

use crate::error::ProbeError;
use crate::osdb::{OsSet, MAX_RTT};
use crate::probes::{helper, Observation, Probe};

pub const NTLMSSP_SIGNATURE: &[u8; 8] = b"NTLMSSP\0";

pub const NTLMSSP_NEGOTIATE: u32 = 1;
pub const NTLMSSP_CHALLENGE: u32 = 2;

const CONNECT_ATTEMPTS: usize = 3;
const RETRY_DELAY: Duration = Duration::from_secs(1);
const IO_TIMEOUT: Duration = Duration::from_millis(1500);

/// MS-NLMP VERSION structure, little-endian on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NtlmVersion {
    pub major: u8,
    pub minor: u8,
    pub build: u16,
    pub reserved: [u8; 3],
    pub ntlm_revision: u8,
}

impl NtlmVersion {
    pub fn from_bytes(b: &[u8; 8]) -> Self {
        Self {
            major: b[0],
            minor: b[1],
            build: u16::from_le_bytes([b[2], b[3]]),
            reserved: [b[4], b[5], b[6]],
            ntlm_revision: b[7],
        }
    }

    pub fn to_bytes(&self) -> [u8; 8] {
        let build = self.build.to_le_bytes();
        [
            self.major,
            self.minor,
            build[0],
            build[1],
            self.reserved[0],
            self.reserved[1],
            self.reserved[2],
            self.ntlm_revision,
        ]
    }
}

/// Locate an NTLMSSP CHALLENGE in a raw capture and decode its Version
/// field. The field sits 48 bytes past the signature: 8 signature + 4
/// message type + 8 TargetNameFields + 4 NegotiateFlags + 8 ServerChallenge
/// + 8 Reserved + 8 TargetInfoFields. Partial captures are fine as long as
/// the message is intact through the Version field.
pub fn parse_ntlmssp_version(data: &[u8]) -> Result<NtlmVersion, ProbeError> {
    let idx = data
        .windows(NTLMSSP_SIGNATURE.len())
        .position(|w| w == NTLMSSP_SIGNATURE)
        .ok_or_else(|| ProbeError::Parse("NTLMSSP signature not found".into()))?;

    if data.len() < idx + 64 {
        return Err(ProbeError::Parse("NTLMSSP message truncated".into()));
    }

    let msg_type = u32::from_le_bytes(
        data[idx + 8..idx + 12]
            .try_into()
            .expect("slice length is 4"),
    );
    if msg_type != NTLMSSP_CHALLENGE {
        return Err(ProbeError::Parse(format!(
            "not a challenge message (type {msg_type})"
        )));
    }

    let version: &[u8; 8] = data[idx + 48..idx + 56]
        .try_into()
        .expect("slice length is 8");
    Ok(NtlmVersion::from_bytes(version))
}

/// Map a decoded version to labels and weights. The version is trusted, so
/// the labels come back as a replacement set. Build 22000 separates
/// Windows 11 from Windows 10 on the shared 10.x kernel line.
pub fn challenge_observation(version: &NtlmVersion) -> Option<Observation> {
    let (labels, weights): (&[&'static str], Vec<(&'static str, u32)>) = match version.major {
        10 => {
            let weights = if version.build >= 22000 {
                vec![("Windows 11", 5), ("Windows 10", 3)]
            } else {
                vec![("Windows 10", 5), ("Windows 11", 3)]
            };
            (&["Windows 10", "Windows 11"], weights)
        }
        6 => match version.minor {
            1 => (&["Windows 7"], vec![("Windows 7", 5)]),
            2 | 3 => (&["Windows 8"], vec![("Windows 8", 5)]),
            _ => return None,
        },
        5 => (&["Windows XP"], vec![("Windows XP", 5)]),
        _ => return None,
    };

    Some(Observation {
        candidates: labels.iter().copied().collect(),
        weights,
        replace: true,
        open_port: None,
    })
}

/// Last-resort scan for an ASCII OS banner ("Windows ... 10.0 ...") in the
/// capture when no version record could be decoded.
pub fn banner_observation(capture: &[u8]) -> Option<Observation> {
    let text = String::from_utf8_lossy(capture);
    if !text.contains("Windows") {
        return None;
    }
    let labels: OsSet = if text.contains("11.0") {
        ["Windows 11"].into_iter().collect()
    } else if text.contains("10.0") {
        ["Windows 10", "Windows 11"].into_iter().collect()
    } else if text.contains("6.1") {
        ["Windows 7"].into_iter().collect()
    } else if text.contains("5.1") {
        ["Windows XP"].into_iter().collect()
    } else {
        return None;
    };
    let weights = labels.iter().map(|os| (*os, 3)).collect();
    Some(Observation {
        candidates: labels,
        weights,
        replace: true,
        open_port: None,
    })
}

pub struct SmbProbe {
    pub port: u16,
}

impl Default for SmbProbe {
    fn default() -> Self {
        Self { port: 445 }
    }
}

#[async_trait]
impl Probe for SmbProbe {
    async fn probe(&self, target: Ipv4Addr, timeout: Duration) -> Observation {
        let mut capture = Vec::new();

        // retries and the pauses between them all run against one deadline
        let deadline = Instant::now() + timeout;
        for attempt in 1..=CONNECT_ATTEMPTS {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match tokio::time::timeout(remaining, self.dialogue(target, &mut capture)).await {
                Ok(Ok(())) => break,
                Ok(Err(e)) => debug!(attempt, "smb dialogue failed: {e}"),
                Err(_) => debug!(attempt, "smb dialogue timed out"),
            }
            // a partial capture with a challenge in it is still usable
            if capture
                .windows(NTLMSSP_SIGNATURE.len())
                .any(|w| w == NTLMSSP_SIGNATURE)
            {
                break;
            }
            if attempt < CONNECT_ATTEMPTS {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    break;
                }
                sleep(RETRY_DELAY.min(remaining)).await;
            }
        }

        if capture.is_empty() {
            return Observation::none();
        }

        match parse_ntlmssp_version(&capture) {
            Ok(version) => {
                info!(
                    "smb reports Windows {}.{}.{}",
                    version.major, version.minor, version.build
                );
                challenge_observation(&version).unwrap_or_else(Observation::none)
            }
            Err(e) => {
                debug!("ntlmssp version not decoded: {e}");
                banner_observation(&capture).unwrap_or_else(Observation::none)
            }
        }
    }

    fn name(&self) -> &'static str {
        "smb"
    }
}

impl SmbProbe {
    /// Negotiate, then open a session with an anonymous (Guest) NTLMSSP
    /// NEGOTIATE token. Everything read is appended to `capture`; the
    /// caller mines it for the CHALLENGE even if the dialogue aborts.
    async fn dialogue(&self, target: Ipv4Addr, capture: &mut Vec<u8>) -> Result<(), ProbeError> {
        let mut stream = helper::connect_with_timeout(target, self.port, MAX_RTT)
            .await
            .ok_or_else(|| ProbeError::Refused(format!("{target}:{} unreachable", self.port)))?;

        let negotiate = build_negotiate_request();
        match helper::send_and_read(&mut stream, &negotiate, IO_TIMEOUT, IO_TIMEOUT).await {
            Some(resp) => capture.extend_from_slice(&resp),
            None => return Err(ProbeError::Timeout),
        }

        let setup = build_session_setup_request();
        match helper::send_and_read(&mut stream, &setup, IO_TIMEOUT, IO_TIMEOUT).await {
            Some(resp) => capture.extend_from_slice(&resp),
            None => return Err(ProbeError::Timeout),
        }

        Ok(())
    }
}

/// NetBIOS session header: 0x00 plus a 3-byte big-endian payload length.
fn netbios_frame(payload: Vec<u8>) -> Vec<u8> {
    let len = payload.len() as u32;
    let mut pkt = vec![0x00u8];
    pkt.extend_from_slice(&len.to_be_bytes()[1..]);
    pkt.extend_from_slice(&payload);
    pkt
}

/// 64-byte SMB2 header for a client request.
fn smb2_header(command: u16, message_id: u64) -> Vec<u8> {
    let mut hdr = Vec::with_capacity(64);
    hdr.extend_from_slice(&[0xFE, b'S', b'M', b'B']);
    hdr.extend_from_slice(&0x0040u16.to_le_bytes()); // StructureSize
    hdr.extend_from_slice(&[0u8; 2]); // CreditCharge
    hdr.extend_from_slice(&[0u8; 4]); // Status / ChannelSequence
    hdr.extend_from_slice(&command.to_le_bytes());
    hdr.extend_from_slice(&1u16.to_le_bytes()); // CreditsRequested
    hdr.extend_from_slice(&[0u8; 4]); // Flags
    hdr.extend_from_slice(&[0u8; 4]); // NextCommand
    hdr.extend_from_slice(&message_id.to_le_bytes());
    hdr.extend_from_slice(&[0u8; 4]); // Reserved
    hdr.extend_from_slice(&[0u8; 4]); // TreeId
    hdr.extend_from_slice(&[0u8; 8]); // SessionId
    hdr.extend_from_slice(&[0u8; 16]); // Signature
    hdr
}

/// SMB2 NEGOTIATE asking for dialects 2.0.2 through 3.0.
fn build_negotiate_request() -> Vec<u8> {
    let dialects: [u16; 3] = [0x0202, 0x0210, 0x0300];

    let mut payload = smb2_header(0x0000, 0);
    payload.extend_from_slice(&0x0024u16.to_le_bytes()); // StructureSize
    payload.extend_from_slice(&(dialects.len() as u16).to_le_bytes());
    payload.extend_from_slice(&0x0001u16.to_le_bytes()); // SecurityMode: signing enabled
    payload.extend_from_slice(&[0u8; 2]); // Reserved
    payload.extend_from_slice(&[0u8; 4]); // Capabilities

    let mut rng = StdRng::from_entropy();
    let mut guid = [0u8; 16];
    rng.fill(&mut guid);
    payload.extend_from_slice(&guid);

    payload.extend_from_slice(&[0u8; 8]); // NegotiateContextOffset/Count/Reserved
    for d in dialects {
        payload.extend_from_slice(&d.to_le_bytes());
    }

    netbios_frame(payload)
}

/// SMB2 SESSION_SETUP carrying a raw NTLMSSP NEGOTIATE token. The server
/// answers with STATUS_MORE_PROCESSING_REQUIRED and the CHALLENGE we are
/// after; the session is never completed.
fn build_session_setup_request() -> Vec<u8> {
    let token = build_ntlm_negotiate_token();

    let mut payload = smb2_header(0x0001, 1);
    payload.extend_from_slice(&0x0019u16.to_le_bytes()); // StructureSize
    payload.push(0); // Flags
    payload.push(0x01); // SecurityMode: signing enabled
    payload.extend_from_slice(&[0u8; 4]); // Capabilities
    payload.extend_from_slice(&[0u8; 4]); // Channel
    payload.extend_from_slice(&0x0058u16.to_le_bytes()); // SecurityBufferOffset: 64 + 24
    payload.extend_from_slice(&(token.len() as u16).to_le_bytes());
    payload.extend_from_slice(&[0u8; 8]); // PreviousSessionId
    payload.extend_from_slice(&token);

    netbios_frame(payload)
}

/// Minimal NTLMSSP NEGOTIATE (type 1) message. The version flag asks the
/// server to include its Version field in the CHALLENGE.
fn build_ntlm_negotiate_token() -> Vec<u8> {
    const NEGOTIATE_UNICODE: u32 = 0x0000_0001;
    const NEGOTIATE_OEM: u32 = 0x0000_0002;
    const REQUEST_TARGET: u32 = 0x0000_0004;
    const NEGOTIATE_NTLM: u32 = 0x0000_0200;
    const NEGOTIATE_ALWAYS_SIGN: u32 = 0x0000_8000;
    const NEGOTIATE_VERSION: u32 = 0x0200_0000;

    let flags = NEGOTIATE_UNICODE
        | NEGOTIATE_OEM
        | REQUEST_TARGET
        | NEGOTIATE_NTLM
        | NEGOTIATE_ALWAYS_SIGN
        | NEGOTIATE_VERSION;

    let mut token = Vec::with_capacity(32);
    token.extend_from_slice(NTLMSSP_SIGNATURE);
    token.extend_from_slice(&NTLMSSP_NEGOTIATE.to_le_bytes());
    token.extend_from_slice(&flags.to_le_bytes());
    // empty domain and workstation fields, both pointing past the payload
    token.extend_from_slice(&[0u8; 2]); // DomainNameLen
    token.extend_from_slice(&[0u8; 2]); // DomainNameMaxLen
    token.extend_from_slice(&32u32.to_le_bytes()); // DomainNameBufferOffset
    token.extend_from_slice(&[0u8; 2]); // WorkstationLen
    token.extend_from_slice(&[0u8; 2]); // WorkstationMaxLen
    token.extend_from_slice(&32u32.to_le_bytes()); // WorkstationBufferOffset
    token
}
