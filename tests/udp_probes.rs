use std::net::Ipv4Addr;
use std::time::Duration;

use osdetect::probes::{DnsProbe, NtpProbe, Probe};
use tokio::net::UdpSocket;

/// One-shot UDP responder that answers whatever arrives with `response`.
async fn respond_once(response: Vec<u8>) -> u16 {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let port = socket.local_addr().unwrap().port();
    tokio::spawn(async move {
        let mut buf = [0u8; 512];
        if let Ok((_, from)) = socket.recv_from(&mut buf).await {
            let _ = socket.send_to(&response, from).await;
        }
    });
    port
}

#[tokio::test]
async fn dns_probe_reads_the_qr_bit() {
    let mut reply = vec![0u8; 12];
    reply[0] = 0x12;
    reply[1] = 0x34;
    reply[2] = 0x81; // QR set
    let port = respond_once(reply).await;

    let probe = DnsProbe { port };
    let obs = probe.probe(Ipv4Addr::LOCALHOST, Duration::from_secs(1)).await;
    assert!(obs.candidates.contains("Windows 10"));
    assert!(!obs.candidates.contains("Linux"));
}

#[tokio::test]
async fn dns_probe_without_qr_leans_unix() {
    let port = respond_once(vec![0u8; 12]).await;

    let probe = DnsProbe { port };
    let obs = probe.probe(Ipv4Addr::LOCALHOST, Duration::from_secs(1)).await;
    assert!(obs.candidates.contains("Linux"));
    assert!(obs.candidates.contains("FreeBSD"));
    assert!(!obs.candidates.contains("Windows 10"));
}

#[tokio::test]
async fn dns_probe_times_out_quietly() {
    // nothing listening; bind-and-drop guarantees silence
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let port = socket.local_addr().unwrap().port();
    drop(socket);

    let probe = DnsProbe { port };
    let obs = probe
        .probe(Ipv4Addr::LOCALHOST, Duration::from_millis(300))
        .await;
    assert!(obs.is_empty());
}

#[tokio::test]
async fn ntp_probe_reads_the_mode_bits() {
    let mut reply = vec![0u8; 48];
    reply[0] = 0x24; // LI=0, VN=4, Mode=4 (server)
    let port = respond_once(reply).await;

    let probe = NtpProbe { port };
    let obs = probe.probe(Ipv4Addr::LOCALHOST, Duration::from_secs(1)).await;
    assert!(obs.candidates.contains("Windows 11"));
    assert!(!obs.candidates.contains("Ubuntu"));
}

#[tokio::test]
async fn ntp_probe_non_server_mode_leans_unix() {
    let mut reply = vec![0u8; 48];
    reply[0] = 0x1b; // Mode=3
    let port = respond_once(reply).await;

    let probe = NtpProbe { port };
    let obs = probe.probe(Ipv4Addr::LOCALHOST, Duration::from_secs(1)).await;
    assert!(obs.candidates.contains("Debian"));
    assert!(!obs.candidates.contains("Windows 7"));
}
