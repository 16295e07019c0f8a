//! Session plumbing against local listeners: the default-OS port walk and
//! the liveness prober's TCP fallback, driven through custom port lists.

use std::net::Ipv4Addr;

use osdetect::detect::{default_os, Detector};
use tokio::net::TcpListener;

fn keep_open(listener: TcpListener) {
    tokio::spawn(async move {
        loop {
            if listener.accept().await.is_err() {
                break;
            }
        }
    });
}

async fn open_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    keep_open(listener);
    port
}

async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

#[tokio::test]
async fn default_os_reads_windows_off_rdp() {
    // 3389 is unprivileged, but another test may hold it
    let Ok(listener) = TcpListener::bind("127.0.0.1:3389").await else {
        eprintln!("skipping: port 3389 unavailable");
        return;
    };
    keep_open(listener);
    assert_eq!(default_os(Ipv4Addr::LOCALHOST, &[3389]).await, "Windows");
}

#[tokio::test]
async fn default_os_reads_linux_off_ssh() {
    // binding 22 needs privilege; skip where we don't have it
    let Ok(listener) = TcpListener::bind("127.0.0.1:22").await else {
        eprintln!("skipping: port 22 unavailable");
        return;
    };
    keep_open(listener);
    assert_eq!(default_os(Ipv4Addr::LOCALHOST, &[22]).await, "Linux");
}

#[tokio::test]
async fn default_os_reads_windows_off_smb() {
    let Ok(listener) = TcpListener::bind("127.0.0.1:445").await else {
        eprintln!("skipping: port 445 unavailable");
        return;
    };
    keep_open(listener);
    assert_eq!(default_os(Ipv4Addr::LOCALHOST, &[445]).await, "Windows");
}

#[tokio::test]
async fn default_os_walks_past_closed_and_non_telltale_ports() {
    let closed = closed_port().await;
    let open = open_port().await;
    let Ok(listener) = TcpListener::bind("127.0.0.1:3389").await else {
        eprintln!("skipping: port 3389 unavailable");
        return;
    };
    keep_open(listener);
    assert_eq!(
        default_os(Ipv4Addr::LOCALHOST, &[closed, open, 3389]).await,
        "Windows"
    );
}

#[tokio::test]
async fn default_os_exhausts_the_list_as_unknown() {
    let closed = closed_port().await;
    let open = open_port().await;
    assert_eq!(
        default_os(Ipv4Addr::LOCALHOST, &[closed, open]).await,
        "Unknown"
    );
}

#[tokio::test]
async fn survival_detect_confirms_liveness_via_an_open_port() {
    let open = open_port().await;
    let detector = Detector::with_ports(vec![open]);
    // localhost may also answer the ICMP echo when we run privileged, so
    // only the liveness verdict itself is stable
    let (alive, _icmp) = detector.survival_detect(Ipv4Addr::LOCALHOST).await;
    assert!(alive);
}
