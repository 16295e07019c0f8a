use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

pub async fn connect_with_timeout(
    ip: Ipv4Addr,
    port: u16,
    timeout: Duration,
) -> Option<TcpStream> {
    let addr = SocketAddr::from((ip, port));
    match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => Some(stream),
        _ => None,
    }
}

/// Write request to stream and read a single response with timeouts.
/// Returns `Some(Vec<u8>)` when a non-empty response was read, otherwise `None`.
pub async fn send_and_read(
    stream: &mut TcpStream,
    request: &[u8],
    write_timeout: Duration,
    read_timeout: Duration,
) -> Option<Vec<u8>> {
    if tokio::time::timeout(write_timeout, stream.write_all(request))
        .await
        .is_err()
    {
        return None;
    }
    let mut buf = vec![0u8; 8192];
    match tokio::time::timeout(read_timeout, stream.read(&mut buf)).await {
        Ok(Ok(n)) if n > 0 => {
            buf.truncate(n);
            Some(buf)
        }
        _ => None,
    }
}
