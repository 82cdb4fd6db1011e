//! Utility functions for segkv

use std::net::{IpAddr, TcpListener, UdpSocket};
use std::time::{SystemTime, UNIX_EPOCH};

/// Get current Unix timestamp (seconds)
pub fn timestamp_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

/// Get current Unix timestamp (milliseconds)
pub fn timestamp_now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_millis() as u64
}

/// Enumerate local IP addresses usable for peer handshakes.
///
/// Resolves the default route with an unconnected UDP socket (no packet
/// is sent) and falls back to loopback, so the result is never empty.
pub fn find_local_ip_addresses() -> Vec<String> {
    let mut addrs = Vec::new();

    if let Ok(socket) = UdpSocket::bind("0.0.0.0:0") {
        if socket.connect("8.8.8.8:80").is_ok() {
            if let Ok(local) = socket.local_addr() {
                if let IpAddr::V4(v4) = local.ip() {
                    if !v4.is_loopback() {
                        addrs.push(v4.to_string());
                    }
                }
            }
        }
    }

    if addrs.is_empty() {
        addrs.push("127.0.0.1".to_string());
    }
    addrs
}

/// Find a free TCP port on the loopback interface.
pub fn find_available_tcp_port() -> crate::Result<u16> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamps_monotonic_enough() {
        let a = timestamp_now_millis();
        let b = timestamp_now_millis();
        assert!(b >= a);
        assert!(timestamp_now() > 1_600_000_000);
    }

    #[test]
    fn test_local_addresses_never_empty() {
        let addrs = find_local_ip_addresses();
        assert!(!addrs.is_empty());
        for addr in &addrs {
            assert!(addr.parse::<IpAddr>().is_ok());
        }
    }

    #[test]
    fn test_available_port_bindable() {
        let port = find_available_tcp_port().unwrap();
        assert!(port > 0);
        // The port must be free right after discovery.
        TcpListener::bind(("127.0.0.1", port)).unwrap();
    }
}
