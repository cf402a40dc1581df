//! ICMP echo liveness probing.
//!
//! Tries an unprivileged datagram ICMP socket first (Linux `ping_group_range`,
//! macOS), then a raw socket. When neither can be opened the prober degrades
//! to [`TcpPingProber`].
//!
//! Sockets are blocking with a read timeout and run on the blocking pool, so
//! each probe is bounded by the configured timeout.

use crate::scanner::tcp::TcpPingProber;
use crate::scanner::traits::{Liveness, LivenessProber};
use async_trait::async_trait;
use pnet::packet::icmp::echo_request::MutableEchoRequestPacket;
use pnet::packet::icmp::{checksum, IcmpPacket, IcmpTypes};
use pnet::packet::Packet;
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::io::{self, Read};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

const PAYLOAD: &[u8] = b"voidscan-liveness-probe";
const ICMPV4_ECHO_REPLY: u8 = 0;
const ICMPV6_ECHO_REQUEST: u8 = 128;
const ICMPV6_ECHO_REPLY: u8 = 129;

/// How the ICMP socket was obtained. Raw sockets see every ICMP packet and
/// (for IPv4) the IP header; datagram sockets see only their own replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SocketKind {
    Datagram,
    Raw,
}

fn open_socket(ip: IpAddr) -> io::Result<(Socket, SocketKind)> {
    let (domain, protocol) = match ip {
        IpAddr::V4(_) => (Domain::IPV4, Protocol::ICMPV4),
        IpAddr::V6(_) => (Domain::IPV6, Protocol::ICMPV6),
    };

    match Socket::new(domain, Type::DGRAM, Some(protocol)) {
        Ok(socket) => Ok((socket, SocketKind::Datagram)),
        Err(_) => Socket::new(domain, Type::RAW, Some(protocol)).map(|s| (s, SocketKind::Raw)),
    }
}

/// Check if running with root privileges.
pub fn is_root() -> bool {
    #[cfg(unix)]
    {
        unsafe { libc::geteuid() == 0 }
    }
    #[cfg(not(unix))]
    {
        false
    }
}

fn build_request(ip: IpAddr, identifier: u16, sequence: u16) -> io::Result<Vec<u8>> {
    let mut buf = vec![0u8; 8 + PAYLOAD.len()];

    match ip {
        IpAddr::V4(_) => {
            let mut packet = MutableEchoRequestPacket::new(&mut buf).ok_or_else(|| {
                io::Error::new(io::ErrorKind::InvalidInput, "echo buffer too small")
            })?;
            packet.set_icmp_type(IcmpTypes::EchoRequest);
            packet.set_identifier(identifier);
            packet.set_sequence_number(sequence);
            packet.set_payload(PAYLOAD);
            let sum = IcmpPacket::new(packet.packet()).map_or(0, |p| checksum(&p));
            packet.set_checksum(sum);
        }
        IpAddr::V6(_) => {
            // The kernel fills in the ICMPv6 checksum.
            buf[0] = ICMPV6_ECHO_REQUEST;
            buf[4..6].copy_from_slice(&identifier.to_be_bytes());
            buf[6..8].copy_from_slice(&sequence.to_be_bytes());
            buf[8..].copy_from_slice(PAYLOAD);
        }
    }

    Ok(buf)
}

fn is_echo_reply(
    data: &[u8],
    ip: IpAddr,
    kind: SocketKind,
    identifier: u16,
    sequence: u16,
) -> bool {
    let (icmp, reply_type) = match ip {
        IpAddr::V4(_) if kind == SocketKind::Raw => {
            let Some(first) = data.first() else {
                return false;
            };
            let header_len = usize::from(first & 0x0f) * 4;
            (data.get(header_len..).unwrap_or_default(), ICMPV4_ECHO_REPLY)
        }
        IpAddr::V4(_) => (data, ICMPV4_ECHO_REPLY),
        IpAddr::V6(_) => (data, ICMPV6_ECHO_REPLY),
    };

    if icmp.len() < 8 || icmp[0] != reply_type {
        return false;
    }
    let seq = u16::from_be_bytes([icmp[6], icmp[7]]);
    // Datagram sockets rewrite the identifier to their local port.
    let id_matches =
        kind == SocketKind::Datagram || u16::from_be_bytes([icmp[4], icmp[5]]) == identifier;
    seq == sequence && id_matches
}

/// Send one echo request and wait for the matching reply until `limit`.
fn echo(socket: Socket, kind: SocketKind, ip: IpAddr, limit: Duration) -> io::Result<bool> {
    let identifier: u16 = rand::random();
    let sequence: u16 = rand::random();
    let request = build_request(ip, identifier, sequence)?;

    socket.connect(&SockAddr::from(SocketAddr::new(ip, 0)))?;
    socket.send(&request)?;

    let deadline = Instant::now() + limit;
    let mut buf = [0u8; 1500];
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Ok(false);
        }
        socket.set_read_timeout(Some(remaining))?;

        let n = match (&socket).read(&mut buf) {
            Ok(n) => n,
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                return Ok(false)
            }
            Err(e) => return Err(e),
        };
        if is_echo_reply(&buf[..n], ip, kind, identifier, sequence) {
            return Ok(true);
        }
    }
}

/// ICMP echo liveness prober with a TCP connect fallback.
#[derive(Debug, Clone)]
pub struct IcmpProber {
    timeout: Duration,
    fallback: TcpPingProber,
}

impl IcmpProber {
    pub fn new(timeout: Duration, fallback: TcpPingProber) -> Self {
        Self { timeout, fallback }
    }

    /// Whether this process can open an IPv4 ICMP socket at all.
    pub fn available() -> bool {
        open_socket(IpAddr::V4(Ipv4Addr::LOCALHOST)).is_ok()
    }
}

#[async_trait]
impl LivenessProber for IcmpProber {
    async fn probe(&self, ip: IpAddr) -> Liveness {
        let (socket, kind) = match open_socket(ip) {
            Ok(opened) => opened,
            Err(e) => {
                tracing::debug!(%ip, error = %e, "no ICMP socket for this family, using TCP ping");
                return self.fallback.probe(ip).await;
            }
        };

        let limit = self.timeout;
        match tokio::task::spawn_blocking(move || echo(socket, kind, ip, limit)).await {
            Ok(Ok(true)) => Liveness::Alive,
            Ok(Ok(false)) => Liveness::Unreachable,
            Ok(Err(e)) => {
                tracing::debug!(%ip, error = %e, "echo request failed");
                Liveness::Unreachable
            }
            Err(e) => {
                tracing::warn!(%ip, error = %e, "echo task aborted");
                Liveness::Unreachable
            }
        }
    }

    fn method(&self) -> &'static str {
        "icmp-echo"
    }
}

/// Pick the best liveness prober this process can use.
///
/// Falls back to TCP connect probing, and says so, when ICMP sockets cannot
/// be opened.
pub fn detect_liveness_prober(
    timeout: Duration,
    fallback_ports: Vec<u16>,
) -> Arc<dyn LivenessProber> {
    let fallback = TcpPingProber::new(fallback_ports, timeout);
    if IcmpProber::available() {
        Arc::new(IcmpProber::new(timeout, fallback))
    } else {
        tracing::warn!(
            root = is_root(),
            "ICMP sockets unavailable; liveness degraded to TCP connect probes, hosts that drop those ports will look unreachable"
        );
        Arc::new(fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv6Addr;

    #[test]
    fn test_build_request_v4_checksum() {
        let packet = build_request(IpAddr::V4(Ipv4Addr::LOCALHOST), 0x1234, 7).unwrap();
        assert_eq!(packet[0], 8);
        assert_eq!(&packet[4..6], &0x1234u16.to_be_bytes());
        assert_eq!(&packet[6..8], &7u16.to_be_bytes());
        // Recomputing skips the stored checksum field, so it must match.
        let icmp = IcmpPacket::new(&packet).unwrap();
        assert_eq!(checksum(&icmp), u16::from_be_bytes([packet[2], packet[3]]));
    }

    #[test]
    fn test_build_request_v6() {
        let packet = build_request(IpAddr::V6(Ipv6Addr::LOCALHOST), 1, 2).unwrap();
        assert_eq!(packet[0], ICMPV6_ECHO_REQUEST);
        assert_eq!(&packet[8..], PAYLOAD);
    }

    #[test]
    fn test_reply_matching() {
        let v4 = IpAddr::V4(Ipv4Addr::LOCALHOST);
        let mut reply = vec![ICMPV4_ECHO_REPLY, 0, 0, 0, 0xAB, 0xCD, 0x00, 0x05];
        reply.extend_from_slice(PAYLOAD);

        assert!(is_echo_reply(&reply, v4, SocketKind::Datagram, 0, 5));
        assert!(!is_echo_reply(&reply, v4, SocketKind::Datagram, 0, 6));

        // Raw IPv4 sockets include a 20-byte IP header.
        let mut raw = vec![0x45u8];
        raw.extend_from_slice(&[0u8; 19]);
        raw.extend_from_slice(&reply);
        assert!(is_echo_reply(&raw, v4, SocketKind::Raw, 0xABCD, 5));
        assert!(!is_echo_reply(&raw, v4, SocketKind::Raw, 0x0000, 5));
    }

    #[test]
    fn test_truncated_reply_rejected() {
        let v4 = IpAddr::V4(Ipv4Addr::LOCALHOST);
        assert!(!is_echo_reply(&[0, 0, 0], v4, SocketKind::Datagram, 0, 0));
        assert!(!is_echo_reply(&[], v4, SocketKind::Raw, 0, 0));
    }
}
