//! TCP connect probing.
//!
//! Uses the operating system's `connect()` so no privileges are needed. The
//! same primitive backs both port classification and the fallback liveness
//! check used when ICMP sockets are unavailable.

use crate::error::{ProbeError, ProbeResult};
use crate::scanner::traits::{Liveness, LivenessProber, PortProber, PortResult, PortState};
use crate::types::Port;
use async_trait::async_trait;
use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Connect to `addr`, bounded by `limit`.
async fn attempt_connect(addr: SocketAddr, limit: Duration) -> ProbeResult<TcpStream> {
    match timeout(limit, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(e)) => Err(ProbeError::from_connect(e)),
        Err(_) => Err(ProbeError::Timeout),
    }
}

/// TCP connect port prober.
///
/// - **Open**: handshake completed
/// - **Closed**: connection refused or reset
/// - **Filtered**: timeout, or any other failure (with a diagnostic)
#[derive(Debug, Clone)]
pub struct TcpConnectProber {
    timeout: Duration,
}

impl TcpConnectProber {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl PortProber for TcpConnectProber {
    async fn probe_port(&self, ip: IpAddr, port: Port) -> PortResult {
        let addr = SocketAddr::new(ip, port.as_u16());
        let start = Instant::now();

        match attempt_connect(addr, self.timeout).await {
            Ok(stream) => {
                let latency = start.elapsed();
                drop(stream);
                PortResult::new(port, PortState::Open).with_latency(latency)
            }
            Err(ProbeError::Refused) => {
                PortResult::new(port, PortState::Closed).with_latency(start.elapsed())
            }
            Err(ProbeError::Timeout) => PortResult::new(port, PortState::Filtered),
            Err(e) => {
                tracing::debug!(%addr, error = %e, "probe failed, recording as filtered");
                PortResult::new(port, PortState::Filtered).with_diagnostic(e.to_string())
            }
        }
    }
}

/// Liveness by TCP connect to a few common ports.
///
/// Any handshake or active refusal proves the host is up. This is the
/// degraded mode used when ICMP echo is not available to the process.
#[derive(Debug, Clone)]
pub struct TcpPingProber {
    ports: Vec<u16>,
    timeout: Duration,
}

impl TcpPingProber {
    pub fn new(ports: Vec<u16>, timeout: Duration) -> Self {
        Self { ports, timeout }
    }
}

#[async_trait]
impl LivenessProber for TcpPingProber {
    async fn probe(&self, ip: IpAddr) -> Liveness {
        let attempts = self
            .ports
            .iter()
            .map(|&port| attempt_connect(SocketAddr::new(ip, port), self.timeout));

        for outcome in futures::future::join_all(attempts).await {
            match outcome {
                Ok(_) | Err(ProbeError::Refused) => return Liveness::Alive,
                Err(_) => {}
            }
        }
        Liveness::Unreachable
    }

    fn method(&self) -> &'static str {
        "tcp-connect"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use tokio::net::TcpListener;

    const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

    /// Bind a listener and return its port; the listener stays open.
    async fn local_listener() -> (TcpListener, Port) {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        let port = Port::new(listener.local_addr().unwrap().port()).unwrap();
        (listener, port)
    }

    /// Bind then drop a listener, leaving a port that is almost surely closed.
    async fn closed_port() -> Port {
        let (listener, port) = local_listener().await;
        drop(listener);
        port
    }

    #[tokio::test]
    async fn test_open_port() {
        let (_listener, port) = local_listener().await;
        let prober = TcpConnectProber::new(Duration::from_secs(1));

        let result = prober.probe_port(LOCALHOST, port).await;
        assert_eq!(result.state, PortState::Open);
        assert!(result.latency_ms.is_some());
    }

    #[tokio::test]
    async fn test_closed_port() {
        let port = closed_port().await;
        let prober = TcpConnectProber::new(Duration::from_millis(500));

        let result = prober.probe_port(LOCALHOST, port).await;
        // Closed on a normal loopback; a strict local firewall may drop instead.
        assert!(matches!(result.state, PortState::Closed | PortState::Filtered));
    }

    #[tokio::test]
    async fn test_tcp_ping_alive_on_listener() {
        let (_listener, port) = local_listener().await;
        let prober = TcpPingProber::new(vec![port.as_u16()], Duration::from_secs(1));
        assert_eq!(prober.probe(LOCALHOST).await, Liveness::Alive);
    }

    #[tokio::test]
    async fn test_tcp_ping_alive_on_refusal() {
        let port = closed_port().await;
        let prober = TcpPingProber::new(vec![port.as_u16()], Duration::from_millis(500));
        // Loopback refuses, which still proves the host is up.
        assert_eq!(prober.probe(LOCALHOST).await, Liveness::Alive);
    }
}
