//! Prober trait abstractions and the result types they produce.
//!
//! Both probers are traits so the orchestrator and port scanner can be driven
//! by stub implementations in tests.

use crate::types::Port;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::time::Duration;

/// State of a scanned port.
///
/// A connect scan sees only the outcome of `connect()`: `Closed` means the
/// attempt was actively refused, `Filtered` means nothing came back in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortState {
    /// Port accepted the connection.
    Open,
    /// Connection actively refused (RST received).
    Closed,
    /// No response within the timeout, or the probe failed.
    Filtered,
}

impl fmt::Display for PortState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Closed => write!(f, "closed"),
            Self::Filtered => write!(f, "filtered"),
        }
    }
}

/// Result of probing a single port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortResult {
    /// The port number that was probed.
    pub port: Port,
    /// State determined by the probe.
    pub state: PortState,
    /// Connect latency in milliseconds, when a response was seen.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    /// Why the probe failed, when a probe error was folded into `Filtered`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
}

impl PortResult {
    pub fn new(port: Port, state: PortState) -> Self {
        Self {
            port,
            state,
            latency_ms: None,
            diagnostic: None,
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency_ms = Some(latency.as_millis() as u64);
        self
    }

    pub fn with_diagnostic(mut self, diagnostic: impl Into<String>) -> Self {
        self.diagnostic = Some(diagnostic.into());
        self
    }

    pub fn is_open(&self) -> bool {
        self.state == PortState::Open
    }
}

/// Whether a host answered a reachability probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Liveness {
    #[default]
    Unknown,
    Alive,
    Unreachable,
}

impl fmt::Display for Liveness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::Alive => write!(f, "alive"),
            Self::Unreachable => write!(f, "unreachable"),
        }
    }
}

/// Probes one TCP port on one host.
///
/// Implementations must never fail: every error is expressed as a
/// [`PortState`], with a diagnostic where useful, and every call is bounded
/// by a timeout.
#[async_trait]
pub trait PortProber: Send + Sync {
    async fn probe_port(&self, ip: IpAddr, port: Port) -> PortResult;
}

/// Checks whether a host is reachable.
///
/// Timeouts and network errors yield [`Liveness::Unreachable`].
#[async_trait]
pub trait LivenessProber: Send + Sync {
    async fn probe(&self, ip: IpAddr) -> Liveness;

    /// Short name of the probing technique, for logs and reports.
    fn method(&self) -> &'static str;
}

/// Treats every host as alive without sending anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssumeAlive;

#[async_trait]
impl LivenessProber for AssumeAlive {
    async fn probe(&self, _ip: IpAddr) -> Liveness {
        Liveness::Alive
    }

    fn method(&self) -> &'static str {
        "none"
    }
}
