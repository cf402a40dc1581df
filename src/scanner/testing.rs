//! Stub probers for scanner and orchestrator tests.

use crate::scanner::traits::{Liveness, LivenessProber, PortProber, PortResult, PortState};
use crate::types::Port;
use async_trait::async_trait;
use rand::Rng;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub fn ports(raw: &[u16]) -> Vec<Port> {
    raw.iter().filter_map(|&p| Port::new(p)).collect()
}

/// Answers `Open` after a random delay, scrambling completion order.
pub struct JitterProber {
    max_delay_ms: u64,
}

impl JitterProber {
    pub fn new(max_delay_ms: u64) -> Self {
        Self { max_delay_ms }
    }
}

#[async_trait]
impl PortProber for JitterProber {
    async fn probe_port(&self, _ip: IpAddr, port: Port) -> PortResult {
        let delay = rand::thread_rng().gen_range(0..=self.max_delay_ms);
        tokio::time::sleep(Duration::from_millis(delay)).await;
        PortResult::new(port, PortState::Open)
    }
}

/// Fixed per-port answers; unknown ports come back filtered with a diagnostic.
#[derive(Default)]
pub struct MapProber {
    states: HashMap<u16, PortState>,
    probed: Mutex<Vec<IpAddr>>,
}

impl MapProber {
    pub fn new(states: &[(u16, PortState)]) -> Self {
        Self {
            states: states.iter().copied().collect(),
            probed: Mutex::new(Vec::new()),
        }
    }

    pub fn probed_hosts(&self) -> Vec<IpAddr> {
        let mut hosts = self.probed.lock().unwrap().clone();
        hosts.sort();
        hosts.dedup();
        hosts
    }
}

#[async_trait]
impl PortProber for MapProber {
    async fn probe_port(&self, ip: IpAddr, port: Port) -> PortResult {
        self.probed.lock().unwrap().push(ip);
        match self.states.get(&port.as_u16()) {
            Some(&state) => PortResult::new(port, state),
            None => PortResult::new(port, PortState::Filtered).with_diagnostic("no stub response"),
        }
    }
}

/// Tracks how many probes run at once.
#[derive(Default)]
pub struct CountingProber {
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: AtomicUsize,
}

impl CountingProber {
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PortProber for CountingProber {
    async fn probe_port(&self, _ip: IpAddr, port: Port) -> PortResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(5)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        PortResult::new(port, PortState::Closed)
    }
}

/// Fixed per-host liveness; unknown hosts are unreachable.
pub struct StubLiveness {
    alive: HashMap<IpAddr, Liveness>,
    max_delay_ms: u64,
}

impl StubLiveness {
    pub fn alive(hosts: &[&str]) -> Self {
        Self {
            alive: hosts
                .iter()
                .map(|h| (h.parse().unwrap(), Liveness::Alive))
                .collect(),
            max_delay_ms: 0,
        }
    }

    pub fn with_jitter(mut self, max_delay_ms: u64) -> Self {
        self.max_delay_ms = max_delay_ms;
        self
    }
}

#[async_trait]
impl LivenessProber for StubLiveness {
    async fn probe(&self, ip: IpAddr) -> Liveness {
        if self.max_delay_ms > 0 {
            let delay = rand::thread_rng().gen_range(0..=self.max_delay_ms);
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        self.alive.get(&ip).copied().unwrap_or(Liveness::Unreachable)
    }

    fn method(&self) -> &'static str {
        "stub"
    }
}

/// Reports every host alive after a fixed delay, counting finished checks.
pub struct SlowLiveness {
    delay_ms: u64,
    finished: AtomicUsize,
}

impl SlowLiveness {
    pub fn new(delay_ms: u64) -> Self {
        Self {
            delay_ms,
            finished: AtomicUsize::new(0),
        }
    }

    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LivenessProber for SlowLiveness {
    async fn probe(&self, _ip: IpAddr) -> Liveness {
        tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
        self.finished.fetch_add(1, Ordering::SeqCst);
        Liveness::Alive
    }

    fn method(&self) -> &'static str {
        "slow"
    }
}
