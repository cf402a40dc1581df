//! Scanner module - probing primitives and the concurrent port scanner.
//!
//! [`PortScanner`] fans one target's ports out over a [`PortProber`] with a
//! bounded number of probes in flight, and reassembles results in ascending
//! port order. [`orchestrator`] drives whole target sets through liveness,
//! port scanning and persistence.

pub mod icmp;
pub mod orchestrator;
pub mod rate_limiter;
pub mod tcp;
pub mod traits;

#[cfg(test)]
pub(crate) mod testing;

use crate::types::Port;
use futures::stream::{self, StreamExt};
use indicatif::ProgressBar;
use std::net::IpAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub use icmp::{detect_liveness_prober, IcmpProber};
pub use orchestrator::{Orchestrator, ScanOptions, ScanReport, SaveStatus, TargetReport, TargetState};
pub use rate_limiter::RateLimiter;
pub use tcp::{TcpConnectProber, TcpPingProber};
pub use traits::{AssumeAlive, Liveness, LivenessProber, PortProber, PortResult, PortState};

/// Scans the ports of one host with bounded concurrency.
#[derive(Clone)]
pub struct PortScanner {
    prober: Arc<dyn PortProber>,
    concurrency: usize,
    rate_limiter: Option<RateLimiter>,
    progress: Option<ProgressBar>,
}

impl PortScanner {
    /// Create a scanner allowing at most `concurrency` probes in flight.
    pub fn new(prober: Arc<dyn PortProber>, concurrency: usize) -> Self {
        Self {
            prober,
            concurrency: concurrency.max(1),
            rate_limiter: None,
            progress: None,
        }
    }

    /// Share a probes-per-second limiter with this scanner.
    pub fn with_rate_limiter(mut self, limiter: Option<RateLimiter>) -> Self {
        self.rate_limiter = limiter;
        self
    }

    /// Advance `progress` by one for every finished probe.
    pub fn with_progress(mut self, progress: Option<ProgressBar>) -> Self {
        self.progress = progress;
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Probe every port of `ip`.
    ///
    /// Returns exactly one result per distinct requested port, sorted by port
    /// number regardless of completion order.
    pub async fn scan(&self, ip: IpAddr, ports: &[Port]) -> Vec<PortResult> {
        self.run(ip, ports, &CancellationToken::new())
            .await
            .into_iter()
            .filter_map(|(_, result)| result)
            .collect()
    }

    /// Like [`scan`](Self::scan), but stops issuing probes once `cancel`
    /// fires. Probes already in flight run to completion or timeout.
    ///
    /// Returns `None` when cancellation left any port unprobed.
    pub async fn scan_until(
        &self,
        ip: IpAddr,
        ports: &[Port],
        cancel: &CancellationToken,
    ) -> Option<Vec<PortResult>> {
        self.run(ip, ports, cancel)
            .await
            .into_iter()
            .map(|(_, result)| result)
            .collect()
    }

    async fn run(
        &self,
        ip: IpAddr,
        ports: &[Port],
        cancel: &CancellationToken,
    ) -> Vec<(Port, Option<PortResult>)> {
        let mut ports = ports.to_vec();
        ports.sort_unstable();
        ports.dedup();

        // buffer_unordered caps the number of probes (and sockets) in flight.
        let mut results: Vec<(Port, Option<PortResult>)> = stream::iter(ports)
            .map(|port| {
                let prober = Arc::clone(&self.prober);
                let limiter = self.rate_limiter.clone();
                let progress = self.progress.clone();
                let cancel = cancel.clone();

                async move {
                    if let Some(limiter) = limiter {
                        tokio::select! {
                            _ = limiter.wait() => {}
                            _ = cancel.cancelled() => return (port, None),
                        }
                    }
                    if cancel.is_cancelled() {
                        return (port, None);
                    }

                    let result = prober.probe_port(ip, port).await;

                    if let Some(pb) = progress {
                        pb.inc(1);
                        if result.is_open() {
                            pb.set_message(format!("{}:{} open", ip, port));
                        }
                    }
                    (port, Some(result))
                }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        results.sort_by_key(|(port, _)| *port);
        results
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{ports, CountingProber, JitterProber, MapProber};
    use super::*;
    use std::net::Ipv4Addr;

    const HOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

    #[tokio::test]
    async fn test_results_sorted_regardless_of_completion_order() {
        let requested = ports(&[9999, 22, 80, 443, 1, 65535, 8080]);
        for concurrency in [1, 2, 7, 100] {
            let scanner = PortScanner::new(Arc::new(JitterProber::new(15)), concurrency);
            let results = scanner.scan(HOST, &requested).await;

            let got: Vec<u16> = results.iter().map(|r| r.port.as_u16()).collect();
            assert_eq!(got, vec![1, 22, 80, 443, 8080, 9999, 65535]);
        }
    }

    #[tokio::test]
    async fn test_one_result_per_distinct_port() {
        let scanner = PortScanner::new(Arc::new(JitterProber::new(2)), 4);
        let results = scanner.scan(HOST, &ports(&[80, 80, 22, 22, 443])).await;
        assert_eq!(results.len(), 3);
    }

    #[tokio::test]
    async fn test_states_come_from_prober() {
        let prober = MapProber::new(&[(80, PortState::Open), (22, PortState::Closed)]);
        let scanner = PortScanner::new(Arc::new(prober), 10);

        let results = scanner.scan(HOST, &ports(&[22, 80, 9999])).await;
        let states: Vec<(u16, PortState)> =
            results.iter().map(|r| (r.port.as_u16(), r.state)).collect();
        assert_eq!(
            states,
            vec![
                (22, PortState::Closed),
                (80, PortState::Open),
                (9999, PortState::Filtered)
            ]
        );
        assert!(results[2].diagnostic.is_some());
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let prober = Arc::new(CountingProber::default());
        let scanner = PortScanner::new(prober.clone(), 5);

        let requested: Vec<Port> = (1..=60).filter_map(Port::new).collect();
        let results = scanner.scan(HOST, &requested).await;

        assert_eq!(results.len(), 60);
        assert!(prober.max_in_flight() <= 5);
        assert!(prober.max_in_flight() >= 2);
    }

    #[tokio::test]
    async fn test_cancelled_scan_returns_none() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let prober = Arc::new(CountingProber::default());
        let scanner = PortScanner::new(prober.clone(), 5);
        let outcome = scanner.scan_until(HOST, &ports(&[1, 2, 3]), &cancel).await;

        assert!(outcome.is_none());
        assert_eq!(prober.calls(), 0);
    }

    #[tokio::test]
    async fn test_scan_until_completes_without_cancel() {
        let scanner = PortScanner::new(Arc::new(JitterProber::new(1)), 5);
        let outcome = scanner
            .scan_until(HOST, &ports(&[3, 1, 2]), &CancellationToken::new())
            .await;
        assert_eq!(outcome.map(|r| r.len()), Some(3));
    }

    #[tokio::test]
    async fn test_zero_concurrency_still_scans() {
        let scanner = PortScanner::new(Arc::new(JitterProber::new(1)), 0);
        assert_eq!(scanner.concurrency(), 1);
        assert_eq!(scanner.scan(HOST, &ports(&[1, 2])).await.len(), 2);
    }
}
