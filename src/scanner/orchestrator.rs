//! Drives a target set through resolution, liveness, port scanning and
//! persistence.
//!
//! Each target runs its own state machine in a task, bounded by a host
//! semaphore. Records are written only once every target has reached a
//! terminal state.

use crate::scanner::traits::{Liveness, LivenessProber, PortProber, PortResult};
use crate::scanner::{PortScanner, RateLimiter};
use crate::storage::{ResultStore, ScanRecord, StorageRef};
use crate::types::{HostResolver, Port, TargetSet};
use chrono::{DateTime, Utc};
use indicatif::ProgressBar;
use serde::Serialize;
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Lifecycle of one target within a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetState {
    Pending,
    Resolving,
    Probing,
    Unreachable,
    PortScanning,
    Completed,
    Cancelled,
}

impl TargetState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Unreachable | Self::Completed | Self::Cancelled)
    }
}

impl fmt::Display for TargetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Resolving => "resolving",
            Self::Probing => "probing",
            Self::Unreachable => "unreachable",
            Self::PortScanning => "port-scanning",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Tuning for one orchestrated scan.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanOptions {
    /// Targets in flight at once.
    pub host_concurrency: usize,
    /// Port probes in flight per target.
    pub port_concurrency: usize,
    pub port_timeout: Duration,
    pub liveness_timeout: Duration,
    /// Ports used by the TCP liveness fallback.
    pub liveness_ports: Vec<u16>,
    pub assume_alive: bool,
    /// Probes per second across all targets, 0 for unlimited.
    pub rate_limit: u32,
    /// Persist one record per completed target.
    pub save: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            host_concurrency: 16,
            port_concurrency: 100,
            port_timeout: Duration::from_secs(1),
            liveness_timeout: Duration::from_secs(1),
            liveness_ports: vec![80, 443],
            assume_alive: false,
            rate_limit: 0,
            save: true,
        }
    }
}

/// Outcome of persisting one target.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum SaveStatus {
    /// Not saved: saving disabled, or the target did not complete.
    NotAttempted,
    Saved(StorageRef),
    Failed(String),
}

/// Final state of one target.
#[derive(Debug, Clone, Serialize)]
pub struct TargetReport {
    pub address: String,
    pub ip: Option<IpAddr>,
    pub state: TargetState,
    pub liveness: Liveness,
    pub ports: Vec<PortResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub save: SaveStatus,
}

impl TargetReport {
    fn pending(address: String) -> Self {
        Self {
            address,
            ip: None,
            state: TargetState::Pending,
            liveness: Liveness::Unknown,
            ports: Vec::new(),
            diagnostic: None,
            started_at: Utc::now(),
            duration_ms: 0,
            save: SaveStatus::NotAttempted,
        }
    }

    fn enter(&mut self, state: TargetState) {
        debug!(target = %self.address, from = %self.state, to = %state, "target state");
        self.state = state;
    }

    fn finish(mut self, state: TargetState, started: Instant) -> Self {
        self.enter(state);
        self.duration_ms = started.elapsed().as_millis() as u64;
        self
    }

    fn with_diagnostic(mut self, diagnostic: impl Into<String>) -> Self {
        self.diagnostic = Some(diagnostic.into());
        self
    }

    pub fn open_ports(&self) -> impl Iterator<Item = &PortResult> {
        self.ports.iter().filter(|p| p.is_open())
    }

    fn to_record(&self) -> ScanRecord {
        let mut record = ScanRecord::new(&self.address, self.started_at, self.ports.clone())
            .with_liveness(self.liveness)
            .with_duration_ms(self.duration_ms);
        if let Some(ip) = self.ip {
            record = record.with_ip(ip);
        }
        record
    }
}

/// Aggregated outcome of a scan, in target-set order.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub targets: Vec<TargetReport>,
    pub duration_ms: u64,
}

impl ScanReport {
    pub fn count(&self, state: TargetState) -> usize {
        self.targets.iter().filter(|t| t.state == state).count()
    }

    pub fn was_cancelled(&self) -> bool {
        self.count(TargetState::Cancelled) > 0
    }

    pub fn save_failures(&self) -> impl Iterator<Item = (&str, &str)> {
        self.targets.iter().filter_map(|t| match &t.save {
            SaveStatus::Failed(reason) => Some((t.address.as_str(), reason.as_str())),
            _ => None,
        })
    }
}

struct TargetContext {
    resolver: HostResolver,
    liveness: Arc<dyn LivenessProber>,
    scanner: PortScanner,
    ports: Vec<Port>,
    progress: Option<ProgressBar>,
}

/// Runs whole scans over a [`TargetSet`].
pub struct Orchestrator {
    liveness: Arc<dyn LivenessProber>,
    prober: Arc<dyn PortProber>,
    resolver: HostResolver,
    store: Option<ResultStore>,
    options: ScanOptions,
    progress: Option<ProgressBar>,
}

impl Orchestrator {
    pub fn new(
        liveness: Arc<dyn LivenessProber>,
        prober: Arc<dyn PortProber>,
        options: ScanOptions,
    ) -> Self {
        Self {
            liveness,
            prober,
            resolver: HostResolver::new(),
            store: None,
            options,
            progress: None,
        }
    }

    /// Where completed targets are saved. Without a store nothing is saved.
    pub fn with_store(mut self, store: ResultStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_resolver(mut self, resolver: HostResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Advance `progress` once per port, including ports of skipped targets.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Scan every target and return one report per target, in set order.
    pub async fn run(
        &self,
        targets: &TargetSet,
        ports: &[Port],
        cancel: &CancellationToken,
    ) -> ScanReport {
        let started = Instant::now();

        let mut ports = ports.to_vec();
        ports.sort_unstable();
        ports.dedup();

        let scanner = PortScanner::new(Arc::clone(&self.prober), self.options.port_concurrency)
            .with_rate_limiter(RateLimiter::per_second(self.options.rate_limit))
            .with_progress(self.progress.clone());
        let context = Arc::new(TargetContext {
            resolver: self.resolver.clone(),
            liveness: Arc::clone(&self.liveness),
            scanner,
            ports,
            progress: self.progress.clone(),
        });

        debug!(
            targets = targets.len(),
            ports = context.ports.len(),
            host_concurrency = self.options.host_concurrency,
            port_concurrency = self.options.port_concurrency,
            liveness = self.liveness.method(),
            "starting scan"
        );

        let host_semaphore = Arc::new(Semaphore::new(self.options.host_concurrency.max(1)));
        let mut join_set: JoinSet<(usize, TargetReport)> = JoinSet::new();

        for (index, address) in targets.iter().enumerate() {
            let report = TargetReport::pending(address.to_string());
            let context = Arc::clone(&context);
            let semaphore = Arc::clone(&host_semaphore);
            let cancel = cancel.clone();

            join_set.spawn(async move {
                let permit = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    permit = semaphore.acquire_owned() => permit.ok(),
                };
                let report = match permit {
                    Some(_permit) => scan_target(&context, report, &cancel).await,
                    None => report.finish(TargetState::Cancelled, Instant::now()),
                };
                (index, report)
            });
        }

        let mut slots: Vec<Option<TargetReport>> = vec![None; targets.len()];
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, report)) => slots[index] = Some(report),
                Err(e) => warn!("target task failed: {}", e),
            }
        }

        let mut reports: Vec<TargetReport> = slots
            .into_iter()
            .zip(targets.iter())
            .map(|(slot, address)| {
                slot.unwrap_or_else(|| {
                    TargetReport::pending(address.to_string())
                        .finish(TargetState::Cancelled, Instant::now())
                        .with_diagnostic("scan task failed")
                })
            })
            .collect();

        if self.options.save {
            if let Some(store) = &self.store {
                save_completed(store.clone(), &mut reports).await;
            }
        }

        ScanReport {
            targets: reports,
            duration_ms: started.elapsed().as_millis() as u64,
        }
    }
}

async fn scan_target(
    context: &TargetContext,
    mut report: TargetReport,
    cancel: &CancellationToken,
) -> TargetReport {
    let started = Instant::now();
    report.started_at = Utc::now();
    let skip_progress = |n: usize| {
        if let Some(pb) = &context.progress {
            pb.inc(n as u64);
        }
    };

    // Each stage is bounded by its own timeout, so a stage already started
    // runs to completion and cancellation is observed between stages.
    if cancel.is_cancelled() {
        return report.finish(TargetState::Cancelled, started);
    }
    report.enter(TargetState::Resolving);
    let ip = match context.resolver.resolve(&report.address).await {
        Ok(ip) => ip,
        Err(e) => {
            skip_progress(context.ports.len());
            return report
                .finish(TargetState::Unreachable, started)
                .with_diagnostic(e.to_string());
        }
    };
    report.ip = Some(ip);
    if cancel.is_cancelled() {
        return report.finish(TargetState::Cancelled, started);
    }

    report.enter(TargetState::Probing);
    report.liveness = context.liveness.probe(ip).await;
    if cancel.is_cancelled() {
        return report.finish(TargetState::Cancelled, started);
    }
    if report.liveness == Liveness::Unreachable {
        skip_progress(context.ports.len());
        return report
            .finish(TargetState::Unreachable, started)
            .with_diagnostic(format!("no reply to {} probe", context.liveness.method()));
    }

    report.enter(TargetState::PortScanning);
    match context.scanner.scan_until(ip, &context.ports, cancel).await {
        Some(ports) => {
            report.ports = ports;
            report.finish(TargetState::Completed, started)
        }
        None => report.finish(TargetState::Cancelled, started),
    }
}

/// Write records for completed targets on the blocking pool.
async fn save_completed(store: ResultStore, reports: &mut [TargetReport]) {
    let records: Vec<(usize, ScanRecord)> = reports
        .iter()
        .enumerate()
        .filter(|(_, r)| r.state == TargetState::Completed)
        .map(|(index, r)| (index, r.to_record()))
        .collect();
    if records.is_empty() {
        return;
    }
    let indices: Vec<usize> = records.iter().map(|(index, _)| *index).collect();

    let written = tokio::task::spawn_blocking(move || {
        records
            .into_iter()
            .map(|(index, record)| (index, store.save(&record)))
            .collect::<Vec<_>>()
    })
    .await;

    match written {
        Ok(written) => {
            for (index, result) in written {
                let report = &mut reports[index];
                report.save = match result {
                    Ok(reference) => SaveStatus::Saved(reference),
                    Err(e) => {
                        warn!(target = %report.address, error = %e, "failed to save scan record");
                        SaveStatus::Failed(e.to_string())
                    }
                };
            }
        }
        Err(e) => {
            warn!(error = %e, "save task failed");
            for index in indices {
                reports[index].save = SaveStatus::Failed("save task failed".to_string());
            }
        }
    }
}
