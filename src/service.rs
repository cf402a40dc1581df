//! Invocation surface shared by the CLI and library callers.
//!
//! [`ScanService`] owns the settings and the result store and builds the
//! probers for each scan.

use crate::config::AppSettings;
use crate::error::{StorageError, StorageResult, TargetError};
use crate::scanner::{
    detect_liveness_prober, AssumeAlive, LivenessProber, Orchestrator, PortProber, ScanOptions,
    ScanReport, TcpConnectProber,
};
use crate::storage::{ResultStore, ScanRecord, StorageRef};
use crate::types::{self, HostResolver, Port, TargetSet};
use indicatif::ProgressBar;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub struct ScanService {
    settings: AppSettings,
    store: ResultStore,
    resolver: HostResolver,
}

impl ScanService {
    pub fn new(settings: AppSettings) -> Self {
        let store = ResultStore::new(settings.results_dir());
        Self {
            settings,
            store,
            resolver: HostResolver::new(),
        }
    }

    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    pub fn store(&self) -> &ResultStore {
        &self.store
    }

    /// Scan options seeded from the settings.
    pub fn default_options(&self) -> ScanOptions {
        ScanOptions {
            host_concurrency: self.settings.host_concurrency,
            port_concurrency: self.settings.port_concurrency,
            port_timeout: self.settings.port_timeout(),
            liveness_timeout: self.settings.liveness_timeout(),
            liveness_ports: self.settings.liveness_ports.clone(),
            assume_alive: self.settings.assume_alive,
            rate_limit: self.settings.rate_limit,
            save: true,
        }
    }

    /// Expand a target specification. Fails before any network activity.
    pub fn resolve_targets(&self, spec: &str) -> Result<TargetSet, TargetError> {
        types::resolve(spec)
    }

    /// Liveness prober for `options`: none when hosts are assumed alive,
    /// otherwise ICMP echo or its TCP connect fallback.
    pub fn liveness_prober(&self, options: &ScanOptions) -> Arc<dyn LivenessProber> {
        if options.assume_alive {
            Arc::new(AssumeAlive)
        } else {
            detect_liveness_prober(options.liveness_timeout, options.liveness_ports.clone())
        }
    }

    /// Scan `targets` with the default TCP connect and liveness probers.
    pub async fn run_scan(
        &self,
        targets: &TargetSet,
        ports: &[Port],
        options: ScanOptions,
        cancel: &CancellationToken,
    ) -> ScanReport {
        let liveness = self.liveness_prober(&options);
        self.run_scan_with_progress(targets, ports, options, liveness, cancel, None)
            .await
    }

    /// Scan with a caller-chosen liveness prober, advancing `progress` per port.
    pub async fn run_scan_with_progress(
        &self,
        targets: &TargetSet,
        ports: &[Port],
        options: ScanOptions,
        liveness: Arc<dyn LivenessProber>,
        cancel: &CancellationToken,
        progress: Option<ProgressBar>,
    ) -> ScanReport {
        let prober: Arc<dyn PortProber> = Arc::new(TcpConnectProber::new(options.port_timeout));

        let mut orchestrator = Orchestrator::new(liveness, prober, options)
            .with_resolver(self.resolver.clone())
            .with_store(self.store.clone());
        if let Some(pb) = progress {
            orchestrator = orchestrator.with_progress(pb);
        }
        orchestrator.run(targets, ports, cancel).await
    }

    /// Stored record references, most recent first.
    pub fn list_results(&self) -> StorageResult<Vec<StorageRef>> {
        self.store.list()
    }

    /// Load a record by its reference string.
    pub fn load_result(&self, reference: &str) -> StorageResult<ScanRecord> {
        let reference: StorageRef = reference.parse()?;
        self.store.load(&reference)
    }

    /// Every stored record, with per-record errors.
    pub fn load_all_results(
        &self,
    ) -> StorageResult<Vec<(StorageRef, StorageResult<ScanRecord>)>> {
        self.store.load_all()
    }

    /// Most recent record for a target address.
    pub fn latest_result(&self, target: &str) -> StorageResult<(StorageRef, ScanRecord)> {
        self.store.latest_for(target)
    }

    /// Load by reference when `key` is one, otherwise by target address.
    pub fn find_result(&self, key: &str) -> StorageResult<(StorageRef, ScanRecord)> {
        match key.parse::<StorageRef>() {
            Ok(reference) => {
                let record = self.store.load(&reference)?;
                Ok((reference, record))
            }
            Err(StorageError::InvalidRef(_)) => self.latest_result(key),
            Err(e) => Err(e),
        }
    }
}
