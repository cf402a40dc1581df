//! Scan subcommand implementation.
//!
//! Handles the `voidscan scan <targets>` command.

use crate::config::ScanSpeed;
use crate::error::{CliError, CliResult};
use crate::output::{self, ReportFormat};
use crate::scanner::ScanOptions;
use crate::service::ScanService;
use crate::types::PortSpec;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Scan targets for open ports.
#[derive(Parser, Debug)]
pub struct ScanCommand {
    /// Targets to scan, comma separated
    ///
    /// Examples:
    ///   192.168.1.1              Single IP address
    ///   example.com              Hostname
    ///   192.168.1.0/24           CIDR range
    ///   192.168.1.1-50           Last-octet range
    ///   10.0.0.1,10.0.0.7        List
    #[arg(value_name = "TARGETS")]
    pub targets: String,

    /// Ports to scan (e.g., "80", "80,443", "1-1000", "22,80,443,8000-9000")
    #[arg(short, long)]
    pub ports: Option<String>,

    /// Timing preset
    #[arg(long, value_enum)]
    pub speed: Option<ScanSpeed>,

    /// Per-port connect timeout in milliseconds, overrides --speed
    #[arg(short = 't', long = "timeout", value_name = "MS")]
    pub timeout_ms: Option<u64>,

    /// Targets scanned at once
    #[arg(long, value_name = "N")]
    pub host_concurrency: Option<usize>,

    /// Port probes in flight per target
    #[arg(long, value_name = "N")]
    pub port_concurrency: Option<usize>,

    /// Rate limit in probes per second (0 = unlimited)
    #[arg(long = "rate", value_name = "N")]
    pub rate_limit: Option<u32>,

    /// Skip liveness probing and port scan every target
    #[arg(long)]
    pub assume_alive: bool,

    /// Don't save scan results
    #[arg(long)]
    pub no_save: bool,

    /// Output format for results
    #[arg(short, long, value_enum, default_value = "plain")]
    pub output: ReportFormat,
}

impl ScanCommand {
    /// Merge flags over the settings-derived defaults.
    pub fn options(&self, service: &ScanService) -> CliResult<ScanOptions> {
        let mut options = service.default_options();

        if let Some(ms) = self.timeout_ms {
            options.port_timeout = Duration::from_millis(ms);
        } else if let Some(speed) = self.speed {
            options.port_timeout = speed.port_timeout();
        }
        if let Some(n) = self.host_concurrency {
            options.host_concurrency = n;
        }
        if let Some(n) = self.port_concurrency {
            options.port_concurrency = n;
        }
        if let Some(rate) = self.rate_limit {
            options.rate_limit = rate;
        }
        options.assume_alive |= self.assume_alive;
        options.save = !self.no_save;

        if options.port_timeout.is_zero() {
            return Err(CliError::Other("timeout must be greater than zero".to_string()));
        }
        if options.host_concurrency == 0 || options.port_concurrency == 0 {
            return Err(CliError::Other("concurrency must be at least 1".to_string()));
        }
        Ok(options)
    }

    /// Execute the scan command.
    pub async fn execute(
        &self,
        service: &ScanService,
        cancel: &CancellationToken,
        quiet: bool,
    ) -> CliResult<()> {
        let ports_str = self
            .ports
            .clone()
            .unwrap_or_else(|| service.settings().default_ports.clone());
        let port_spec: PortSpec = ports_str.parse()?;
        let targets = service.resolve_targets(&self.targets)?;
        let options = self.options(service)?;

        let liveness = service.liveness_prober(&options);

        let interactive = !quiet && self.output == ReportFormat::Plain;
        if interactive {
            output::print_scan_header(targets.len(), port_spec.len(), liveness.method());
        }

        let progress = interactive.then(|| {
            let pb = ProgressBar::new((targets.len() * port_spec.len()) as u64);
            if let Ok(style) = ProgressStyle::default_bar().template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}",
            ) {
                pb.set_style(style.progress_chars("=>-"));
            }
            pb
        });

        let report = service
            .run_scan_with_progress(
                &targets,
                port_spec.ports(),
                options,
                liveness,
                cancel,
                progress.clone(),
            )
            .await;

        if let Some(pb) = progress {
            pb.finish_and_clear();
        }

        output::format_report(&report, self.output)?;

        if self.output != ReportFormat::Plain {
            for (target, reason) in report.save_failures() {
                output::print_warning(&format!("could not save {}: {}", target, reason));
            }
        }
        if report.was_cancelled() {
            output::print_warning(&format!(
                "scan interrupted, {} targets cancelled and not saved",
                report.count(crate::scanner::TargetState::Cancelled)
            ));
        }

        Ok(())
    }
}
