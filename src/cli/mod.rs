//! CLI subcommand definitions and handlers.
//!
//! Implements a git-like subcommand architecture:
//! - `voidscan scan <targets>` - Scan targets for open ports
//! - `voidscan history` - List saved scans
//! - `voidscan show <ref|target>` - Display one saved scan

mod history;
mod scan;
mod show;

pub use history::HistoryCommand;
pub use scan::ScanCommand;
pub use show::ShowCommand;

use crate::config::AppSettings;
use crate::error::CliResult;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// voidscan - a concurrent host and port scanner.
///
/// Expands target lists, ranges and CIDR blocks, checks which hosts are
/// alive, TCP connect scans the live ones and keeps every result as a JSON
/// file for later review.
#[derive(Parser, Debug)]
#[command(name = "voidscan")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "A concurrent host and port scanner", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output and debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Path to a settings file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Directory holding saved scan records
    #[arg(long, global = true, value_name = "DIR")]
    pub results_dir: Option<PathBuf>,
}

impl Cli {
    /// Load settings and apply global overrides.
    pub fn settings(&self) -> CliResult<AppSettings> {
        let mut settings = AppSettings::load(self.config.as_deref())?;
        if let Some(dir) = &self.results_dir {
            settings.results_dir = Some(dir.clone());
        }
        Ok(settings)
    }
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan targets for open ports
    #[command(alias = "s")]
    Scan(ScanCommand),

    /// List saved scans, most recent first
    #[command(alias = "h")]
    History(HistoryCommand),

    /// Display one saved scan
    Show(ShowCommand),
}
