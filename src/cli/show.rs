//! Show subcommand implementation.
//!
//! Handles `voidscan show <ref|target>`, printing one saved scan.

use crate::error::CliResult;
use crate::output::{self, OutputFormat};
use crate::service::ScanService;
use clap::Parser;

/// Display one saved scan.
#[derive(Parser, Debug)]
pub struct ShowCommand {
    /// Record file name, or a target address for its most recent scan
    #[arg(value_name = "REF|TARGET")]
    pub key: String,

    /// Show only open ports
    #[arg(long)]
    pub open_only: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "plain")]
    pub format: OutputFormat,
}

impl ShowCommand {
    pub fn execute(&self, service: &ScanService) -> CliResult<()> {
        let (reference, mut record) = service.find_result(&self.key)?;
        if self.open_only {
            record = record.into_open_only();
        }
        output::format_record(&reference, &record, self.format)?;
        Ok(())
    }
}
