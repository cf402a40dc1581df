//! History subcommand implementation.

use crate::error::CliResult;
use crate::output;
use crate::service::ScanService;
use clap::Parser;

/// List saved scans, most recent first.
#[derive(Parser, Debug)]
pub struct HistoryCommand {
    /// Number of recent scans to show
    #[arg(short = 'n', long, default_value = "10")]
    pub count: usize,
}

impl HistoryCommand {
    pub fn execute(&self, service: &ScanService) -> CliResult<()> {
        let mut entries = service.load_all_results()?;
        entries.truncate(self.count);
        output::print_history(&entries)?;
        Ok(())
    }
}
