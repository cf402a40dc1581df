//! Output formatting module.
//!
//! Provides formatters for plain text, JSON, and CSV output of scan reports
//! and stored records.

mod csv_format;
mod json_format;
mod plain;

pub use csv_format::{print_csv, write_csv};
pub use json_format::print_json;
pub use plain::{
    print_error, print_history, print_record, print_report, print_scan_header, print_warning,
    HistoryEntry,
};

use crate::scanner::ScanReport;
use crate::storage::{ScanRecord, StorageRef};
use std::io;

/// Output format for results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable plain text
    #[default]
    Plain,
    /// JSON structured output
    Json,
    /// CSV, one row per port
    Csv,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Plain => write!(f, "plain"),
            Self::Json => write!(f, "json"),
            Self::Csv => write!(f, "csv"),
        }
    }
}

/// Output format for a finished scan. CSV is offered per record only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ReportFormat {
    /// Human-readable plain text
    #[default]
    Plain,
    /// JSON structured output
    Json,
}

/// Print a finished scan.
pub fn format_report(report: &ScanReport, format: ReportFormat) -> io::Result<()> {
    match format {
        ReportFormat::Plain => print_report(report),
        ReportFormat::Json => print_json(report),
    }
}

/// Print one stored record.
pub fn format_record(
    reference: &StorageRef,
    record: &ScanRecord,
    format: OutputFormat,
) -> io::Result<()> {
    match format {
        OutputFormat::Plain => print_record(reference, record),
        OutputFormat::Json => print_json(record),
        OutputFormat::Csv => print_csv(record),
    }
}
