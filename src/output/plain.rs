//! Plain text output formatting.
//!
//! Produces human-readable output with colors and formatting.

use crate::error::StorageError;
use crate::scanner::{PortResult, PortState, SaveStatus, ScanReport, TargetReport, TargetState};
use crate::storage::{ScanRecord, StorageRef};
use console::{style, Style};
use std::io::{self, Write};

const RULE: &str = "───────────────────────────────────────────────────────────────";
const BANNER: &str = "═══════════════════════════════════════════════════════════════";

/// Print a finished scan: one block per target, open ports only.
pub fn print_report(report: &ScanReport) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();

    writeln!(out)?;
    writeln!(out, "{}", style(BANNER).cyan())?;
    writeln!(out, "                    {} Scan Results", style("Void").cyan().bold())?;
    writeln!(out, "{}", style(BANNER).cyan())?;

    for target in &report.targets {
        write_target(&mut out, target)?;
    }

    writeln!(out)?;
    writeln!(
        out,
        "  {} {} targets in {:.2}s: {} completed, {} unreachable, {} cancelled",
        style("Summary:").bold(),
        report.targets.len(),
        report.duration_ms as f64 / 1000.0,
        style(report.count(TargetState::Completed)).green().bold(),
        style(report.count(TargetState::Unreachable)).yellow(),
        style(report.count(TargetState::Cancelled)).red(),
    )?;
    writeln!(out, "{}", style(BANNER).cyan())?;
    writeln!(out)?;

    Ok(())
}

fn write_target(out: &mut impl Write, target: &TargetReport) -> io::Result<()> {
    let state_style = match target.state {
        TargetState::Completed => Style::new().green().bold(),
        TargetState::Unreachable => Style::new().yellow(),
        _ => Style::new().red(),
    };

    writeln!(out)?;
    let ip = match target.ip {
        Some(ip) if ip.to_string() != target.address => format!(" ({})", ip),
        _ => String::new(),
    };
    writeln!(
        out,
        "  {}{}  {}",
        style(&target.address).white().bold(),
        ip,
        state_style.apply_to(target.state.to_string())
    )?;
    if let Some(diagnostic) = &target.diagnostic {
        writeln!(out, "    {}", style(diagnostic).dim())?;
    }

    if target.state == TargetState::Completed {
        let open: Vec<&PortResult> = target.open_ports().collect();
        if open.is_empty() {
            writeln!(out, "    {}", style("No open ports.").dim())?;
        } else {
            for result in open {
                writeln!(
                    out,
                    "    {:>6}/tcp  {}  {}",
                    result.port,
                    style("open").green().bold(),
                    style(format_latency(result.latency_ms)).dim()
                )?;
            }
        }
        writeln!(
            out,
            "    {} closed, {} filtered",
            count(&target.ports, PortState::Closed),
            count(&target.ports, PortState::Filtered),
        )?;
    }

    match &target.save {
        SaveStatus::Saved(reference) => {
            writeln!(out, "    {} {}", style("saved as").dim(), reference)?
        }
        SaveStatus::Failed(reason) => writeln!(
            out,
            "    {} {}",
            style("save failed:").red().bold(),
            reason
        )?,
        SaveStatus::NotAttempted => {}
    }
    Ok(())
}

/// Print one stored record with its full port table.
pub fn print_record(reference: &StorageRef, record: &ScanRecord) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();

    writeln!(out)?;
    writeln!(out, "  {} {}", style("Record:").bold(), style(reference).dim())?;
    writeln!(out, "  {} {}", style("Target:").bold(), record.target())?;
    if let Some(ip) = record.ip() {
        writeln!(out, "  {} {}", style("IP Address:").bold(), ip)?;
    }
    writeln!(
        out,
        "  {} {}",
        style("Scanned:").bold(),
        record.timestamp().format("%Y-%m-%d %H:%M:%S UTC")
    )?;
    writeln!(out, "  {} {}", style("Liveness:").bold(), record.liveness())?;
    if let Some(ms) = record.duration_ms() {
        writeln!(out, "  {} {:.2}s", style("Duration:").bold(), ms as f64 / 1000.0)?;
    }
    writeln!(
        out,
        "  {} {} open, {} closed, {} filtered",
        style("Ports:").bold(),
        style(record.count(PortState::Open)).green().bold(),
        style(record.count(PortState::Closed)).red(),
        style(record.count(PortState::Filtered)).yellow()
    )?;
    writeln!(out)?;

    if record.ports().is_empty() {
        writeln!(out, "  {}", style("No ports to display.").dim())?;
        return Ok(());
    }

    writeln!(out, "  {}", style(RULE).dim())?;
    writeln!(
        out,
        "  {:>6}  {:^10}  {:>9}  {}",
        style("PORT").bold(),
        style("STATE").bold(),
        style("LATENCY").bold(),
        style("NOTE").bold()
    )?;
    writeln!(out, "  {}", style(RULE).dim())?;

    for result in record.ports() {
        let state_style = match result.state {
            PortState::Open => Style::new().green().bold(),
            PortState::Closed => Style::new().red(),
            PortState::Filtered => Style::new().yellow(),
        };
        writeln!(
            out,
            "  {:>6}  {:^10}  {:>9}  {}",
            result.port,
            state_style.apply_to(result.state.to_string()),
            format_latency(result.latency_ms),
            style(truncate_string(result.diagnostic.as_deref().unwrap_or(""), 35)).dim()
        )?;
    }
    writeln!(out, "  {}", style(RULE).dim())?;
    writeln!(out)?;

    Ok(())
}

/// One line of `history` output.
pub type HistoryEntry = (StorageRef, Result<ScanRecord, StorageError>);

/// Print stored records, most recent first, with per-record errors inline.
pub fn print_history(entries: &[HistoryEntry]) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();

    if entries.is_empty() {
        writeln!(out, "{}", style("No saved scans.").dim())?;
        return Ok(());
    }

    for (reference, record) in entries {
        match record {
            Ok(record) => writeln!(
                out,
                "  {}  {}",
                style(reference.saved_at().format("%Y-%m-%d %H:%M:%S")).dim(),
                record.summary()
            )?,
            Err(e) => writeln!(
                out,
                "  {}  {} {}",
                style(reference.saved_at().format("%Y-%m-%d %H:%M:%S")).dim(),
                style("unreadable:").red(),
                e
            )?,
        }
        writeln!(out, "      {}", style(reference).dim())?;
    }
    Ok(())
}

/// Print a scan header before scanning begins.
pub fn print_scan_header(targets: usize, ports: usize, liveness: &str) {
    println!();
    println!(
        "{} {} v{}",
        style("Starting").cyan(),
        style("voidscan").cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!(
        "{} Targets: {}",
        style("•").dim(),
        style(targets).white().bold()
    );
    println!(
        "{} Ports per target: {}",
        style("•").dim(),
        style(ports).white().bold()
    );
    println!("{} Liveness: {}", style("•").dim(), style(liveness).yellow());
    println!();
}

/// Print an error message.
pub fn print_error(msg: &str) {
    eprintln!("{} {}", style("Error:").red().bold(), msg);
}

/// Print a warning message.
pub fn print_warning(msg: &str) {
    eprintln!("{} {}", style("Warning:").yellow().bold(), msg);
}

fn count(ports: &[PortResult], state: PortState) -> usize {
    ports.iter().filter(|p| p.state == state).count()
}

fn format_latency(latency_ms: Option<u64>) -> String {
    latency_ms.map(|ms| format!("{} ms", ms)).unwrap_or_default()
}

/// Truncate a string to a maximum length, adding ellipsis if truncated.
fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("hello", 10), "hello");
        assert_eq!(truncate_string("hello world", 8), "hello...");
        assert_eq!(truncate_string("ééééé", 4), "é...");
    }

    #[test]
    fn test_format_latency() {
        assert_eq!(format_latency(Some(12)), "12 ms");
        assert_eq!(format_latency(None), "");
    }
}
