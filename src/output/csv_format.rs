//! CSV output formatting.

use crate::storage::ScanRecord;
use std::io::{self, Write};

/// Write one row per port of `record` to `writer`.
pub fn write_csv<W: Write>(record: &ScanRecord, writer: W) -> io::Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);

    wtr.write_record(["target", "ip", "timestamp", "port", "state", "latency_ms", "diagnostic"])?;

    let ip = record.ip().map(|ip| ip.to_string()).unwrap_or_default();
    let timestamp = record.timestamp().to_rfc3339();
    for result in record.ports() {
        wtr.write_record([
            record.target().to_string(),
            ip.clone(),
            timestamp.clone(),
            result.port.to_string(),
            result.state.to_string(),
            result.latency_ms.map_or(String::new(), |t| t.to_string()),
            result.diagnostic.clone().unwrap_or_default(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

/// Print results in CSV format.
pub fn print_csv(record: &ScanRecord) -> io::Result<()> {
    write_csv(record, io::stdout().lock())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::{PortResult, PortState};
    use crate::types::Port;
    use chrono::Utc;

    #[test]
    fn test_csv_rows() {
        let ports = vec![
            PortResult::new(Port::new(22).unwrap(), PortState::Open),
            PortResult::new(Port::new(81).unwrap(), PortState::Filtered)
                .with_diagnostic("permission denied, with comma"),
        ];
        let record = ScanRecord::new("10.0.0.1", Utc::now(), ports);

        let mut buf = Vec::new();
        write_csv(&record, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("target,ip,timestamp,port,state"));
        assert!(lines[1].contains(",22,open,"));
        assert!(lines[2].ends_with("\"permission denied, with comma\""));
    }
}
