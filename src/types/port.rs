//! Port types with validation and parsing.
//!
//! The `Port` newtype ensures values are always valid port numbers (1-65535).
//! `PortSpec` handles user port lists such as `"22,80,8000-8010"`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A validated TCP port number (1-65535).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct Port(u16);

impl Port {
    /// Minimum valid port number.
    pub const MIN: u16 = 1;
    /// Maximum valid port number.
    pub const MAX: u16 = 65535;

    /// Create a new Port from a u16, returning None for port 0.
    #[inline]
    pub const fn new(port: u16) -> Option<Self> {
        if port >= Self::MIN {
            Some(Self(port))
        } else {
            None
        }
    }

    /// Get the raw port number.
    #[inline]
    pub const fn as_u16(self) -> u16 {
        self.0
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u16> for Port {
    type Error = PortError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(PortError::OutOfRange(value as u32))
    }
}

impl From<Port> for u16 {
    fn from(port: Port) -> Self {
        port.0
    }
}

/// Error type for port parsing and validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("port {0} is out of valid range (1-65535)")]
    OutOfRange(u32),
    #[error("invalid port number: {0}")]
    InvalidFormat(String),
    #[error("invalid port range: start ({0}) > end ({1})")]
    InvalidRange(u16, u16),
    #[error("empty port specification")]
    Empty,
}

/// Ports selected by the `common` keyword.
const COMMON_PORTS: &[u16] = &[
    21, 22, 23, 25, 53, 80, 110, 111, 135, 139, 143, 443, 445, 993, 995, 1723, 3306, 3389,
    5432, 5900, 6379, 8080, 8443,
];

/// An ordered port list, sorted ascending with duplicates removed.
///
/// Parses:
/// - Single port: "80"
/// - Comma-separated: "80,443,8080"
/// - Range: "1-1000"
/// - Mixed: "22,80,443,8000-9000"
/// - The built-in list: "common", alone or in a list ("common,8000-8100")
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortSpec {
    ports: Vec<Port>,
}

impl PortSpec {
    /// Build a spec from arbitrary ports; order and duplicates are normalized.
    pub fn from_ports(ports: impl IntoIterator<Item = Port>) -> Self {
        let mut ports: Vec<Port> = ports.into_iter().collect();
        ports.sort_unstable();
        ports.dedup();
        Self { ports }
    }

    /// A short list of commonly exposed TCP services.
    pub fn common() -> Self {
        Self::from_ports(COMMON_PORTS.iter().filter_map(|&p| Port::new(p)))
    }

    pub fn ports(&self) -> &[Port] {
        &self.ports
    }

    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }
}

fn parse_port(s: &str) -> Result<Port, PortError> {
    let value: u32 = s
        .trim()
        .parse()
        .map_err(|_| PortError::InvalidFormat(s.trim().to_string()))?;
    u16::try_from(value)
        .ok()
        .and_then(Port::new)
        .ok_or(PortError::OutOfRange(value))
}

impl FromStr for PortSpec {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(PortError::Empty);
        }

        let mut ports = Vec::new();
        for part in s.split(',') {
            let part = part.trim();
            if part.eq_ignore_ascii_case("common") {
                ports.extend(Self::common().ports);
                continue;
            }
            match part.split_once('-') {
                Some((start, end)) => {
                    let start = parse_port(start)?;
                    let end = parse_port(end)?;
                    if start > end {
                        return Err(PortError::InvalidRange(start.0, end.0));
                    }
                    ports.extend((start.0..=end.0).map(Port));
                }
                None => ports.push(parse_port(part)?),
            }
        }

        Ok(Self::from_ports(ports))
    }
}

impl fmt::Display for PortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Collapse consecutive runs back into ranges.
        let mut parts: Vec<String> = Vec::new();
        let mut iter = self.ports.iter().map(|p| p.0).peekable();
        while let Some(start) = iter.next() {
            let mut end = start;
            while iter.peek() == Some(&(end + 1)) {
                end += 1;
                iter.next();
            }
            if start == end {
                parts.push(start.to_string());
            } else {
                parts.push(format!("{}-{}", start, end));
            }
        }
        write!(f, "{}", parts.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_keyword() {
        let spec: PortSpec = "common".parse().unwrap();
        assert_eq!(spec, PortSpec::common());
        assert!(spec.ports().contains(&Port(22)));
        assert!(!spec.ports().contains(&Port(9999)));

        let mixed: PortSpec = "9999,COMMON".parse().unwrap();
        assert_eq!(mixed.len(), spec.len() + 1);
    }

    #[test]
    fn test_port_validation() {
        assert!(Port::new(0).is_none());
        assert!(Port::new(1).is_some());
        assert!(Port::new(65535).is_some());
    }

    #[test]
    fn test_port_serde_rejects_zero() {
        assert!(serde_json::from_str::<Port>("0").is_err());
        assert_eq!(serde_json::from_str::<Port>("443").unwrap().as_u16(), 443);
    }

    #[test]
    fn test_port_spec_parsing() {
        let spec: PortSpec = "80".parse().unwrap();
        assert_eq!(spec.len(), 1);

        let spec: PortSpec = "1-100".parse().unwrap();
        assert_eq!(spec.len(), 100);

        let spec: PortSpec = "22,80,443,8000-8010".parse().unwrap();
        assert_eq!(spec.len(), 14);
    }

    #[test]
    fn test_port_spec_sorted_and_deduped() {
        let spec: PortSpec = "9999,80,22,80".parse().unwrap();
        let raw: Vec<u16> = spec.ports().iter().map(|p| p.as_u16()).collect();
        assert_eq!(raw, vec![22, 80, 9999]);
    }

    #[test]
    fn test_port_spec_errors() {
        assert_eq!("".parse::<PortSpec>(), Err(PortError::Empty));
        assert_eq!("100-50".parse::<PortSpec>(), Err(PortError::InvalidRange(100, 50)));
        assert_eq!("0".parse::<PortSpec>(), Err(PortError::OutOfRange(0)));
        assert_eq!("70000".parse::<PortSpec>(), Err(PortError::OutOfRange(70000)));
        assert!(matches!("ssh".parse::<PortSpec>(), Err(PortError::InvalidFormat(_))));
    }

    #[test]
    fn test_port_spec_display() {
        let spec: PortSpec = "22,80,81,82,443".parse().unwrap();
        assert_eq!(spec.to_string(), "22,80-82,443");
    }
}
