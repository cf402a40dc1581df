//! Target specification parsing and hostname resolution.
//!
//! Provides flexible target parsing supporting:
//! - Single IP addresses (IPv4 and IPv6)
//! - Hostnames (scanme.example.org, localhost)
//! - CIDR notation (192.168.1.0/24)
//! - Last-octet dash ranges (192.168.1.10-20, 192.168.1.10-192.168.1.20)
//! - Comma-separated lists of the above

use crate::error::TargetError;
use ipnetwork::IpNetwork;
use std::collections::HashSet;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;
use trust_dns_resolver::config::{ResolverConfig, ResolverOpts};
use trust_dns_resolver::TokioAsyncResolver;

/// One entry of a target specification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetEntry {
    /// A single IP address.
    Single(IpAddr),
    /// A hostname, resolved when the target is scanned.
    Hostname(String),
    /// A CIDR network range.
    Cidr(IpNetwork),
    /// An inclusive range over the last IPv4 octet.
    Range { start: Ipv4Addr, end: u8 },
}

impl TargetEntry {
    /// Maximum number of hosts allowed in a CIDR range.
    pub const MAX_CIDR_HOSTS: u128 = 65536;

    /// Parse a single entry (no commas).
    pub fn parse(s: &str) -> Result<Self, TargetError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(TargetError::invalid(s, "empty target"));
        }

        if let Ok(ip) = s.parse::<IpAddr>() {
            return Ok(Self::Single(ip));
        }

        if s.contains('/') {
            let network: IpNetwork = s
                .parse()
                .map_err(|e| TargetError::invalid(s, format!("bad CIDR block: {}", e)))?;
            let host_count = cidr_size(&network);
            if host_count > Self::MAX_CIDR_HOSTS {
                return Err(TargetError::invalid(
                    s,
                    format!(
                        "CIDR block holds {} addresses (max {})",
                        host_count,
                        Self::MAX_CIDR_HOSTS
                    ),
                ));
            }
            return Ok(Self::Cidr(network));
        }

        if let Some((left, right)) = s.split_once('-') {
            if let Ok(start) = left.trim().parse::<Ipv4Addr>() {
                return parse_range(s, start, right.trim());
            }
        }

        if is_valid_hostname(s) {
            return Ok(Self::Hostname(s.to_ascii_lowercase()));
        }

        Err(TargetError::invalid(
            s,
            "expected an IP address, hostname, CIDR block or range like 192.168.1.1-20",
        ))
    }

    /// Expand this entry into address strings, ascending within ranges.
    fn addresses(&self) -> Vec<String> {
        match self {
            Self::Single(ip) => vec![ip.to_string()],
            Self::Hostname(name) => vec![name.clone()],
            Self::Cidr(network) => network
                .iter()
                .filter(|ip| {
                    // Network and broadcast addresses are not hosts below /31.
                    if let (IpNetwork::V4(net), IpAddr::V4(addr)) = (network, ip) {
                        if net.prefix() < 31 {
                            return *addr != net.network() && *addr != net.broadcast();
                        }
                    }
                    true
                })
                .map(|ip| ip.to_string())
                .collect(),
            Self::Range { start, end } => {
                let [a, b, c, first] = start.octets();
                (first..=*end)
                    .map(|d| Ipv4Addr::new(a, b, c, d).to_string())
                    .collect()
            }
        }
    }
}

impl fmt::Display for TargetEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(ip) => write!(f, "{}", ip),
            Self::Hostname(hostname) => write!(f, "{}", hostname),
            Self::Cidr(network) => write!(f, "{}", network),
            Self::Range { start, end } => write!(f, "{}-{}", start, end),
        }
    }
}

fn cidr_size(network: &IpNetwork) -> u128 {
    match network {
        IpNetwork::V4(net) => 1u128 << (32 - u32::from(net.prefix())),
        IpNetwork::V6(net) => {
            let prefix = net.prefix() as u32;
            if prefix == 0 {
                u128::MAX
            } else if prefix >= 128 {
                1
            } else {
                1u128 << (128 - prefix)
            }
        }
    }
}

fn parse_range(spec: &str, start: Ipv4Addr, right: &str) -> Result<TargetEntry, TargetError> {
    let end = if let Ok(octet) = right.parse::<u8>() {
        octet
    } else if let Ok(end_addr) = right.parse::<Ipv4Addr>() {
        if start.octets()[..3] != end_addr.octets()[..3] {
            return Err(TargetError::invalid(
                spec,
                "range bounds must differ only in the last octet",
            ));
        }
        end_addr.octets()[3]
    } else {
        return Err(TargetError::invalid(
            spec,
            format!("range end '{}' is neither an octet nor an IPv4 address", right),
        ));
    };

    if end < start.octets()[3] {
        return Err(TargetError::invalid(spec, "range end is before start"));
    }

    Ok(TargetEntry::Range { start, end })
}

/// Check if a string is an acceptable hostname.
///
/// Requires at least two labels (or `localhost`) and a non-numeric last label,
/// so that bare words and malformed dotted quads are rejected.
fn is_valid_hostname(s: &str) -> bool {
    if s.eq_ignore_ascii_case("localhost") {
        return true;
    }
    if s.is_empty() || s.len() > 253 {
        return false;
    }

    let labels: Vec<&str> = s.trim_end_matches('.').split('.').collect();
    if labels.len() < 2 {
        return false;
    }
    if labels
        .last()
        .map_or(true, |tld| tld.chars().all(|c| c.is_ascii_digit()))
    {
        return false;
    }

    labels.iter().all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
            && !label.starts_with('-')
            && !label.ends_with('-')
    })
}

/// A parsed, comma-separated target specification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSpec {
    entries: Vec<TargetEntry>,
}

impl TargetSpec {
    /// Parse every entry; the first invalid entry fails the whole spec.
    pub fn parse(s: &str) -> Result<Self, TargetError> {
        if s.trim().is_empty() {
            return Err(TargetError::invalid(s, "empty target specification"));
        }
        let entries = s
            .split(',')
            .map(TargetEntry::parse)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { entries })
    }

    /// Expand into a deduplicated [`TargetSet`].
    pub fn to_target_set(&self) -> TargetSet {
        let mut set = TargetSet::default();
        for entry in &self.entries {
            for address in entry.addresses() {
                set.insert(address);
            }
        }
        set
    }
}

impl FromStr for TargetSpec {
    type Err = TargetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Ordered sequence of unique target addresses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetSet {
    addresses: Vec<String>,
    seen: HashSet<String>,
}

impl TargetSet {
    /// Append an address unless it is already present.
    pub fn insert(&mut self, address: impl Into<String>) -> bool {
        let address = address.into();
        if self.seen.insert(address.clone()) {
            self.addresses.push(address);
            true
        } else {
            false
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.addresses.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.addresses
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for TargetSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = Self::default();
        for address in iter {
            set.insert(address);
        }
        set
    }
}

/// Resolve a target specification into a concrete [`TargetSet`].
pub fn resolve(spec: &str) -> Result<TargetSet, TargetError> {
    Ok(TargetSpec::parse(spec)?.to_target_set())
}

/// Turns target addresses into IPs, using DNS for hostnames.
#[derive(Clone)]
pub struct HostResolver {
    resolver: TokioAsyncResolver,
}

impl HostResolver {
    /// Create a resolver using the system configuration, falling back to
    /// public defaults when it cannot be read.
    pub fn new() -> Self {
        let resolver = TokioAsyncResolver::tokio_from_system_conf().unwrap_or_else(|e| {
            tracing::debug!(error = %e, "system resolver config unavailable, using defaults");
            TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default())
        });
        Self { resolver }
    }

    /// Resolve an address string. IP literals never touch DNS.
    pub async fn resolve(&self, address: &str) -> Result<IpAddr, TargetError> {
        if let Ok(ip) = address.parse::<IpAddr>() {
            return Ok(ip);
        }
        if address.eq_ignore_ascii_case("localhost") {
            return Ok(IpAddr::V4(Ipv4Addr::LOCALHOST));
        }

        let response = self
            .resolver
            .lookup_ip(address)
            .await
            .map_err(|e| TargetError::DnsResolutionFailed(address.to_string(), e.to_string()))?;

        // Prefer IPv4, matching what the liveness probe handles best.
        let ips: Vec<IpAddr> = response.iter().collect();
        ips.iter()
            .copied()
            .find(IpAddr::is_ipv4)
            .or_else(|| ips.first().copied())
            .ok_or_else(|| {
                TargetError::DnsResolutionFailed(address.to_string(), "no addresses".to_string())
            })
    }
}

impl Default for HostResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addresses(spec: &str) -> Vec<String> {
        resolve(spec).unwrap().as_slice().to_vec()
    }

    #[test]
    fn test_parse_single_addresses() {
        assert!(matches!(
            TargetEntry::parse("192.168.1.1").unwrap(),
            TargetEntry::Single(IpAddr::V4(_))
        ));
        assert!(matches!(
            TargetEntry::parse("::1").unwrap(),
            TargetEntry::Single(IpAddr::V6(_))
        ));
    }

    #[test]
    fn test_full_dash_range() {
        assert_eq!(
            addresses("192.168.1.1-192.168.1.3"),
            vec!["192.168.1.1", "192.168.1.2", "192.168.1.3"]
        );
    }

    #[test]
    fn test_short_dash_range_count_and_order() {
        for (a, b) in [(0u8, 0u8), (1, 3), (10, 20), (0, 255)] {
            let set = resolve(&format!("10.0.0.{}-{}", a, b)).unwrap();
            assert_eq!(set.len(), (b - a) as usize + 1);
            let octets: Vec<u8> = set
                .iter()
                .map(|s| s.parse::<Ipv4Addr>().unwrap().octets()[3])
                .collect();
            let mut sorted = octets.clone();
            sorted.sort_unstable();
            sorted.dedup();
            assert_eq!(octets, sorted);
        }
    }

    #[test]
    fn test_invalid_specs() {
        for spec in [
            "10-5",
            "not-an-ip",
            "192.168.1.10-5",
            "192.168.1.1-192.168.2.3",
            "192.168.1.300",
            "10.0.0.0/8",
            "0.0.0.0/0",
            "::/0",
            "",
            "192.168.1.1,",
            "192.168.1.1-abc",
        ] {
            assert!(
                matches!(resolve(spec), Err(TargetError::InvalidTargetSpec { .. })),
                "expected {:?} to be rejected",
                spec
            );
        }
    }

    #[test]
    fn test_list_preserves_order_and_dedupes() {
        assert_eq!(
            addresses("10.0.0.5, 10.0.0.1-3, 10.0.0.2, localhost"),
            vec!["10.0.0.5", "10.0.0.1", "10.0.0.2", "10.0.0.3", "localhost"]
        );
    }

    #[test]
    fn test_cidr_excludes_network_and_broadcast() {
        assert_eq!(addresses("192.168.1.0/30"), vec!["192.168.1.1", "192.168.1.2"]);
        assert_eq!(addresses("192.168.1.7/32"), vec!["192.168.1.7"]);
    }

    #[test]
    fn test_hostnames() {
        assert!(is_valid_hostname("scanme.example.org"));
        assert!(is_valid_hostname("localhost"));
        assert!(is_valid_hostname("my-server.lan"));
        assert!(!is_valid_hostname("my-server"));
        assert!(!is_valid_hostname("-invalid.com"));
        assert!(!is_valid_hostname("1.2.3.4.5"));
        assert_eq!(addresses("Example.COM"), vec!["example.com"]);
    }

    #[tokio::test]
    async fn test_resolver_short_circuits_literals() {
        let resolver = HostResolver::new();
        assert_eq!(
            resolver.resolve("127.0.0.1").await.unwrap(),
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        );
        assert_eq!(
            resolver.resolve("localhost").await.unwrap(),
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        );
    }
}
