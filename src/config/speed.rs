//! Timing presets.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Named per-port timeout presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ScanSpeed {
    /// 500 ms per port; misses slow or distant hosts.
    Fast,
    /// 1 s per port.
    #[default]
    Normal,
    /// 2 s per port, for lossy or rate-limited links.
    Slow,
}

impl ScanSpeed {
    pub fn port_timeout(self) -> Duration {
        match self {
            Self::Fast => Duration::from_millis(500),
            Self::Normal => Duration::from_secs(1),
            Self::Slow => Duration::from_secs(2),
        }
    }
}

impl fmt::Display for ScanSpeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fast => write!(f, "fast"),
            Self::Normal => write!(f, "normal"),
            Self::Slow => write!(f, "slow"),
        }
    }
}

impl FromStr for ScanSpeed {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fast" => Ok(Self::Fast),
            "normal" => Ok(Self::Normal),
            "slow" => Ok(Self::Slow),
            _ => Err(format!("unknown scan speed: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speed_timeouts_increase() {
        assert!(ScanSpeed::Fast.port_timeout() < ScanSpeed::Normal.port_timeout());
        assert!(ScanSpeed::Normal.port_timeout() < ScanSpeed::Slow.port_timeout());
    }

    #[test]
    fn test_speed_from_str() {
        assert_eq!("FAST".parse::<ScanSpeed>().unwrap(), ScanSpeed::Fast);
        assert_eq!("slow".parse::<ScanSpeed>().unwrap(), ScanSpeed::Slow);
        assert!("warp".parse::<ScanSpeed>().is_err());
    }
}
