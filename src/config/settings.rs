//! Application settings and paths.
//!
//! Settings are an explicit value handed to the service at construction;
//! nothing here is global.

use crate::config::speed::ScanSpeed;
use crate::error::{ConfigError, ConfigResult};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Results directory used when no platform data directory is known.
pub const FALLBACK_RESULTS_DIR: &str = "scan_results";

/// Application directory paths following the XDG Base Directory Specification.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Configuration directory (~/.config/voidscan)
    pub config_dir: PathBuf,
    /// Data directory (~/.local/share/voidscan)
    pub data_dir: PathBuf,
}

impl Paths {
    /// Locate the platform directories. Does not create them.
    pub fn discover() -> ConfigResult<Self> {
        let project = ProjectDirs::from("org", "voidscan", "voidscan")
            .ok_or(ConfigError::DirectoryNotFound)?;

        Ok(Self {
            config_dir: project.config_dir().to_path_buf(),
            data_dir: project.data_dir().to_path_buf(),
        })
    }

    /// Get the path to the settings file.
    pub fn settings_file(&self) -> PathBuf {
        self.config_dir.join("settings.json")
    }

    /// Get the path to the scan results directory.
    pub fn results_dir(&self) -> PathBuf {
        self.data_dir.join("scan_results")
    }
}

/// Application-wide settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Where scan records are written. Defaults to the platform data dir.
    pub results_dir: Option<PathBuf>,
    /// Targets scanned at once.
    pub host_concurrency: usize,
    /// Port probes in flight per target.
    pub port_concurrency: usize,
    /// Timing preset supplying the port timeout when none is set explicitly.
    pub speed: ScanSpeed,
    /// Per-port connect timeout in milliseconds; overrides `speed`.
    pub port_timeout_ms: Option<u64>,
    /// Liveness probe timeout in milliseconds.
    pub liveness_timeout_ms: u64,
    /// Ports tried by the TCP liveness fallback.
    pub liveness_ports: Vec<u16>,
    /// Skip liveness probing and scan every target.
    pub assume_alive: bool,
    /// Global probe rate (probes per second), 0 for unlimited.
    pub rate_limit: u32,
    /// Port list used when the caller names none; `common` is the built-in list.
    pub default_ports: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            results_dir: None,
            host_concurrency: 16,
            port_concurrency: 100,
            speed: ScanSpeed::Normal,
            port_timeout_ms: None,
            liveness_timeout_ms: 1000,
            liveness_ports: vec![80, 443],
            assume_alive: false,
            rate_limit: 0,
            default_ports: "common".to_string(),
        }
    }
}

impl AppSettings {
    /// Load settings from `path`, or from the default location when `None`.
    ///
    /// A missing default file yields defaults; a missing explicit file is an
    /// error.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let file = match path {
            Some(path) => path.to_path_buf(),
            None => {
                let Ok(paths) = Paths::discover() else {
                    return Ok(Self::default());
                };
                let file = paths.settings_file();
                if !file.exists() {
                    return Ok(Self::default());
                }
                file
            }
        };

        let content = fs::read_to_string(&file).map_err(|e| ConfigError::ReadFailed {
            path: file.clone(),
            reason: e.to_string(),
        })?;

        let settings: Self =
            serde_json::from_str(&content).map_err(|e| ConfigError::InvalidFormat(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject values that would stall or disable scanning.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.host_concurrency == 0 {
            return Err(ConfigError::InvalidValue(
                "host_concurrency must be at least 1".to_string(),
            ));
        }
        if self.port_concurrency == 0 {
            return Err(ConfigError::InvalidValue(
                "port_concurrency must be at least 1".to_string(),
            ));
        }
        if self.port_timeout_ms == Some(0) || self.liveness_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "timeouts must be greater than zero".to_string(),
            ));
        }
        if self.liveness_ports.contains(&0) {
            return Err(ConfigError::InvalidValue(
                "liveness_ports cannot contain port 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Effective per-port timeout.
    pub fn port_timeout(&self) -> Duration {
        self.port_timeout_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| self.speed.port_timeout())
    }

    pub fn liveness_timeout(&self) -> Duration {
        Duration::from_millis(self.liveness_timeout_ms)
    }

    /// Effective results directory.
    pub fn results_dir(&self) -> PathBuf {
        if let Some(dir) = &self.results_dir {
            return dir.clone();
        }
        Paths::discover()
            .map(|paths| paths.results_dir())
            .unwrap_or_else(|_| PathBuf::from(FALLBACK_RESULTS_DIR))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_settings() {
        let settings = AppSettings::default();
        assert_eq!(settings.host_concurrency, 16);
        assert_eq!(settings.port_concurrency, 100);
        assert_eq!(settings.port_timeout(), Duration::from_secs(1));
        assert!(settings.validate().is_ok());
        let ports: crate::types::PortSpec = settings.default_ports.parse().unwrap();
        assert_eq!(ports, crate::types::PortSpec::common());
    }

    #[test]
    fn test_explicit_timeout_overrides_speed() {
        let settings = AppSettings {
            speed: ScanSpeed::Slow,
            port_timeout_ms: Some(250),
            ..AppSettings::default()
        };
        assert_eq!(settings.port_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("settings.json");
        fs::write(&file, r#"{"port_concurrency": 8, "speed": "fast", "results_dir": "/tmp/r"}"#)
            .unwrap();

        let settings = AppSettings::load(Some(&file)).unwrap();
        assert_eq!(settings.port_concurrency, 8);
        assert_eq!(settings.host_concurrency, 16);
        assert_eq!(settings.port_timeout(), Duration::from_millis(500));
        assert_eq!(settings.results_dir(), PathBuf::from("/tmp/r"));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("settings.json");
        fs::write(&file, r#"{"host_concurrency": 0}"#).unwrap();
        assert!(matches!(
            AppSettings::load(Some(&file)),
            Err(ConfigError::InvalidValue(_))
        ));

        fs::write(&file, "not json").unwrap();
        assert!(matches!(
            AppSettings::load(Some(&file)),
            Err(ConfigError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_missing_explicit_file() {
        let tmp = TempDir::new().unwrap();
        assert!(matches!(
            AppSettings::load(Some(&tmp.path().join("absent.json"))),
            Err(ConfigError::ReadFailed { .. })
        ));
    }
}
