//! Error types for voidscan.
//!
//! Uses `thiserror` for ergonomic error definitions. Network-level failures
//! ([`ProbeError`]) never leave the scanner; they are folded into port and
//! liveness states. Only malformed input and storage problems reach callers.

use std::path::PathBuf;
use thiserror::Error;

/// Failure of a single network probe.
///
/// Always absorbed into a result state by the scanner.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("connection timed out")]
    Timeout,

    #[error("connection refused")]
    Refused,

    #[error("host or network unreachable: {0}")]
    Unreachable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProbeError {
    /// Classify a connect error by its kind rather than its message, which is
    /// locale dependent.
    pub fn from_connect(err: std::io::Error) -> Self {
        use std::io::ErrorKind;

        match err.kind() {
            ErrorKind::ConnectionRefused | ErrorKind::ConnectionReset => Self::Refused,
            ErrorKind::TimedOut => Self::Timeout,
            ErrorKind::HostUnreachable | ErrorKind::NetworkUnreachable => {
                Self::Unreachable(err.to_string())
            }
            _ => Self::Io(err),
        }
    }
}

/// Errors while turning a target specification into addresses.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TargetError {
    #[error("invalid target specification '{spec}': {reason}")]
    InvalidTargetSpec { spec: String, reason: String },

    #[error("failed to resolve hostname '{0}': {1}")]
    DnsResolutionFailed(String, String),
}

impl TargetError {
    pub(crate) fn invalid(spec: &str, reason: impl Into<String>) -> Self {
        Self::InvalidTargetSpec {
            spec: spec.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result store errors. Reported per record, never for the whole listing.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("scan record not found: {0}")]
    RecordNotFound(String),

    #[error("scan record {name} is corrupt: {reason}")]
    RecordCorrupt { name: String, reason: String },

    #[error("failed to write {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid storage reference: {0}")]
    InvalidRef(String),

    #[error("failed to encode scan record: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not determine configuration directory")]
    DirectoryNotFound,

    #[error("failed to read config from {path}: {reason}")]
    ReadFailed { path: PathBuf, reason: String },

    #[error("invalid config format: {0}")]
    InvalidFormat(String),

    #[error("invalid setting: {0}")]
    InvalidValue(String),
}

/// Top-level error for the command-line front end.
#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Target(#[from] TargetError),

    #[error(transparent)]
    Port(#[from] crate::types::PortError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type ProbeResult<T> = Result<T, ProbeError>;
pub type StorageResult<T> = Result<T, StorageError>;
pub type ConfigResult<T> = Result<T, ConfigError>;
pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_connect_error_classification() {
        let refused = io::Error::from(io::ErrorKind::ConnectionRefused);
        assert!(matches!(ProbeError::from_connect(refused), ProbeError::Refused));

        let reset = io::Error::from(io::ErrorKind::ConnectionReset);
        assert!(matches!(ProbeError::from_connect(reset), ProbeError::Refused));

        let timed_out = io::Error::from(io::ErrorKind::TimedOut);
        assert!(matches!(ProbeError::from_connect(timed_out), ProbeError::Timeout));

        let unreachable = io::Error::from(io::ErrorKind::HostUnreachable);
        assert!(matches!(
            ProbeError::from_connect(unreachable),
            ProbeError::Unreachable(_)
        ));

        let other = io::Error::new(io::ErrorKind::Other, "boom");
        assert!(matches!(ProbeError::from_connect(other), ProbeError::Io(_)));
    }

    #[test]
    fn test_invalid_spec_message() {
        let err = TargetError::invalid("10-5", "range end is before start");
        assert_eq!(
            err.to_string(),
            "invalid target specification '10-5': range end is before start"
        );
    }
}
