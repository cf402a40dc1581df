//! JSON-based scan result storage.
//!
//! Stores each scan as a separate JSON file named after the target and the
//! UTC time of the scan, e.g. `192_168_1_1_20261016T101500.123456Z.json`.
//! Files are created with create-new semantics and never rewritten, so the
//! directory needs no locking.

use crate::error::{StorageError, StorageResult};
use crate::scanner::traits::{Liveness, PortResult, PortState};
use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::net::IpAddr;
use std::path::PathBuf;
use std::str::FromStr;

const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S%.6fZ";
const EXTENSION: &str = ".json";

/// A persisted scan of one target. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRecord {
    target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ip: Option<IpAddr>,
    timestamp: DateTime<Utc>,
    #[serde(default)]
    liveness: Liveness,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    duration_ms: Option<u64>,
    ports: Vec<PortResult>,
}

impl ScanRecord {
    /// Create a record; `ports` should already be in ascending port order.
    pub fn new(target: impl Into<String>, timestamp: DateTime<Utc>, ports: Vec<PortResult>) -> Self {
        Self {
            target: target.into(),
            ip: None,
            timestamp,
            liveness: Liveness::Unknown,
            duration_ms: None,
            ports,
        }
    }

    pub fn with_ip(mut self, ip: IpAddr) -> Self {
        self.ip = Some(ip);
        self
    }

    pub fn with_liveness(mut self, liveness: Liveness) -> Self {
        self.liveness = liveness;
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn ip(&self) -> Option<IpAddr> {
        self.ip
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn liveness(&self) -> Liveness {
        self.liveness
    }

    pub fn duration_ms(&self) -> Option<u64> {
        self.duration_ms
    }

    /// Every stored port result, open or not.
    pub fn ports(&self) -> &[PortResult] {
        &self.ports
    }

    /// Only the open ports.
    pub fn open_ports(&self) -> impl Iterator<Item = &PortResult> {
        self.ports.iter().filter(|r| r.is_open())
    }

    /// Drop every port that is not open.
    pub fn into_open_only(mut self) -> Self {
        self.ports.retain(PortResult::is_open);
        self
    }

    pub fn count(&self, state: PortState) -> usize {
        self.ports.iter().filter(|r| r.state == state).count()
    }

    /// Get a short summary of the scan.
    pub fn summary(&self) -> String {
        format!(
            "{} - {} open, {} closed, {} filtered",
            self.target,
            self.count(PortState::Open),
            self.count(PortState::Closed),
            self.count(PortState::Filtered),
        )
    }
}

/// Handle to one stored record: its file name inside the store directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageRef {
    name: String,
    target_key: String,
    saved_at: DateTime<Utc>,
    counter: u32,
}

impl StorageRef {
    fn build(target_key: &str, saved_at: DateTime<Utc>, counter: u32) -> Self {
        // File names carry microseconds; keep the in-memory value identical.
        let saved_at = saved_at.trunc_subsecs(6);
        let stamp = saved_at.format(TIMESTAMP_FORMAT);
        let name = if counter == 0 {
            format!("{}_{}{}", target_key, stamp, EXTENSION)
        } else {
            format!("{}_{}-{}{}", target_key, stamp, counter, EXTENSION)
        };
        Self {
            name,
            target_key: target_key.to_string(),
            saved_at,
            counter,
        }
    }

    /// The file name, which is also the stable textual form of the reference.
    pub fn as_str(&self) -> &str {
        &self.name
    }

    /// Scan time encoded in the name.
    pub fn saved_at(&self) -> DateTime<Utc> {
        self.saved_at
    }

    fn is_for(&self, target: &str) -> bool {
        self.target_key == target_key(target)
    }
}

impl fmt::Display for StorageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl Serialize for StorageRef {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.name)
    }
}

impl FromStr for StorageRef {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || StorageError::InvalidRef(s.to_string());

        let stem = s.strip_suffix(EXTENSION).ok_or_else(invalid)?;
        let (target_key, rest) = stem.rsplit_once('_').ok_or_else(invalid)?;
        if target_key.is_empty() || !target_key.chars().all(is_key_char) {
            return Err(invalid());
        }

        let (stamp, counter) = match rest.split_once("Z-") {
            Some((stamp, counter)) => {
                let counter: u32 = counter.parse().map_err(|_| invalid())?;
                (format!("{}Z", stamp), counter)
            }
            None => (rest.to_string(), 0),
        };
        let saved_at = NaiveDateTime::parse_from_str(&stamp, TIMESTAMP_FORMAT)
            .map_err(|_| invalid())?
            .and_utc();

        let parsed = Self::build(target_key, saved_at, counter);
        // Only canonical names round-trip; anything else was not written by us.
        if parsed.name != s {
            return Err(invalid());
        }
        Ok(parsed)
    }
}

fn is_key_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

/// File-name-safe form of a target address: `192.168.1.1` -> `192_168_1_1`.
fn target_key(target: &str) -> String {
    target
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

/// JSON file-based scan storage rooted at one directory.
#[derive(Debug, Clone)]
pub struct ResultStore {
    dir: PathBuf,
}

impl ResultStore {
    /// Create a store over `dir`. Nothing touches the disk until the first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Write a record to a new file and return its reference.
    ///
    /// Creates the directory if needed. A name clash (same target, same
    /// microsecond) gets a `-N` counter instead of overwriting.
    pub fn save(&self, record: &ScanRecord) -> StorageResult<StorageRef> {
        fs::create_dir_all(&self.dir).map_err(|source| StorageError::WriteFailed {
            path: self.dir.clone(),
            source,
        })?;

        let content = serde_json::to_string_pretty(record)?;
        let key = target_key(record.target());

        let mut counter = 0u32;
        loop {
            let reference = StorageRef::build(&key, record.timestamp(), counter);
            let path = self.dir.join(reference.as_str());

            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    let written = file.write_all(content.as_bytes()).and_then(|_| file.sync_all());
                    if let Err(source) = written {
                        drop(file);
                        let _ = fs::remove_file(&path);
                        return Err(StorageError::WriteFailed { path, source });
                    }
                    tracing::debug!(path = %path.display(), "scan record saved");
                    return Ok(reference);
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    counter += 1;
                }
                Err(source) => return Err(StorageError::WriteFailed { path, source }),
            }
        }
    }

    /// Load a record by reference.
    pub fn load(&self, reference: &StorageRef) -> StorageResult<ScanRecord> {
        let path = self.dir.join(reference.as_str());

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StorageError::RecordNotFound(reference.to_string()))
            }
            Err(source) => return Err(StorageError::ReadFailed { path, source }),
        };

        serde_json::from_str(&content).map_err(|e| StorageError::RecordCorrupt {
            name: reference.to_string(),
            reason: e.to_string(),
        })
    }

    /// List stored records, most recent first.
    ///
    /// A missing directory is an empty store. Files whose names were not
    /// produced by [`save`](Self::save) are skipped.
    pub fn list(&self) -> StorageResult<Vec<StorageRef>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StorageError::ReadFailed {
                    path: self.dir.clone(),
                    source,
                })
            }
        };

        let mut refs = Vec::new();
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(dir = %self.dir.display(), error = %e, "unreadable directory entry");
                    continue;
                }
            };
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.ends_with(EXTENSION) {
                continue;
            }
            match name.parse::<StorageRef>() {
                Ok(reference) => refs.push(reference),
                Err(_) => tracing::warn!(file = %name, "skipping file with unrecognized name"),
            }
        }

        refs.sort_by(|a, b| {
            b.saved_at
                .cmp(&a.saved_at)
                .then(b.counter.cmp(&a.counter))
                .then(a.name.cmp(&b.name))
        });
        Ok(refs)
    }

    /// Load every record, reporting failures per item.
    pub fn load_all(&self) -> StorageResult<Vec<(StorageRef, StorageResult<ScanRecord>)>> {
        Ok(self
            .list()?
            .into_iter()
            .map(|reference| {
                let record = self.load(&reference);
                (reference, record)
            })
            .collect())
    }

    /// Most recent readable record for `target`.
    pub fn latest_for(&self, target: &str) -> StorageResult<(StorageRef, ScanRecord)> {
        for reference in self.list()?.into_iter().filter(|r| r.is_for(target)) {
            match self.load(&reference) {
                Ok(record) => return Ok((reference, record)),
                Err(e) => tracing::warn!(record = %reference, error = %e, "skipping unreadable record"),
            }
        }
        Err(StorageError::RecordNotFound(target.to_string()))
    }
}
