//! Scan result persistence.
//!
//! One JSON file per scanned target, listed newest first.

mod json_store;

pub use json_store::{ResultStore, ScanRecord, StorageRef};
