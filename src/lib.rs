//! # voidscan - a concurrent host and port scanner
//!
//! voidscan expands a target specification into a set of addresses, checks
//! which hosts are alive, TCP connect scans the live ones and keeps each
//! host's result as a JSON record for later review.
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use voidscan::config::AppSettings;
//! use voidscan::service::ScanService;
//! use voidscan::types::PortSpec;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() {
//!     let service = ScanService::new(AppSettings::default());
//!     let targets = service.resolve_targets("192.168.1.0/30").unwrap();
//!     let ports: PortSpec = "22,80,443".parse().unwrap();
//!
//!     let report = service
//!         .run_scan(&targets, ports.ports(), service.default_options(), &CancellationToken::new())
//!         .await;
//!     for target in &report.targets {
//!         println!("{} {}", target.address, target.state);
//!     }
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`types`] - Ports, port specs and target expansion
//! - [`scanner`] - Probers, the per-host port scanner and the orchestrator
//! - [`storage`] - JSON scan records on disk
//! - [`service`] - The invocation surface used by the CLI
//! - [`config`] - Settings file and timing presets
//! - [`error`] - Error types
//! - [`output`] - Output formatting utilities

pub mod cli;
pub mod config;
pub mod error;
pub mod output;
pub mod scanner;
pub mod service;
pub mod storage;
pub mod types;

// Re-export commonly used types
pub use error::{CliError, StorageError, TargetError};
pub use scanner::{Orchestrator, PortResult, PortState, ScanOptions, ScanReport, TargetState};
pub use service::ScanService;
pub use storage::{ResultStore, ScanRecord, StorageRef};
pub use types::{Port, PortSpec, TargetSet, TargetSpec};
