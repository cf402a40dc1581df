//! Configuration management for voidscan.
//!
//! Settings file, XDG paths and timing presets.

mod settings;
mod speed;

pub use settings::{AppSettings, Paths, FALLBACK_RESULTS_DIR};
pub use speed::ScanSpeed;
