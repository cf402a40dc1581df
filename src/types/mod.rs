//! Core type definitions using newtype patterns for type safety.
//!
//! These types reject invalid ports and target specifications at parse time,
//! before any probe is sent.

mod port;
mod target;

pub use port::{Port, PortError, PortSpec};
pub use target::{resolve, HostResolver, TargetEntry, TargetSet, TargetSpec};
