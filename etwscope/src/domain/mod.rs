//! Domain model for etwscope
//!
//! This module contains core domain types and errors that provide:
//! - Exact 64-bit target addresses (never floating point)
//! - Self-documenting function signatures
//! - Structured error handling

pub mod errors;
pub mod types;

// Re-export common types for convenience
pub use types::{Address, AddressParseError, LoggerId, Pid, ResolutionSource};

pub use errors::{LayoutError, ReadError, ScanError, SnapshotError};
