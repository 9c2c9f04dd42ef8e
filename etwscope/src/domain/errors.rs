//! Structured error types for etwscope
//!
//! Using thiserror for automatic Display implementation and error chaining.
//! None of these cross a component boundary as a failure of the whole run:
//! readers skip, resolvers fall back, the scanner degrades the session.

use super::types::{Address, LoggerId};
use thiserror::Error;

/// Failure of a single Memory Access Port operation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReadError {
    #[error("Memory at {address} ({len} bytes) is not readable")]
    Unmapped { address: Address, len: usize },

    #[error("Unknown type {0}")]
    UnknownType(String),

    #[error("Type {type_name} has no field {field}")]
    UnknownField { type_name: String, field: String },

    #[error("Unsupported word width: {0} bytes")]
    UnsupportedWidth(usize),

    #[error("Command '{command}' failed: {reason}")]
    CommandFailed { command: String, reason: String },
}

/// Failure while scanning one logger context
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    #[error("Cannot read logger context {logger} at {address}: {source}")]
    LoggerUnreadable { logger: LoggerId, address: Address, source: ReadError },

    #[error("Cannot read consumer list head at {head}: {source}")]
    ListHeadUnreadable { head: Address, source: ReadError },
}

/// Failure loading a memory snapshot file
#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("Invalid hex in region {base}: {reason}")]
    BadRegionBytes { base: Address, reason: String },

    #[error("Field {type_name}.{field} has unsupported size {size}")]
    BadFieldSize { type_name: String, field: String, size: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Failure loading a layout table file
#[derive(Error, Debug)]
pub enum LayoutError {
    #[error("Layout table has no profiles")]
    Empty,

    #[error("Profile {profile}: {reason}")]
    InvalidProfile { profile: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_error_display() {
        let err = ReadError::Unmapped { address: Address(0x1000), len: 8 };
        assert_eq!(err.to_string(), "Memory at 0x1000 (8 bytes) is not readable");
    }

    #[test]
    fn test_scan_error_carries_logger() {
        let err = ScanError::LoggerUnreadable {
            logger: LoggerId(0x20),
            address: Address(0xffff_e001_0000_0000),
            source: ReadError::UnknownType("_WMI_LOGGER_CONTEXT".to_string()),
        };
        let msg = err.to_string();
        assert!(msg.contains("0x20"));
        assert!(msg.contains("0xffffe00100000000"));
        assert!(msg.contains("_WMI_LOGGER_CONTEXT"));
    }
}
