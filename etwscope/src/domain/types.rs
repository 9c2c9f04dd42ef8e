//! Domain types providing compile-time safety and self-documentation
//!
//! These newtype wrappers keep target addresses, logger IDs and PIDs from
//! being mixed up, and make function signatures more expressive.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Address in the inspected target's memory
///
/// Opaque 64-bit handle compared by exact integer equality. Kernel addresses
/// sit far above 2^53, so they must never pass through a float.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address(pub u64);

impl Address {
    pub const NULL: Address = Address(0);

    #[must_use]
    pub fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Address of a field `offset` bytes past this one
    #[must_use]
    pub fn offset(self, offset: u64) -> Address {
        Address(self.0.wrapping_add(offset))
    }

    /// Bare lowercase hex, the form inspection commands expect
    #[must_use]
    pub fn to_command_hex(self) -> String {
        format!("{:x}", self.0)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

impl From<u64> for Address {
    fn from(value: u64) -> Self {
        Address(value)
    }
}

/// Error returned when a string is not a valid target address
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid address '{0}'")]
pub struct AddressParseError(pub String);

impl FromStr for Address {
    type Err = AddressParseError;

    /// Accepts `0xffffe00123456780`, `ffffe00123456780` and the debugger's
    /// backtick-split form ``ffffe001`23456780``.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed)
            .replace('`', "");

        if digits.is_empty() || digits.len() > 16 || !digits.chars().all(|c| c.is_ascii_hexdigit())
        {
            return Err(AddressParseError(s.to_string()));
        }

        u64::from_str_radix(&digits, 16).map(Address).map_err(|_| AddressParseError(s.to_string()))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Logger ID of a tracing session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LoggerId(pub u32);

impl fmt::Display for LoggerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

/// Process ID recovered from a process object (0 = unresolved)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Pid(pub u64);

impl Pid {
    #[must_use]
    pub fn is_resolved(self) -> bool {
        self.0 > 0
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which strategy produced a process identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResolutionSource {
    /// Parsed from the process-dump inspection command
    CommandBased,
    /// Read straight from a candidate field offset
    DirectOffsetProbe,
    /// Every strategy came up empty
    Unresolved,
}

impl fmt::Display for ResolutionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResolutionSource::CommandBased => "command",
            ResolutionSource::DirectOffsetProbe => "offset-probe",
            ResolutionSource::Unresolved => "unresolved",
        };
        f.write_str(s)
    }
}
