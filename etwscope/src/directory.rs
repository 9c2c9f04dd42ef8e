//! Logger directory: which tracing sessions exist and where their contexts live
//!
//! The host's `!wmitrace.strdump` command prints one line per active logger:
//!
//! ```text
//! Logger Id 0x02 @ 0xFFFFE0012B6A4040 Named 'EventLog-System'
//! ```
//!
//! [`StrdumpDirectory`] runs that command through the port and parses it;
//! [`StaticDirectory`] serves an explicit list (CLI `--logger`, tests).

use anyhow::{Context, Result};
use log::{debug, info};
use regex::Regex;
use std::sync::OnceLock;

use crate::domain::{Address, LoggerId};
use crate::memory::MemoryPort;
use crate::report_data::LoggerEntry;

/// Command listing every active logger context
pub const STRDUMP_COMMAND: &str = "!wmitrace.strdump";

/// Source of the logger contexts to scan
pub trait LoggerDirectory {
    /// Active loggers in the order they should be scanned.
    ///
    /// # Errors
    /// Returns an error if the directory itself cannot be obtained.
    fn loggers(&self) -> Result<Vec<LoggerEntry>>;
}

fn strdump_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"Logger\s+Id\s+0x([0-9a-fA-F]+)\s+@\s+(0x[0-9a-fA-F`]+)\s+Named\s+'(.*)'")
            .expect("valid regex")
    })
}

/// Extract logger entries from `!wmitrace.strdump` output, skipping other lines
#[must_use]
pub fn parse_strdump<S: AsRef<str>>(lines: &[S]) -> Vec<LoggerEntry> {
    lines
        .iter()
        .filter_map(|line| {
            let caps = strdump_regex().captures(line.as_ref())?;
            let id = u32::from_str_radix(&caps[1], 16).ok()?;
            let address: Address = caps[2].parse().ok()?;
            Some(LoggerEntry::new(address, LoggerId(id), &caps[3]))
        })
        .collect()
}

/// Loggers listed by the host's strdump command
pub struct StrdumpDirectory<'a> {
    port: &'a dyn MemoryPort,
}

impl<'a> StrdumpDirectory<'a> {
    #[must_use]
    pub fn new(port: &'a dyn MemoryPort) -> Self {
        Self { port }
    }
}

impl LoggerDirectory for StrdumpDirectory<'_> {
    fn loggers(&self) -> Result<Vec<LoggerEntry>> {
        let lines = self
            .port
            .execute_command(STRDUMP_COMMAND)
            .with_context(|| format!("Failed to list loggers with {STRDUMP_COMMAND}"))?;
        let loggers = parse_strdump(&lines);
        for logger in &loggers {
            debug!(
                target: "etwscope::directory",
                "Found logger: {} (ID: {}) at {}",
                logger.name,
                logger.id,
                logger.address
            );
        }
        info!(target: "etwscope::directory", "{} loggers listed", loggers.len());
        Ok(loggers)
    }
}

/// A fixed list of loggers
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    entries: Vec<LoggerEntry>,
}

impl StaticDirectory {
    #[must_use]
    pub fn new(entries: Vec<LoggerEntry>) -> Self {
        Self { entries }
    }
}

impl LoggerDirectory for StaticDirectory {
    fn loggers(&self) -> Result<Vec<LoggerEntry>> {
        Ok(self.entries.clone())
    }
}

/// Parse a `--logger` value: `ADDR[:ID[:NAME]]`
///
/// # Errors
/// Returns an error if the address or the hex ID is malformed
pub fn parse_logger_arg(arg: &str) -> Result<LoggerEntry> {
    let mut parts = arg.splitn(3, ':');
    let address: Address = parts
        .next()
        .unwrap_or_default()
        .parse()
        .with_context(|| format!("Invalid logger address in '{arg}'"))?;
    let id = match parts.next().filter(|s| !s.is_empty()) {
        Some(raw) => {
            let digits = raw.trim_start_matches("0x").trim_start_matches("0X");
            u32::from_str_radix(digits, 16)
                .with_context(|| format!("Invalid logger id '{raw}' in '{arg}'"))?
        }
        None => 0,
    };
    let name = parts.next().map_or_else(|| format!("logger@{address}"), str::to_string);
    Ok(LoggerEntry::new(address, LoggerId(id), name))
}
