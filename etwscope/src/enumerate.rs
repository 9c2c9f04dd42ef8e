//! Enumeration driver
//!
//! Runs the session scanner over every logger a [`LoggerDirectory`] lists, in
//! order, and folds the results into an [`AggregateReport`]. No structure
//! parsing happens here.

use anyhow::Result;
use log::info;

use crate::directory::LoggerDirectory;
use crate::report_data::{AggregateReport, LoggerEntry};
use crate::scanner::SessionScanner;

pub struct Enumerator<'a> {
    scanner: SessionScanner<'a>,
}

impl<'a> Enumerator<'a> {
    #[must_use]
    pub fn new(scanner: SessionScanner<'a>) -> Self {
        Self { scanner }
    }

    /// Scan the given loggers in order
    #[must_use]
    pub fn enumerate_all<'e, I>(&self, loggers: I) -> AggregateReport
    where
        I: IntoIterator<Item = &'e LoggerEntry>,
    {
        let sessions = loggers.into_iter().map(|entry| self.scanner.scan(entry)).collect();
        let report = AggregateReport::from_sessions(sessions);
        info!(
            target: "etwscope::enumerate",
            "{} sessions, {} with consumers, {} consumers ({} resolved)",
            report.total_sessions,
            report.sessions_with_consumers,
            report.total_consumers,
            report.resolved_consumers
        );
        report
    }

    /// List loggers from `directory`, then scan them
    ///
    /// # Errors
    /// Returns an error only if the directory cannot be listed
    pub fn enumerate_directory(&self, directory: &dyn LoggerDirectory) -> Result<AggregateReport> {
        let loggers = directory.loggers()?;
        Ok(self.enumerate_all(&loggers))
    }
}
