//! JSON export of an aggregate report

use anyhow::{Context, Result};
use serde::Serialize;
use std::io::Write;

use crate::report_data::AggregateReport;

/// Envelope written around the report so readers can check the format
#[derive(Debug, Serialize)]
struct ReportFile<'a> {
    format: &'static str,
    version: u32,
    #[serde(flatten)]
    report: &'a AggregateReport,
}

/// JSON exporter for an aggregate report
pub struct JsonReportExporter<'a> {
    report: &'a AggregateReport,
    pretty: bool,
}

impl<'a> JsonReportExporter<'a> {
    #[must_use]
    pub fn new(report: &'a AggregateReport) -> Self {
        Self { report, pretty: true }
    }

    /// Write a single-line document instead of an indented one
    #[must_use]
    pub fn compact(mut self) -> Self {
        self.pretty = false;
        self
    }

    /// Write the report to `writer`
    ///
    /// # Errors
    /// Returns an error if serialization or the write fails
    pub fn export<W: Write>(&self, mut writer: W) -> Result<()> {
        let file = ReportFile { format: "etwscope-report", version: 1, report: self.report };
        if self.pretty {
            serde_json::to_writer_pretty(&mut writer, &file)
        } else {
            serde_json::to_writer(&mut writer, &file)
        }
        .context("Failed to serialize report")?;
        writeln!(writer).context("Failed to write report")?;
        writer.flush().context("Failed to flush report")?;
        Ok(())
    }
}
