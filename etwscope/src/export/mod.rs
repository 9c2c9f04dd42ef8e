//! Report export functionality
//!
//! This module provides functionality for exporting aggregate reports to
//! machine-readable formats. Currently supports JSON.

pub mod json_report;

pub use json_report::JsonReportExporter;
