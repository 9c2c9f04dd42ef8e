//! CLI argument definitions

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "etwscope",
    version,
    about = "List the real-time consumers of every ETW session in a kernel memory snapshot",
    after_help = "\
EXAMPLES:
    etwscope kernel.json                                  Scan every logger the snapshot lists
    etwscope kernel.json --all                            Include sessions without consumers
    etwscope kernel.json --logger 0xffffe0012b6a4040:2    Scan one logger context directly
    etwscope kernel.json --layout layouts.json --build 19045
    etwscope kernel.json --export report.json -q          Write the JSON report only"
)]
pub struct Args {
    /// Snapshot file to inspect
    #[arg(value_name = "SNAPSHOT")]
    pub snapshot: PathBuf,

    /// Layout table mapping kernel builds to structure offsets
    #[arg(long, value_name = "FILE")]
    pub layout: Option<PathBuf>,

    /// Kernel build number (overrides the one recorded in the snapshot)
    #[arg(long, value_name = "N")]
    pub build: Option<u32>,

    /// Logger context to scan instead of listing loggers (repeatable)
    #[arg(long = "logger", value_name = "ADDR[:ID[:NAME]]")]
    pub loggers: Vec<String>,

    /// Export the report as JSON
    #[arg(long, value_name = "FILE")]
    pub export: Option<PathBuf>,

    /// Also list sessions without consumers
    #[arg(long)]
    pub all: bool,

    /// Suppress the text report
    #[arg(short, long)]
    pub quiet: bool,

    /// Enable debug logging
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,
}
