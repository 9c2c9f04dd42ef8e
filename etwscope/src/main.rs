//! # etwscope - Main Entry Point
//!
//! Loads a kernel memory snapshot, picks the structure layout for its build,
//! lists the active tracing sessions (or takes them from `--logger`) and
//! prints which processes consume each session in real time.

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::fs::File;
use std::io::BufWriter;

use etwscope::cli::Args;
use etwscope::directory::{parse_logger_arg, StaticDirectory, StrdumpDirectory};
use etwscope::enumerate::Enumerator;
use etwscope::export::JsonReportExporter;
use etwscope::layout::LayoutTable;
use etwscope::memory::SnapshotPort;
use etwscope::report::render_text;
use etwscope::scanner::SessionScanner;

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_USAGE: i32 = 2;

fn main() {
    let args = Args::parse();
    init_logger(args.verbose);

    std::process::exit(match run(&args) {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            let code = exit_code_for(&e);
            eprintln!("error: {e:#}");
            code
        }
    });
}

/// `RUST_LOG` wins; otherwise warnings only, or debug with `-v`
fn init_logger(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default)).init();
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    let msg = err.to_string().to_lowercase();
    if msg.contains("invalid logger") {
        EXIT_USAGE
    } else {
        EXIT_ERROR
    }
}

/// Loggers named with `--logger`, or `None` to ask the snapshot
fn explicit_loggers(args: &Args) -> Result<Option<StaticDirectory>> {
    if args.loggers.is_empty() {
        return Ok(None);
    }
    let entries = args
        .loggers
        .iter()
        .map(|arg| parse_logger_arg(arg))
        .collect::<Result<Vec<_>>>()?;
    Ok(Some(StaticDirectory::new(entries)))
}

fn run(args: &Args) -> Result<()> {
    // Validate arguments before touching any file
    let explicit = explicit_loggers(args)?;

    let port = SnapshotPort::from_file(&args.snapshot)
        .with_context(|| format!("Failed to load snapshot {}", args.snapshot.display()))?;

    let table = match &args.layout {
        Some(path) => LayoutTable::from_file(path)
            .with_context(|| format!("Failed to load layout table {}", path.display()))?,
        None => LayoutTable::default(),
    };
    let build = args.build.or(port.build());
    match build {
        Some(b) => info!("Kernel build: {b}"),
        None => info!("Kernel build unknown"),
    }
    let profile = table.select(build);

    let enumerator = Enumerator::new(SessionScanner::new(&port, &profile));
    let report = match explicit {
        Some(directory) => enumerator.enumerate_directory(&directory)?,
        None => enumerator.enumerate_directory(&StrdumpDirectory::new(&port))?,
    };

    if !args.quiet {
        print!("{}", render_text(&report, args.all));
    }

    if let Some(path) = &args.export {
        let file = File::create(path)
            .with_context(|| format!("Failed to create export file: {}", path.display()))?;
        JsonReportExporter::new(&report).export(BufWriter::new(file))?;
        if !args.quiet {
            println!("\nReport exported to {}", path.display());
        }
    }

    Ok(())
}
