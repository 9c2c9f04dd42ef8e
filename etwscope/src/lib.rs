//! # etwscope - ETW Real-Time Consumer Enumerator
//!
//! etwscope inspects a Windows kernel's event-tracing subsystem from the
//! outside, through a debugger-style memory inspection interface, and reports
//! for every active tracing session which processes are registered as its
//! real-time consumers. Consumers are found by walking the kernel's own
//! structures in memory rather than through a public API, so the tool sees
//! sessions a live query would hide.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                 Kernel Memory (live or frozen)                  │
//! │  _WMI_LOGGER_CONTEXT ──▶ consumer list ──▶ _ETW_REALTIME_CONSUMER│
//! │                                                 │ ProcessObject │
//! │                                                 ▼               │
//! │                                              _EPROCESS          │
//! └───────────────────────┬─────────────────────────────────────────┘
//!                         │ MemoryPort (read_struct / read_bytes /
//!                         │             execute_command)
//!                         ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    etwscope (This Crate)                        │
//! │                                                                 │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐        │
//! │  │  Directory   │──▶│  Enumerator  │──▶│   Scanner    │        │
//! │  │ (strdump)    │   │ (aggregate)  │   │ (per session)│        │
//! │  └──────────────┘   └──────────────┘   └──────┬───────┘        │
//! │                                               │                 │
//! │                              ┌────────────────┼────────┐        │
//! │                              ▼                         ▼        │
//! │                      ┌──────────────┐         ┌──────────────┐  │
//! │                      │ List Walker  │         │   Identity   │  │
//! │                      │  (bounded)   │         │   Resolver   │  │
//! │                      └──────────────┘         └──────────────┘  │
//! │                                                                 │
//! │  AggregateReport ──▶ report (text)  /  export (JSON)            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Structure
//!
//! ### Core Pipeline Modules
//!
//! - [`memory`]: the [`memory::MemoryPort`] trait every read goes through, and
//!   [`memory::SnapshotPort`], a frozen snapshot loaded from JSON
//! - [`layout`]: structure names and candidate offsets per kernel build
//! - [`walker`]: bounded traversal of circular doubly-linked lists
//! - [`identity`]: PID and image name of a process object, via an ordered
//!   chain of strategies (inspection command first, raw offsets second)
//! - [`scanner`]: one logger context to one [`report_data::SessionReport`]
//! - [`directory`]: which logger contexts exist (`!wmitrace.strdump`)
//! - [`enumerate`]: runs the scanner over every logger and aggregates
//!
//! ### Output and Support Modules
//!
//! - [`report`]: plain-text rendering
//! - [`export`]: JSON export
//! - [`report_data`]: report values handed up the pipeline
//! - [`cli`]: command-line arguments
//! - [`domain`]: core types (`Address`, `LoggerId`, `Pid`) and errors
//!
//! ## Failure Model
//!
//! Target memory may be torn or mid-mutation, so nothing here aborts a run:
//!
//! - An unreadable node ends a list walk with the nodes found so far
//! - A list is never followed past the count its logger context declares
//! - An unidentifiable process is reported with PID 0 and image `Unknown`
//! - A logger context that cannot be read yields an empty session report
//!   carrying the reason
//!
//! ## Typical Usage
//!
//! ```bash
//! # Every session that has consumers
//! ./etwscope kernel.json
//!
//! # Pick offsets for a specific build and keep a JSON copy
//! ./etwscope kernel.json --layout layouts.json --build 19045 --export report.json
//! ```

// Expose modules for testing
pub mod cli;
pub mod directory;
pub mod domain;
pub mod enumerate;
pub mod export;
pub mod identity;
pub mod layout;
pub mod memory;
pub mod report;
pub mod report_data;
pub mod scanner;
pub mod walker;

#[cfg(test)]
mod fixtures;
