//! # Kernel Layout Knowledge (NT Tracing Structures)
//!
//! Defines the structure names, field names and byte offsets that the
//! inspection tool needs to locate real-time consumers of a tracing session
//! inside a frozen kernel image. Everything here describes memory owned by
//! the *target* kernel; nothing is ever written back.
//!
//! ## Structures
//!
//! ```text
//!  _WMI_LOGGER_CONTEXT                 _ETW_REALTIME_CONSUMER
//!  ┌──────────────────────┐            ┌──────────────────────┐
//!  │ ...                  │            │ Links.Flink ─────────┼──▶ next consumer
//!  │ Consumers (+0x158) ──┼──Flink────▶│ Links.Blink          │
//!  │ NumConsumers         │            │ ProcessObject ───────┼──▶ _EPROCESS
//!  └──────────────────────┘            └──────────────────────┘
//! ```
//!
//! The consumer list is a circular doubly-linked list whose head lives inside
//! the logger context. `NumConsumers` is the bound the walker trusts.
//!
//! ## Offset Candidates
//!
//! `_EPROCESS` moves between kernel builds. The PID and image-name fields are
//! probed at a short list of candidate offsets; list order is priority order
//! (most recent layouts first).

#![no_std]

// ============================================================================
// Structure and Field Names
// ============================================================================

/// Logger context for one tracing session.
pub const LOGGER_CONTEXT_TYPE: &str = "_WMI_LOGGER_CONTEXT";

/// One registered real-time consumer.
pub const REALTIME_CONSUMER_TYPE: &str = "_ETW_REALTIME_CONSUMER";

/// Number of consumers attached to the logger (authoritative walk bound).
pub const NUM_CONSUMERS_FIELD: &str = "NumConsumers";

/// Forward link embedded in each consumer node.
pub const CONSUMER_LINKS_FLINK_FIELD: &str = "Links.Flink";

/// Process object pointer embedded in each consumer node.
pub const PROCESS_OBJECT_FIELD: &str = "ProcessObject";

// ============================================================================
// Fixed Offsets
// ============================================================================

/// Offset of the `Consumers` list head inside `_WMI_LOGGER_CONTEXT`.
pub const CONSUMER_LIST_OFFSET: u64 = 0x158;

/// Candidate offsets of `UniqueProcessId` inside `_EPROCESS`.
///
/// Windows 10/11 builds place it at 0x2E8 or 0x440; older builds use the
/// remaining entries.
pub const PID_OFFSETS: [u64; 4] = [0x2E8, 0x440, 0x448, 0x2E0];

/// Candidate offsets of `ImageFileName` inside `_EPROCESS`.
pub const IMAGE_NAME_OFFSETS: [u64; 3] = [0x5A8, 0x450, 0x468];

/// `ImageFileName` is a fixed 15-byte character buffer.
pub const IMAGE_NAME_LEN: usize = 15;

/// PIDs at or above this value are treated as garbage (pointers, stale data).
pub const PID_SANITY_CEILING: u64 = 100_000;

// ============================================================================
// Shared Data Structures
// ============================================================================

/// `LIST_ENTRY` as laid out on 64-bit targets.
///
/// **Memory Layout**: `#[repr(C)]`, 16 bytes, forward link first.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListEntry {
    /// Next node (or the list head when this is the last node)
    pub flink: u64,
    /// Previous node
    pub blink: u64,
}

impl ListEntry {
    /// Size of a 64-bit `LIST_ENTRY` in bytes.
    pub const SIZE: usize = 16;

    /// Decode from little-endian target bytes.
    #[must_use]
    pub fn from_le_bytes(bytes: [u8; Self::SIZE]) -> Self {
        let mut flink = [0u8; 8];
        let mut blink = [0u8; 8];
        flink.copy_from_slice(&bytes[..8]);
        blink.copy_from_slice(&bytes[8..]);
        Self { flink: u64::from_le_bytes(flink), blink: u64::from_le_bytes(blink) }
    }

    /// True when the entry is a list head pointing at itself.
    #[must_use]
    pub fn is_empty_head(&self, head_address: u64) -> bool {
        self.flink == head_address
    }
}

/// Whether a raw word read from a PID candidate offset looks like a PID.
#[must_use]
pub fn is_plausible_pid(value: u64, ceiling: u64) -> bool {
    value > 0 && value < ceiling
}
