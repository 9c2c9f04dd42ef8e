//! # Memory Access Port
//!
//! The only way the inspection core touches the target. A port offers four
//! read-only capabilities, mirroring what a kernel debugger host exposes:
//!
//! - run an inspection command and get its text output line by line
//! - materialize a named structure at an address and read its fields
//! - read raw bytes
//! - read raw little-endian words of a given width
//!
//! Every operation can fail with a [`ReadError`]; callers decide whether that
//! means "skip this node", "try the next offset" or "degrade the session".
//! No write capability exists.
//!
//! [`SnapshotPort`] is the frozen-snapshot implementation used by the CLI and
//! by the tests.

pub mod snapshot;

use etw_layout::ListEntry;
use std::collections::BTreeMap;

use crate::domain::{Address, ReadError};

pub use snapshot::{FieldLayout, SnapshotPort};

/// Read-only view of the inspected target
pub trait MemoryPort {
    /// Run a target-inspection command and return its output lines.
    ///
    /// # Errors
    /// Returns an error if the host cannot execute the command.
    fn execute_command(&self, command: &str) -> Result<Vec<String>, ReadError>;

    /// Materialize `type_name` at `address` and read all of its known fields.
    ///
    /// # Errors
    /// Returns an error if the type is unknown or any field is unreadable.
    fn read_struct(&self, address: Address, type_name: &str) -> Result<TypedStruct, ReadError>;

    /// Read `len` raw bytes.
    ///
    /// # Errors
    /// Returns an error if any byte of the range is unreadable.
    fn read_bytes(&self, address: Address, len: usize) -> Result<Vec<u8>, ReadError>;

    /// Read `count` consecutive little-endian words of `width` bytes each.
    ///
    /// # Errors
    /// Returns an error for widths other than 1, 2, 4 or 8, or if the range is
    /// unreadable.
    fn read_words(
        &self,
        address: Address,
        count: usize,
        width: usize,
    ) -> Result<Vec<u64>, ReadError> {
        if !matches!(width, 1 | 2 | 4 | 8) {
            return Err(ReadError::UnsupportedWidth(width));
        }
        let len = count.checked_mul(width).ok_or(ReadError::UnsupportedWidth(width))?;
        let bytes = self.read_bytes(address, len)?;
        Ok(bytes.chunks_exact(width).map(le_word).collect())
    }
}

/// Field values of one structure instance, as read from the target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypedStruct {
    pub type_name: String,
    pub address: Address,
    fields: BTreeMap<String, u64>,
}

impl TypedStruct {
    #[must_use]
    pub fn new(type_name: impl Into<String>, address: Address, fields: BTreeMap<String, u64>) -> Self {
        Self { type_name: type_name.into(), address, fields }
    }

    /// Scalar value of a field. Pointer fields yield the pointer value.
    ///
    /// # Errors
    /// Returns [`ReadError::UnknownField`] if the layout has no such field.
    pub fn field(&self, name: &str) -> Result<u64, ReadError> {
        self.fields.get(name).copied().ok_or_else(|| ReadError::UnknownField {
            type_name: self.type_name.clone(),
            field: name.to_string(),
        })
    }

    /// Pointer field as a target address.
    ///
    /// # Errors
    /// Returns [`ReadError::UnknownField`] if the layout has no such field.
    pub fn pointer(&self, name: &str) -> Result<Address, ReadError> {
        self.field(name).map(Address)
    }
}

/// Read a 64-bit `LIST_ENTRY` at `address`.
///
/// # Errors
/// Returns an error if the 16 bytes are unreadable.
pub fn read_list_entry(port: &dyn MemoryPort, address: Address) -> Result<ListEntry, ReadError> {
    let bytes = port.read_bytes(address, ListEntry::SIZE)?;
    let mut raw = [0u8; ListEntry::SIZE];
    raw.copy_from_slice(&bytes);
    Ok(ListEntry::from_le_bytes(raw))
}

/// Decode a little-endian word of 1 to 8 bytes.
pub(crate) fn le_word(bytes: &[u8]) -> u64 {
    bytes.iter().rev().fold(0u64, |acc, &b| (acc << 8) | u64::from(b))
}
