//! Frozen memory snapshot backing the [`MemoryPort`](super::MemoryPort)
//!
//! Memory is held in sparse 4 KiB pages. A read touching any page that was
//! never captured fails, the same way an unmapped page faults on a live
//! target. Structure layouts and recorded command transcripts travel with
//! the snapshot so that typed reads and inspection commands can be served
//! without a debugger attached.
//!
//! ## File Format
//!
//! ```json
//! {
//!   "build": 22621,
//!   "regions": [{ "base": "0xffffe00100001000", "bytes": "5800..." }],
//!   "types": {
//!     "_WMI_LOGGER_CONTEXT": { "NumConsumers": { "offset": 360, "size": 4 } },
//!     "_ETW_REALTIME_CONSUMER": {
//!       "Links.Flink": { "offset": 0, "size": 8 },
//!       "ProcessObject": { "offset": 24, "size": 8 }
//!     }
//!   },
//!   "commands": { "!wmitrace.strdump": ["Logger Id 0x2 @ 0xffffe00100001000 Named 'EventLog'"] }
//! }
//! ```

use log::debug;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use super::{le_word, MemoryPort, TypedStruct};
use crate::domain::{Address, ReadError, SnapshotError};

const PAGE_SIZE: u64 = 0x1000;

/// Location and width of one structure field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct FieldLayout {
    pub offset: u64,
    pub size: usize,
}

#[derive(Debug, Deserialize)]
struct SnapshotFile {
    #[serde(default)]
    build: Option<u32>,
    #[serde(default)]
    regions: Vec<RegionFile>,
    #[serde(default)]
    types: BTreeMap<String, BTreeMap<String, FieldLayout>>,
    #[serde(default)]
    commands: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct RegionFile {
    base: Address,
    bytes: String,
}

/// Memory Access Port over a frozen snapshot
#[derive(Debug, Default, Clone)]
pub struct SnapshotPort {
    pages: BTreeMap<u64, Vec<u8>>,
    types: BTreeMap<String, BTreeMap<String, FieldLayout>>,
    commands: BTreeMap<String, Vec<String>>,
    build: Option<u32>,
}

impl SnapshotPort {
    /// Create an empty snapshot (every read fails)
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a snapshot from a JSON file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or is not a valid snapshot
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SnapshotError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_json(&content)
    }

    /// Parse a snapshot from JSON text
    ///
    /// # Errors
    /// Returns an error on malformed JSON, bad hex or unsupported field sizes
    pub fn from_json(content: &str) -> Result<Self, SnapshotError> {
        let file: SnapshotFile = serde_json::from_str(content)?;
        let mut port = Self::new();
        port.build = file.build;

        for region in &file.regions {
            let bytes = hex::decode(region.bytes.trim()).map_err(|e| {
                SnapshotError::BadRegionBytes { base: region.base, reason: e.to_string() }
            })?;
            port.write_bytes(region.base, &bytes);
        }

        for (type_name, fields) in file.types {
            for (field, layout) in fields {
                if !matches!(layout.size, 1 | 2 | 4 | 8) {
                    return Err(SnapshotError::BadFieldSize {
                        type_name,
                        field,
                        size: layout.size,
                    });
                }
                port.define_field(&type_name, &field, layout.offset, layout.size);
            }
        }

        for (command, lines) in file.commands {
            port.record_command(&command, lines);
        }

        debug!(
            target: "etwscope::memory",
            "Loaded snapshot: {} pages, {} types, {} commands",
            port.pages.len(),
            port.types.len(),
            port.commands.len()
        );
        Ok(port)
    }

    /// Kernel build number the snapshot was captured from, if recorded
    #[must_use]
    pub fn build(&self) -> Option<u32> {
        self.build
    }

    /// Capture bytes at `address`, mapping zero-filled pages as needed
    pub fn write_bytes(&mut self, address: Address, bytes: &[u8]) -> &mut Self {
        let mut cursor = address.0;
        let mut remaining = bytes;
        while !remaining.is_empty() {
            let page_base = cursor & !(PAGE_SIZE - 1);
            let in_page = usize::try_from(cursor - page_base).unwrap_or_default();
            let page = self.pages.entry(page_base).or_insert_with(|| vec![0; PAGE_SIZE as usize]);
            let n = remaining.len().min(page.len() - in_page);
            page[in_page..in_page + n].copy_from_slice(&remaining[..n]);
            remaining = &remaining[n..];
            cursor = cursor.wrapping_add(n as u64);
        }
        self
    }

    pub fn write_u64(&mut self, address: Address, value: u64) -> &mut Self {
        self.write_bytes(address, &value.to_le_bytes())
    }

    pub fn write_u32(&mut self, address: Address, value: u32) -> &mut Self {
        self.write_bytes(address, &value.to_le_bytes())
    }

    /// Declare a field of a structure type. Nested fields use dotted names
    /// (`Links.Flink`).
    pub fn define_field(&mut self, type_name: &str, field: &str, offset: u64, size: usize) -> &mut Self {
        self.types
            .entry(type_name.to_string())
            .or_default()
            .insert(field.to_string(), FieldLayout { offset, size });
        self
    }

    /// Record the output the host printed for an inspection command
    pub fn record_command<I, S>(&mut self, command: &str, lines: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.commands
            .insert(normalize_command(command), lines.into_iter().map(Into::into).collect());
        self
    }
}

impl MemoryPort for SnapshotPort {
    fn execute_command(&self, command: &str) -> Result<Vec<String>, ReadError> {
        self.commands.get(&normalize_command(command)).cloned().ok_or_else(|| {
            ReadError::CommandFailed {
                command: command.to_string(),
                reason: "no output recorded in snapshot".to_string(),
            }
        })
    }

    fn read_struct(&self, address: Address, type_name: &str) -> Result<TypedStruct, ReadError> {
        let layout =
            self.types.get(type_name).ok_or_else(|| ReadError::UnknownType(type_name.to_string()))?;

        let mut fields = BTreeMap::new();
        for (name, field) in layout {
            let bytes = self.read_bytes(address.offset(field.offset), field.size)?;
            fields.insert(name.clone(), le_word(&bytes));
        }
        Ok(TypedStruct::new(type_name, address, fields))
    }

    fn read_bytes(&self, address: Address, len: usize) -> Result<Vec<u8>, ReadError> {
        let unmapped = || ReadError::Unmapped { address, len };
        let end = address.0.checked_add(len as u64).ok_or_else(unmapped)?;

        // Grows only as mapped pages are copied
        let mut out = Vec::new();
        let mut cursor = address.0;
        while cursor < end {
            let page_base = cursor & !(PAGE_SIZE - 1);
            let page = self.pages.get(&page_base).ok_or_else(unmapped)?;
            let in_page = usize::try_from(cursor - page_base).map_err(|_| unmapped())?;
            let want = usize::try_from(end - cursor).unwrap_or(usize::MAX);
            let n = want.min(page.len() - in_page);
            out.extend_from_slice(&page[in_page..in_page + n]);
            cursor += n as u64;
        }
        Ok(out)
    }
}

/// Collapse runs of whitespace so recorded and issued commands compare equal
fn normalize_command(command: &str) -> String {
    command.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_unmapped_read_fails() {
        let port = SnapshotPort::new();
        let err = port.read_bytes(Address(0x1000), 8).unwrap_err();
        assert_eq!(err, ReadError::Unmapped { address: Address(0x1000), len: 8 });
    }

    #[test]
    fn test_read_spanning_pages() {
        let mut port = SnapshotPort::new();
        let data: Vec<u8> = (0u8..32).collect();
        port.write_bytes(Address(0x1ff0), &data);
        assert_eq!(port.read_bytes(Address(0x1ff0), 32).unwrap(), data);
    }

    #[test]
    fn test_oversized_read_fails_at_first_gap() {
        let mut port = SnapshotPort::new();
        port.write_u64(Address(0x1000), 7);
        let len = 1usize << 40;
        let err = port.read_bytes(Address(0x1000), len).unwrap_err();
        assert_eq!(err, ReadError::Unmapped { address: Address(0x1000), len });
    }

    #[test]
    fn test_read_past_captured_page_fails() {
        let mut port = SnapshotPort::new();
        port.write_u64(Address(0x1ff8), 7);
        assert!(port.read_bytes(Address(0x1ff8), 16).is_err());
    }

    #[test]
    fn test_read_struct_fields() {
        let mut port = SnapshotPort::new();
        port.define_field("_T", "Count", 0x10, 4).define_field("_T", "Next.Flink", 0x18, 8);
        port.write_u32(Address(0x5010), 3).write_u64(Address(0x5018), 0xdead_beef);

        let s = port.read_struct(Address(0x5000), "_T").unwrap();
        assert_eq!(s.field("Count").unwrap(), 3);
        assert_eq!(s.pointer("Next.Flink").unwrap(), Address(0xdead_beef));
    }

    #[test]
    fn test_read_struct_unknown_type() {
        let port = SnapshotPort::new();
        assert_eq!(
            port.read_struct(Address(0x5000), "_NOPE"),
            Err(ReadError::UnknownType("_NOPE".to_string()))
        );
    }

    #[test]
    fn test_command_whitespace_is_normalized() {
        let mut port = SnapshotPort::new();
        port.record_command("!process  ffff0000 0", ["PROCESS ffff0000"]);
        assert_eq!(port.execute_command("!process ffff0000 0").unwrap(), vec!["PROCESS ffff0000"]);
        assert!(port.execute_command("!process 1234 0").is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "build": 19045,
                "regions": [{{ "base": "0x2000", "bytes": "0102030405060708" }}],
                "types": {{ "_T": {{ "Value": {{ "offset": 0, "size": 8 }} }} }},
                "commands": {{ "!echo": ["hi"] }}
            }}"#
        )
        .unwrap();

        let port = SnapshotPort::from_file(file.path()).unwrap();
        assert_eq!(port.build(), Some(19045));
        assert_eq!(
            port.read_struct(Address(0x2000), "_T").unwrap().field("Value").unwrap(),
            0x0807_0605_0403_0201
        );
        assert_eq!(port.execute_command("!echo").unwrap(), vec!["hi"]);
    }

    #[test]
    fn test_bad_region_hex() {
        let err = SnapshotPort::from_json(r#"{"regions":[{"base":"0x10","bytes":"zz"}]}"#)
            .unwrap_err();
        assert!(matches!(err, SnapshotError::BadRegionBytes { .. }));
    }

    #[test]
    fn test_bad_field_size() {
        let err = SnapshotPort::from_json(r#"{"types":{"_T":{"F":{"offset":0,"size":3}}}}"#)
            .unwrap_err();
        assert!(matches!(err, SnapshotError::BadFieldSize { size: 3, .. }));
    }
}
