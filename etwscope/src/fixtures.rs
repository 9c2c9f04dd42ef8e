//! Synthetic kernel images for unit tests
//!
//! Lays out logger contexts, consumer lists and process objects in a
//! [`SnapshotPort`] using the default layout profile.

use crate::domain::Address;
use crate::layout::LayoutProfile;
use crate::memory::SnapshotPort;

pub const NUM_CONSUMERS_OFFSET: u64 = 0x168;
pub const PROCESS_OBJECT_OFFSET: u64 = 0x18;

pub struct KernelFixture {
    pub port: SnapshotPort,
    pub profile: LayoutProfile,
}

impl KernelFixture {
    pub fn new() -> Self {
        let profile = LayoutProfile::default();
        let mut port = SnapshotPort::new();
        port.define_field(&profile.logger_context_type, &profile.num_consumers_field, NUM_CONSUMERS_OFFSET, 4)
            .define_field(&profile.consumer_type, &profile.consumer_links_field, 0, 8)
            .define_field(&profile.consumer_type, "Links.Blink", 8, 8)
            .define_field(&profile.consumer_type, &profile.process_object_field, PROCESS_OBJECT_OFFSET, 8);
        Self { port, profile }
    }

    pub fn head_of(&self, logger: Address) -> Address {
        logger.offset(self.profile.consumer_list_offset)
    }

    /// A logger context whose list holds `nodes` (node, process object) in order
    pub fn logger(&mut self, logger: Address, num_consumers: u32, nodes: &[(Address, Address)]) {
        self.port.write_bytes(logger, &[0u8; 0x200]);
        self.port.write_u32(logger.offset(NUM_CONSUMERS_OFFSET), num_consumers);

        let head = self.head_of(logger);
        let mut ring = vec![head];
        ring.extend(nodes.iter().map(|(node, _)| *node));

        for (i, &entry) in ring.iter().enumerate() {
            let next = ring[(i + 1) % ring.len()];
            let prev = ring[(i + ring.len() - 1) % ring.len()];
            self.port.write_u64(entry, next.0);
            self.port.write_u64(entry.offset(8), prev.0);
        }
        for &(node, process) in nodes {
            self.port.write_u64(node.offset(PROCESS_OBJECT_OFFSET), process.0);
        }
    }

    /// Overwrite a node's forward link
    pub fn relink(&mut self, node: Address, next: Address) {
        self.port.write_u64(node, next.0);
    }

    /// A process the dump command can identify
    pub fn process_via_command(&mut self, process: Address, pid: u64, image: &str) {
        self.port.write_bytes(process, &[0u8; 0x600]);
        self.port.record_command(
            &format!("!process {} 0", process.to_command_hex()),
            [
                format!("PROCESS {}", process.to_command_hex()),
                format!("    SessionId: 1  Cid: {pid:04x}    Peb: 00000000  ParentCid: 0004"),
                format!("    Image: {image}"),
            ],
        );
    }

    /// A process only the offset probes can identify
    pub fn process_via_offsets(&mut self, process: Address, pid: u64, image: &str) {
        self.port.write_bytes(process, &[0u8; 0x600]);
        self.port.write_u64(process.offset(0x2E8), pid);
        let mut name = image.as_bytes().to_vec();
        name.push(0);
        self.port.write_bytes(process.offset(0x5A8), &name);
    }

    /// A mapped process object nothing can identify
    pub fn opaque_process(&mut self, process: Address) {
        self.port.write_bytes(process, &[0u8; 0x600]);
    }
}
