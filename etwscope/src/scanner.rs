//! # Session Scanner
//!
//! Scans one logger context: reads its declared consumer count, walks the
//! consumer list within that bound, and resolves each consumer's process.
//!
//! Every consumer with a non-null process object produces an entry, resolved
//! or not, so the report reflects the true number of consumers even when
//! identity lookup fails. A failure reading the logger context or its list
//! head degrades the whole session to an empty report carrying the reason;
//! it never aborts the enumeration.

use log::{debug, info, warn};

use crate::domain::{Address, ReadError, ScanError};
use crate::identity::IdentityResolver;
use crate::layout::LayoutProfile;
use crate::memory::{read_list_entry, MemoryPort};
use crate::report_data::{ConsumerEntry, LoggerContext, LoggerEntry, SessionReport};
use crate::walker::ListWalker;

/// Scans logger contexts against one port and layout profile
pub struct SessionScanner<'a> {
    port: &'a dyn MemoryPort,
    profile: &'a LayoutProfile,
    resolver: IdentityResolver<'a>,
}

impl<'a> SessionScanner<'a> {
    /// Scanner with the standard identity chain for `profile`
    #[must_use]
    pub fn new(port: &'a dyn MemoryPort, profile: &'a LayoutProfile) -> Self {
        Self::with_resolver(port, profile, IdentityResolver::from_profile(port, profile))
    }

    #[must_use]
    pub fn with_resolver(
        port: &'a dyn MemoryPort,
        profile: &'a LayoutProfile,
        resolver: IdentityResolver<'a>,
    ) -> Self {
        Self { port, profile, resolver }
    }

    /// Scan one logger context. Never fails; see the module docs.
    #[must_use]
    pub fn scan(&self, entry: &LoggerEntry) -> SessionReport {
        info!(
            target: "etwscope::scanner",
            "Scanning logger '{}' (ID: {}) at {}",
            entry.name,
            entry.id,
            entry.address
        );

        let mut logger = LoggerContext {
            address: entry.address,
            logger_id: entry.id,
            name: entry.name.clone(),
            consumer_count: 0,
            consumer_list_head: entry.address.offset(self.profile.consumer_list_offset),
        };

        match self.try_scan(&mut logger) {
            Ok(consumers) => SessionReport { logger, consumers, error: None },
            Err(e) => {
                warn!(target: "etwscope::scanner", "Skipping logger '{}': {e}", entry.name);
                SessionReport { logger, consumers: Vec::new(), error: Some(e.to_string()) }
            }
        }
    }

    fn try_scan(&self, logger: &mut LoggerContext) -> Result<Vec<ConsumerEntry>, ScanError> {
        let (logger_id, address) = (logger.logger_id, logger.address);
        let unreadable =
            |source: ReadError| ScanError::LoggerUnreadable { logger: logger_id, address, source };

        let context = self
            .port
            .read_struct(logger.address, &self.profile.logger_context_type)
            .map_err(unreadable)?;
        let declared = context.field(&self.profile.num_consumers_field).map_err(unreadable)?;
        logger.consumer_count = u32::try_from(declared).unwrap_or(u32::MAX);
        debug!(target: "etwscope::scanner", "  NumConsumers: {}", logger.consumer_count);

        if logger.consumer_count == 0 {
            return Ok(Vec::new());
        }

        let head = logger.consumer_list_head;
        let head_entry = read_list_entry(self.port, head)
            .map_err(|source| ScanError::ListHeadUnreadable { head, source })?;
        if head_entry.is_empty_head(head.0) {
            debug!(target: "etwscope::scanner", "  Consumer list at {head} is empty");
            return Ok(Vec::new());
        }

        let walker =
            ListWalker::new(self.port, &self.profile.consumer_type, &self.profile.consumer_links_field);
        let max_nodes = usize::try_from(logger.consumer_count).unwrap_or(usize::MAX);
        let nodes = walker.walk(Address(head_entry.flink), head, max_nodes);

        let consumers: Vec<ConsumerEntry> =
            nodes.into_iter().filter_map(|node| self.consumer_at(node)).collect();

        debug!(
            target: "etwscope::scanner",
            "  Found {} consumers ({} declared)",
            consumers.len(),
            logger.consumer_count
        );
        Ok(consumers)
    }

    /// Entry for one consumer node, or `None` if it has no usable process object
    fn consumer_at(&self, node: Address) -> Option<ConsumerEntry> {
        let process_object = match self
            .port
            .read_struct(node, &self.profile.consumer_type)
            .and_then(|c| c.pointer(&self.profile.process_object_field))
        {
            Ok(process) => process,
            Err(e) => {
                warn!(target: "etwscope::scanner", "  Cannot read consumer at {node}: {e}");
                return None;
            }
        };

        if process_object.is_null() {
            debug!(target: "etwscope::scanner", "  Consumer at {node} has no process object");
            return None;
        }

        let identity = self.resolver.resolve(process_object);
        Some(ConsumerEntry { node, process_object, identity })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{LoggerId, Pid, ResolutionSource};
    use crate::fixtures::KernelFixture;
    use crate::identity::ProcessIdentity;
    use crate::memory::testing::CountingPort;

    const LOGGER: Address = Address(0xffff_e001_0000_0000);

    fn entry() -> LoggerEntry {
        LoggerEntry::new(LOGGER, LoggerId(0x11), "EventLog-System")
    }

    fn node(i: u64) -> Address {
        Address(0xffff_e001_0001_0000 + i * 0x100)
    }

    fn process(i: u64) -> Address {
        Address(0xffff_e001_0100_0000 + i * 0x1000)
    }

    #[test]
    fn test_zero_consumers_skips_traversal() {
        let mut fx = KernelFixture::new();
        fx.logger(LOGGER, 0, &[]);
        let port = CountingPort::new(&fx.port);

        let report = SessionScanner::new(&port, &fx.profile).scan(&entry());
        assert!(report.consumers.is_empty());
        assert!(report.error.is_none());
        assert_eq!(report.logger.consumer_count, 0);
        assert_eq!(port.struct_reads.get(), 1);
        assert_eq!(port.byte_reads.get(), 0);
    }

    #[test]
    fn test_partial_identity_failure_keeps_every_consumer() {
        let mut fx = KernelFixture::new();
        fx.logger(
            LOGGER,
            3,
            &[(node(0), process(0)), (node(1), process(1)), (node(2), process(2))],
        );
        fx.process_via_command(process(0), 4242, "notepad.exe");
        fx.opaque_process(process(1));
        fx.process_via_offsets(process(2), 77, "svchost.exe");

        let report = SessionScanner::new(&fx.port, &fx.profile).scan(&entry());
        assert_eq!(report.consumers.len(), 3);
        assert_eq!(report.resolved_count(), 2);

        let c = &report.consumers;
        assert_eq!(c[0].node, node(0));
        assert_eq!(c[0].identity.pid, Pid(4242));
        assert_eq!(c[0].identity.source, ResolutionSource::CommandBased);
        assert_eq!(c[1].identity, ProcessIdentity::unresolved());
        assert_eq!(c[1].process_object, process(1));
        assert_eq!(c[2].identity.image_name, "svchost.exe");
        assert_eq!(c[2].identity.source, ResolutionSource::DirectOffsetProbe);
    }

    #[test]
    fn test_declared_count_bounds_longer_list() {
        let mut fx = KernelFixture::new();
        let nodes: Vec<_> = (0..4).map(|i| (node(i), process(i))).collect();
        fx.logger(LOGGER, 2, &nodes);
        for i in 0..4 {
            fx.process_via_offsets(process(i), 100 + i, "a.exe");
        }

        let report = SessionScanner::new(&fx.port, &fx.profile).scan(&entry());
        assert_eq!(report.consumers.len(), 2);
        assert_eq!(report.logger.consumer_count, 2);
    }

    #[test]
    fn test_corrupt_cycle_is_bounded_by_count() {
        let mut fx = KernelFixture::new();
        fx.logger(LOGGER, 3, &[(node(0), process(0)), (node(1), process(1))]);
        fx.process_via_offsets(process(0), 10, "a.exe");
        fx.process_via_offsets(process(1), 11, "b.exe");
        // node(1) points at itself instead of the head
        fx.relink(node(1), node(1));

        let report = SessionScanner::new(&fx.port, &fx.profile).scan(&entry());
        assert_eq!(report.consumers.len(), 3);
    }

    #[test]
    fn test_empty_list_with_nonzero_count() {
        let mut fx = KernelFixture::new();
        fx.logger(LOGGER, 2, &[]);
        let report = SessionScanner::new(&fx.port, &fx.profile).scan(&entry());
        assert!(report.consumers.is_empty());
        assert!(report.error.is_none());
        assert_eq!(report.logger.consumer_count, 2);
    }

    #[test]
    fn test_null_process_object_is_skipped() {
        let mut fx = KernelFixture::new();
        fx.logger(LOGGER, 2, &[(node(0), Address::NULL), (node(1), process(1))]);
        fx.process_via_command(process(1), 8, "csrss.exe");

        let report = SessionScanner::new(&fx.port, &fx.profile).scan(&entry());
        assert_eq!(report.consumers.len(), 1);
        assert_eq!(report.consumers[0].node, node(1));
    }

    #[test]
    fn test_unreadable_logger_degrades_to_empty() {
        let fx = KernelFixture::new();
        let report = SessionScanner::new(&fx.port, &fx.profile).scan(&entry());
        assert!(report.consumers.is_empty());
        let error = report.error.expect("degraded session records its error");
        assert!(error.contains("EventLog") || error.contains("0x11"));
        assert_eq!(report.logger.name, "EventLog-System");
        assert_eq!(report.logger.consumer_list_head, LOGGER.offset(0x158));
    }

    #[test]
    fn test_unreadable_list_head_degrades_to_empty() {
        // NumConsumers starts a captured page; the list head sits just before it
        let logger = Address(0xffff_e001_0000_5000 - 0x168);
        let mut fx = KernelFixture::new();
        fx.port.write_u32(logger.offset(0x168), 2);

        let entry = LoggerEntry::new(logger, LoggerId(4), "Split");
        let report = SessionScanner::new(&fx.port, &fx.profile).scan(&entry);
        assert!(report.consumers.is_empty());
        assert_eq!(report.logger.consumer_count, 2);
        let error = report.error.expect("degraded session records its error");
        assert!(error.contains("consumer list head"));
        assert!(error.contains(&logger.offset(0x158).to_string()));
    }

    #[test]
    fn test_unknown_logger_type_degrades_to_empty() {
        let mut fx = KernelFixture::new();
        fx.logger(LOGGER, 1, &[(node(0), process(0))]);
        let mut profile = fx.profile.clone();
        profile.logger_context_type = "_NOT_A_TYPE".to_string();

        let report = SessionScanner::new(&fx.port, &profile).scan(&entry());
        assert!(report.consumers.is_empty());
        assert!(report.error.unwrap().contains("_NOT_A_TYPE"));
    }
}
