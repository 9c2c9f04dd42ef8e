//! Report data models
//!
//! Immutable values handed upward by the scanner and the enumeration driver.
//! Nothing here holds a reference into target memory, so a report outlives
//! the port it was read from and serializes deterministically.

use serde::{Deserialize, Serialize};

use crate::domain::{Address, LoggerId};
use crate::identity::ProcessIdentity;

/// One active tracing session as listed by the logger directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggerEntry {
    pub address: Address,
    pub id: LoggerId,
    pub name: String,
}

impl LoggerEntry {
    #[must_use]
    pub fn new(address: Address, id: LoggerId, name: impl Into<String>) -> Self {
        Self { address, id, name: name.into() }
    }
}

/// Logger context fields read for one scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggerContext {
    pub address: Address,
    pub logger_id: LoggerId,
    pub name: String,
    /// Declared number of consumers; bounds the list walk
    pub consumer_count: u32,
    /// Address of the consumer list head inside the context
    pub consumer_list_head: Address,
}

/// One consumer node and the identity of its process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerEntry {
    pub node: Address,
    pub process_object: Address,
    pub identity: ProcessIdentity,
}

/// Consumers of one session, in list order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionReport {
    pub logger: LoggerContext,
    pub consumers: Vec<ConsumerEntry>,
    /// Why the scan degraded to an empty report, if it did
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SessionReport {
    #[must_use]
    pub fn resolved_count(&self) -> usize {
        self.consumers.iter().filter(|c| c.identity.is_resolved()).count()
    }
}

/// All sessions plus summary counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateReport {
    pub sessions: Vec<SessionReport>,
    pub total_sessions: usize,
    /// Sessions with at least one consumer entry
    pub sessions_with_consumers: usize,
    /// Consumer entries across all sessions, resolved or not
    pub total_consumers: usize,
    /// Consumer entries whose PID was recovered
    pub resolved_consumers: usize,
}

impl AggregateReport {
    /// Compute the summary counters over `sessions`
    #[must_use]
    pub fn from_sessions(sessions: Vec<SessionReport>) -> Self {
        let sessions_with_consumers = sessions.iter().filter(|s| !s.consumers.is_empty()).count();
        let total_consumers = sessions.iter().map(|s| s.consumers.len()).sum();
        let resolved_consumers = sessions.iter().map(SessionReport::resolved_count).sum();

        Self {
            total_sessions: sessions.len(),
            sessions_with_consumers,
            total_consumers,
            resolved_consumers,
            sessions,
        }
    }
}
