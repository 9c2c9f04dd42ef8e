//! Bounded walk over a circular doubly-linked list in target memory
//!
//! The walker never trusts the list's shape beyond a bound declared by the
//! owning structure (for consumer lists: `NumConsumers`). A cycle that never
//! returns to the head, a stale node or a null link can make the list lie;
//! the count caps how much of that lie is believed.
//!
//! Stop conditions, checked before each node is visited:
//! - the current link is null
//! - the current link is the list head (normal end of list)
//! - the current link is the start node again (closed the circle)
//! - `max_nodes` nodes have been yielded
//!
//! An unreadable node ends the walk and keeps what was collected so far.

use log::{debug, warn};

use crate::domain::Address;
use crate::memory::MemoryPort;

/// Walks one list whose nodes are `node_type` structures linked through
/// `link_field`
pub struct ListWalker<'a> {
    port: &'a dyn MemoryPort,
    node_type: &'a str,
    link_field: &'a str,
}

impl<'a> ListWalker<'a> {
    #[must_use]
    pub fn new(port: &'a dyn MemoryPort, node_type: &'a str, link_field: &'a str) -> Self {
        Self { port, node_type, link_field }
    }

    /// Collect node addresses starting at `start` (the head's forward link).
    ///
    /// Returns at most `max_nodes` addresses, in list order. An empty list
    /// (`start == head`) or a zero bound returns immediately without reading.
    #[must_use]
    pub fn walk(&self, start: Address, head: Address, max_nodes: usize) -> Vec<Address> {
        if max_nodes == 0 || start == head {
            debug!(target: "etwscope::walker", "List at {head} is empty");
            return Vec::new();
        }

        let mut nodes = Vec::new();
        let mut current = start;

        while nodes.len() < max_nodes {
            if current.is_null() {
                debug!(target: "etwscope::walker", "Null link after {} nodes", nodes.len());
                return nodes;
            }
            if current == head {
                debug!(target: "etwscope::walker", "Reached list head after {} nodes", nodes.len());
                return nodes;
            }
            if !nodes.is_empty() && current == start {
                debug!(target: "etwscope::walker", "Looped back to start after {} nodes", nodes.len());
                return nodes;
            }

            let next = match self.next_link(current) {
                Ok(next) => next,
                Err(e) => {
                    warn!(
                        target: "etwscope::walker",
                        "Cannot read node at {current}: {e}; keeping {} nodes",
                        nodes.len()
                    );
                    return nodes;
                }
            };

            nodes.push(current);
            current = next;
        }

        debug!(target: "etwscope::walker", "Stopped at declared bound of {max_nodes} nodes");
        nodes
    }

    fn next_link(&self, node: Address) -> Result<Address, crate::domain::ReadError> {
        self.port.read_struct(node, self.node_type)?.pointer(self.link_field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::testing::CountingPort;
    use crate::memory::SnapshotPort;

    const NODE: &str = "_NODE";
    const LINK: &str = "Links.Flink";
    const HEAD: Address = Address(0xffff_e001_0000_1158);

    fn port_with_links(links: &[(u64, u64)]) -> SnapshotPort {
        let mut port = SnapshotPort::new();
        port.define_field(NODE, LINK, 0, 8);
        for &(node, next) in links {
            port.write_u64(Address(node), next);
        }
        port
    }

    #[test]
    fn test_empty_list_performs_no_reads() {
        let inner = port_with_links(&[]);
        let port = CountingPort::new(&inner);
        let nodes = ListWalker::new(&port, NODE, LINK).walk(HEAD, HEAD, 8);
        assert!(nodes.is_empty());
        assert_eq!(port.total_reads(), 0);
    }

    #[test]
    fn test_zero_bound_performs_no_reads() {
        let inner = port_with_links(&[(0x2000, HEAD.0)]);
        let port = CountingPort::new(&inner);
        let nodes = ListWalker::new(&port, NODE, LINK).walk(Address(0x2000), HEAD, 0);
        assert!(nodes.is_empty());
        assert_eq!(port.total_reads(), 0);
    }

    #[test]
    fn test_short_list_ends_at_head() {
        let port = port_with_links(&[(0x2000, 0x3000), (0x3000, 0x4000), (0x4000, HEAD.0)]);
        let nodes = ListWalker::new(&port, NODE, LINK).walk(Address(0x2000), HEAD, 10);
        assert_eq!(nodes, vec![Address(0x2000), Address(0x3000), Address(0x4000)]);
    }

    #[test]
    fn test_closed_circle_without_head() {
        let port = port_with_links(&[(0x2000, 0x3000), (0x3000, 0x2000)]);
        let nodes = ListWalker::new(&port, NODE, LINK).walk(Address(0x2000), HEAD, 10);
        assert_eq!(nodes, vec![Address(0x2000), Address(0x3000)]);
    }

    #[test]
    fn test_inner_cycle_is_bounded() {
        // 0x2000 -> 0x3000 -> 0x4000 -> 0x3000 -> ... never returns to start or head
        let inner = port_with_links(&[(0x2000, 0x3000), (0x3000, 0x4000), (0x4000, 0x3000)]);
        let port = CountingPort::new(&inner);
        let nodes = ListWalker::new(&port, NODE, LINK).walk(Address(0x2000), HEAD, 5);
        assert_eq!(nodes.len(), 5);
        assert!(port.struct_reads.get() <= 5);
    }

    #[test]
    fn test_self_loop_is_bounded() {
        let port = port_with_links(&[(0x2000, 0x3000), (0x3000, 0x3000)]);
        let nodes = ListWalker::new(&port, NODE, LINK).walk(Address(0x2000), HEAD, 4);
        assert_eq!(nodes.len(), 4);
    }

    #[test]
    fn test_null_link_ends_walk() {
        let port = port_with_links(&[(0x2000, 0x3000), (0x3000, 0)]);
        let nodes = ListWalker::new(&port, NODE, LINK).walk(Address(0x2000), HEAD, 10);
        assert_eq!(nodes, vec![Address(0x2000), Address(0x3000)]);
    }

    #[test]
    fn test_unreadable_node_keeps_partial_result() {
        // 0x3000 was never captured
        let port = port_with_links(&[(0x2000, 0x3000)]);
        let nodes = ListWalker::new(&port, NODE, LINK).walk(Address(0x2000), HEAD, 10);
        assert_eq!(nodes, vec![Address(0x2000)]);
    }

    #[test]
    fn test_head_compared_exactly() {
        // Differs from HEAD only in the lowest bit
        let near_head = HEAD.0 + 1;
        let port = port_with_links(&[(0x2000, near_head), (near_head, HEAD.0)]);
        let nodes = ListWalker::new(&port, NODE, LINK).walk(Address(0x2000), HEAD, 10);
        assert_eq!(nodes, vec![Address(0x2000), Address(near_head)]);
    }
}
