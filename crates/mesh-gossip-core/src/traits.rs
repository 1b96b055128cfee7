//! Collaborator seams for the protocol core
//!
//! The core is I/O-free: packet delivery, time, and membership-change
//! auditing are supplied by the embedding process through these traits.

use crate::types::NodeAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Fire-and-forget packet transport between logical addresses.
///
/// There is no delivery guarantee and no error channel back into the
/// protocol: a lost send is masked by the next gossip round.
/// Implementations swallow (and may log) transport-level failures.
pub trait Transport {
    fn send(&mut self, from: NodeAddr, to: NodeAddr, payload: &[u8]);
}

/// Monotonically non-decreasing logical time source.
///
/// The same clock feeds `last_updated` stamps and the eviction-timeout
/// comparison, so the unit is arbitrary as long as it is consistent.
pub trait Clock {
    fn now(&self) -> u64;
}

/// Observational hooks for membership changes.
///
/// Invoked after the table mutation has been applied; no return value
/// and no effect on protocol state.
pub trait MembershipObserver {
    fn member_added(&mut self, local: NodeAddr, peer: NodeAddr) {
        let _ = (local, peer);
    }

    fn member_removed(&mut self, local: NodeAddr, peer: NodeAddr) {
        let _ = (local, peer);
    }
}

/// No-op observer for embeddings that do not audit membership.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl MembershipObserver for NullObserver {}

/// Shared counter clock, advanced externally one unit per tick.
///
/// Clones share the same counter, so the driving loop and the node it
/// drives observe identical time.
#[derive(Debug, Default, Clone)]
pub struct TickClock(Arc<AtomicU64>);

impl TickClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance time by one unit and return the new value.
    pub fn advance(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed) + 1
    }
}

impl Clock for TickClock {
    fn now(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_clock_is_shared_across_clones() {
        let clock = TickClock::new();
        let view = clock.clone();
        assert_eq!(view.now(), 0);
        assert_eq!(clock.advance(), 1);
        assert_eq!(view.now(), 1);
    }
}
