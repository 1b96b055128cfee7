//! Membership-change audit log

use mesh_gossip_core::{MembershipObserver, NodeAddr};
use tracing::info;

/// Observer that records membership changes on the tracing subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl MembershipObserver for TracingObserver {
    fn member_added(&mut self, local: NodeAddr, peer: NodeAddr) {
        info!(%local, %peer, "member added");
    }

    fn member_removed(&mut self, local: NodeAddr, peer: NodeAddr) {
        info!(%local, %peer, "member removed");
    }
}
