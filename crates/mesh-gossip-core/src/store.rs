//! Membership table and anti-entropy merge
//!
//! One table per node, keyed by logical address. The table is mutated
//! from two drivers (inbound dispatch and the periodic gossip round)
//! that are serialized onto a single logical thread of control, so no
//! locking lives here.

use crate::traits::MembershipObserver;
use crate::types::{MemberEntry, NodeAddr, SnapshotEntry};
use std::collections::HashMap;

/// Authoritative per-node table of known peers.
///
/// Invariants: one entry per key, and the stored heartbeat for a key is
/// the maximum ever observed for it. The local node's own address is
/// never stored (enforced by the merge and join paths).
#[derive(Debug, Default)]
pub struct MembershipStore {
    entries: HashMap<NodeAddr, MemberEntry>,
}

impl MembershipStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite an entry. Returns true if the key was new.
    pub fn insert(&mut self, addr: NodeAddr, heartbeat: u64, now: u64) -> bool {
        self.entries
            .insert(
                addr,
                MemberEntry {
                    heartbeat,
                    last_updated: now,
                },
            )
            .is_none()
    }

    /// Advance an existing entry iff the incoming heartbeat is strictly
    /// greater than the stored one. Equal or lower heartbeats leave the
    /// entry untouched, including its freshness stamp.
    pub fn update_if_newer(&mut self, addr: NodeAddr, heartbeat: u64, now: u64) -> bool {
        match self.entries.get_mut(&addr) {
            Some(entry) if heartbeat > entry.heartbeat => {
                entry.heartbeat = heartbeat;
                entry.last_updated = now;
                true
            }
            _ => false,
        }
    }

    /// Remove every entry whose freshness stamp has aged past the
    /// timeout. Returns the evicted keys.
    pub fn evict_expired(&mut self, now: u64, evict_timeout: u64) -> Vec<NodeAddr> {
        let expired: Vec<NodeAddr> = self
            .entries
            .iter()
            .filter(|(_, e)| now.saturating_sub(e.last_updated) >= evict_timeout)
            .map(|(addr, _)| *addr)
            .collect();
        for addr in &expired {
            self.entries.remove(addr);
        }
        expired
    }

    pub fn contains(&self, addr: &NodeAddr) -> bool {
        self.entries.contains_key(addr)
    }

    pub fn get(&self, addr: &NodeAddr) -> Option<&MemberEntry> {
        self.entries.get(addr)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodeAddr, &MemberEntry)> {
        self.entries.iter()
    }

    /// Known peer addresses, for fanout selection.
    pub fn addrs(&self) -> Vec<NodeAddr> {
        self.entries.keys().copied().collect()
    }

    /// Send-time view of the table, as carried by JoinRep and Heartbeat.
    pub fn snapshot(&self) -> Vec<SnapshotEntry> {
        self.entries
            .iter()
            .map(|(addr, e)| SnapshotEntry {
                addr: *addr,
                heartbeat: e.heartbeat,
                last_updated: e.last_updated,
            })
            .collect()
    }

    /// Merge an incoming snapshot into the table (anti-entropy core).
    ///
    /// Two passes, in order:
    ///
    /// 1. Update: rows matching a local key with a strictly greater
    ///    heartbeat advance that entry and refresh its stamp.
    /// 2. Insertion: rows with an unknown key are admitted with a fresh
    ///    stamp, unless the key is the local node itself or the sender's
    ///    own stamp already marks the row as stale (a failed peer is not
    ///    resurrected by second-hand gossip).
    pub fn merge_snapshot<O: MembershipObserver>(
        &mut self,
        self_addr: NodeAddr,
        snapshot: &[SnapshotEntry],
        now: u64,
        evict_timeout: u64,
        observer: &mut O,
    ) {
        for row in snapshot {
            self.update_if_newer(row.addr, row.heartbeat, now);
        }

        for row in snapshot {
            if row.addr == self_addr || self.contains(&row.addr) {
                continue;
            }
            if now.saturating_sub(row.last_updated) >= evict_timeout {
                continue;
            }
            self.insert(row.addr, row.heartbeat, now);
            observer.member_added(self_addr, row.addr);
        }
    }
}
