//! Core protocol types for the membership gossip plane
//!
//! All types here are designed for deterministic serialization via postcard.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical node address: numeric identifier plus port.
///
/// Together the two fields form the unique key of a membership record.
/// The wire format is structured; there is no packed byte-array address.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeAddr {
    pub id: u32,
    pub port: u16,
}

impl NodeAddr {
    pub fn new(id: u32, port: u16) -> Self {
        Self { id, port }
    }
}

impl fmt::Display for NodeAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.id, self.port)
    }
}

/// Stored liveness metadata for one known peer.
///
/// `heartbeat` is the highest counter ever observed for the peer;
/// merges never regress it. `last_updated` is the local logical time at
/// which `heartbeat` last strictly advanced, and is consulted only by
/// the eviction sweep, never for ordering between peers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemberEntry {
    pub heartbeat: u64,
    pub last_updated: u64,
}

/// One row of a gossiped membership snapshot.
///
/// Carries the sender's `last_updated` stamp so a receiver can refuse
/// to admit entries the sender itself already considers stale.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SnapshotEntry {
    pub addr: NodeAddr,
    pub heartbeat: u64,
    pub last_updated: u64,
}

/// Membership protocol messages.
///
/// `JoinReq` initiates the bootstrap handshake; `JoinRep` completes it
/// and carries the introducer's table; `Heartbeat` is the periodic
/// dissemination message carrying the sender's full table.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum Message {
    JoinReq {
        sender: NodeAddr,
        heartbeat: u64,
    },
    JoinRep {
        sender: NodeAddr,
        heartbeat: u64,
        snapshot: Vec<SnapshotEntry>,
    },
    Heartbeat {
        sender: NodeAddr,
        heartbeat: u64,
        snapshot: Vec<SnapshotEntry>,
    },
}

impl Message {
    /// Logical sender address, present in every message kind.
    pub fn sender(&self) -> NodeAddr {
        match self {
            Message::JoinReq { sender, .. }
            | Message::JoinRep { sender, .. }
            | Message::Heartbeat { sender, .. } => *sender,
        }
    }
}
