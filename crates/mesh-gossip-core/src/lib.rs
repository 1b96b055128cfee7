//! Gossip Membership Core Library
//!
//! This crate provides the protocol core for a gossip-based group
//! membership service: each node maintains an eventually-consistent
//! view of the group, admits newcomers through an introducer handshake,
//! and detects failures through heartbeat timeouts disseminated to a
//! logarithmic fanout of random peers.
//!
//! # Modules
//!
//! - [`types`]: Protocol types (NodeAddr, MemberEntry, Message)
//! - [`wire`]: Postcard wire codec
//! - [`traits`]: Collaborator seams (Transport, Clock, MembershipObserver)
//! - [`store`]: Membership table and anti-entropy merge
//! - [`node`]: Per-node protocol state machine (join, dispatch, gossip round)
//! - [`error`]: Error types

pub mod error;
pub mod node;
pub mod store;
pub mod traits;
pub mod types;
pub mod wire;

pub use error::{Error, Result};
pub use node::{Node, NodeStats, ProtocolConfig};
pub use store::MembershipStore;
pub use traits::{Clock, MembershipObserver, Transport};
pub use types::{MemberEntry, Message, NodeAddr, SnapshotEntry};
