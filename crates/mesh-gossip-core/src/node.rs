//! Per-node protocol state machine
//!
//! A [`Node`] owns one membership table and runs the whole protocol on
//! a single logical thread of control: the embedding process feeds
//! received payloads through [`Node::enqueue`] and calls [`Node::tick`]
//! once per tick interval. Each tick drains the inbound queue through
//! the dispatcher, then runs exactly one gossip round if the node has
//! joined the group.

use crate::store::MembershipStore;
use crate::traits::{Clock, MembershipObserver, Transport};
use crate::types::{Message, NodeAddr, SnapshotEntry};
use crate::wire;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::VecDeque;
use tracing::{debug, info, warn};

/// Protocol timing knobs, in logical clock units.
#[derive(Debug, Clone, Copy)]
pub struct ProtocolConfig {
    /// Staleness age at which a member is presumed failed and removed.
    pub evict_timeout: u64,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self { evict_timeout: 20 }
    }
}

/// Counters exposed for the daemon's stats surface and for tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NodeStats {
    /// Gossip rounds executed.
    pub rounds: u64,
    /// Messages dispatched.
    pub messages: u64,
    /// Payloads rejected by the decoder.
    pub rejected: u64,
}

/// Dissemination fanout: `max(1, floor(log2(n)))` peers, 0 when the
/// table is empty.
pub fn fanout_size(n: usize) -> usize {
    if n == 0 {
        0
    } else {
        (usize::BITS as usize - 1 - n.leading_zeros() as usize).max(1)
    }
}

/// One group member: join state machine, message dispatcher, failure
/// detector, and disseminator over a shared [`MembershipStore`].
pub struct Node<C: Clock, O: MembershipObserver> {
    addr: NodeAddr,
    introducer: NodeAddr,
    config: ProtocolConfig,
    heartbeat: u64,
    joined: bool,
    failed: bool,
    store: MembershipStore,
    inbound: VecDeque<Vec<u8>>,
    clock: C,
    observer: O,
    rng: StdRng,
    stats: NodeStats,
}

impl<C: Clock, O: MembershipObserver> Node<C, O> {
    pub fn new(
        addr: NodeAddr,
        introducer: NodeAddr,
        config: ProtocolConfig,
        clock: C,
        observer: O,
    ) -> Self {
        Self {
            addr,
            introducer,
            config,
            heartbeat: 0,
            joined: false,
            failed: false,
            store: MembershipStore::new(),
            inbound: VecDeque::new(),
            clock,
            observer,
            rng: StdRng::from_entropy(),
            stats: NodeStats::default(),
        }
    }

    /// Deterministic peer selection, for tests.
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn addr(&self) -> NodeAddr {
        self.addr
    }

    pub fn is_joined(&self) -> bool {
        self.joined
    }

    pub fn is_failed(&self) -> bool {
        self.failed
    }

    pub fn heartbeat(&self) -> u64 {
        self.heartbeat
    }

    pub fn store(&self) -> &MembershipStore {
        &self.store
    }

    pub fn stats(&self) -> NodeStats {
        self.stats
    }

    /// Begin the join handshake.
    ///
    /// The founder (own address equals the introducer address) joins
    /// immediately with an empty table. Everyone else sends a JoinReq
    /// and returns without waiting; the JoinRep is handled whenever it
    /// arrives through the dispatcher.
    pub fn start(&mut self, transport: &mut dyn Transport) {
        if self.addr == self.introducer {
            info!(addr = %self.addr, "founding the group");
            self.joined = true;
            return;
        }
        info!(addr = %self.addr, introducer = %self.introducer, "requesting to join");
        self.send(
            transport,
            self.introducer,
            &Message::JoinReq {
                sender: self.addr,
                heartbeat: self.heartbeat,
            },
        );
    }

    /// Transport delivery callback: queue a received payload for the
    /// next tick. A failed node receives nothing.
    pub fn enqueue(&mut self, payload: Vec<u8>) {
        if self.failed {
            return;
        }
        self.inbound.push_back(payload);
    }

    /// Mark the node as failed. Terminal: all further ticks and
    /// deliveries are ignored.
    pub fn fail(&mut self) {
        self.failed = true;
    }

    /// One scheduler tick: drain the inbound queue, then run a gossip
    /// round if joined. Messages are drained even before the join
    /// completes, since the JoinRep itself arrives this way.
    pub fn tick(&mut self, transport: &mut dyn Transport) {
        if self.failed {
            return;
        }

        while let Some(payload) = self.inbound.pop_front() {
            self.handle_message(&payload, transport);
        }

        if self.joined {
            self.gossip_round(transport);
        }
    }

    /// Dispatcher: decode one payload and route it by kind. Payloads
    /// that do not decode are rejected without side effects.
    fn handle_message(&mut self, payload: &[u8], transport: &mut dyn Transport) {
        let msg = match wire::decode(payload) {
            Ok(msg) => msg,
            Err(err) => {
                self.stats.rejected += 1;
                warn!(addr = %self.addr, %err, "rejecting undecodable payload");
                return;
            }
        };
        self.stats.messages += 1;

        match msg {
            Message::JoinReq { sender, heartbeat } => {
                self.handle_join_req(sender, heartbeat, transport)
            }
            Message::JoinRep {
                sender,
                heartbeat,
                snapshot,
            } => self.handle_join_rep(sender, heartbeat, &snapshot),
            Message::Heartbeat {
                sender,
                heartbeat,
                snapshot,
            } => self.handle_heartbeat(sender, heartbeat, &snapshot),
        }
    }

    /// Introducer side of the handshake: admit the requester and reply
    /// with our table as it stood before the admission.
    fn handle_join_req(&mut self, sender: NodeAddr, heartbeat: u64, transport: &mut dyn Transport) {
        let now = self.clock.now();
        let snapshot = self.store.snapshot();

        if self.store.insert(sender, heartbeat, now) {
            self.observer.member_added(self.addr, sender);
        }
        debug!(addr = %self.addr, peer = %sender, "admitted join request");

        self.send(
            transport,
            sender,
            &Message::JoinRep {
                sender: self.addr,
                heartbeat: self.heartbeat,
                snapshot,
            },
        );
    }

    /// Joining side of the handshake: record the introducer, mark
    /// ourselves joined, and merge the carried table.
    fn handle_join_rep(&mut self, sender: NodeAddr, heartbeat: u64, snapshot: &[SnapshotEntry]) {
        let now = self.clock.now();

        if self.store.insert(sender, heartbeat, now) {
            self.observer.member_added(self.addr, sender);
        }
        self.joined = true;
        info!(addr = %self.addr, introducer = %sender, "joined the group");

        self.merge(snapshot, now);
    }

    /// Heartbeat: record the sender's own freshness first (the copy of
    /// the sender inside its carried snapshot may be staler), then
    /// merge the carried table.
    fn handle_heartbeat(&mut self, sender: NodeAddr, heartbeat: u64, snapshot: &[SnapshotEntry]) {
        let now = self.clock.now();

        let sender_row = [SnapshotEntry {
            addr: sender,
            heartbeat,
            last_updated: now,
        }];
        self.merge(&sender_row, now);
        self.merge(snapshot, now);
    }

    fn merge(&mut self, snapshot: &[SnapshotEntry], now: u64) {
        self.store.merge_snapshot(
            self.addr,
            snapshot,
            now,
            self.config.evict_timeout,
            &mut self.observer,
        );
    }

    /// One gossip round: advance our heartbeat, evict stale members,
    /// and push our view to a random logarithmic fanout of peers.
    fn gossip_round(&mut self, transport: &mut dyn Transport) {
        self.stats.rounds += 1;
        self.heartbeat += 1;

        let now = self.clock.now();
        for peer in self.store.evict_expired(now, self.config.evict_timeout) {
            info!(addr = %self.addr, %peer, "evicting unresponsive member");
            self.observer.member_removed(self.addr, peer);
        }

        let peers = self.store.addrs();
        let k = fanout_size(peers.len());
        if k == 0 {
            return;
        }

        // Shuffle-and-take sampling without replacement; self is never
        // a candidate because self is never stored.
        let targets: Vec<NodeAddr> = peers.choose_multiple(&mut self.rng, k).copied().collect();

        let msg = Message::Heartbeat {
            sender: self.addr,
            heartbeat: self.heartbeat,
            snapshot: self.store.snapshot(),
        };
        for target in targets {
            self.send(transport, target, &msg);
        }
    }

    fn send(&mut self, transport: &mut dyn Transport, to: NodeAddr, msg: &Message) {
        match wire::encode(msg) {
            Ok(payload) => transport.send(self.addr, to, &payload),
            Err(err) => warn!(addr = %self.addr, %to, %err, "dropping unencodable message"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{NullObserver, TickClock};

    /// Transport that records every send for inspection.
    #[derive(Debug, Default)]
    struct RecordingTransport {
        sent: Vec<(NodeAddr, NodeAddr, Vec<u8>)>,
    }

    impl Transport for RecordingTransport {
        fn send(&mut self, from: NodeAddr, to: NodeAddr, payload: &[u8]) {
            self.sent.push((from, to, payload.to_vec()));
        }
    }

    fn addr(id: u32) -> NodeAddr {
        NodeAddr::new(id, 9100)
    }

    fn node(id: u32, introducer: u32, clock: TickClock) -> Node<TickClock, NullObserver> {
        Node::new(
            addr(id),
            addr(introducer),
            ProtocolConfig::default(),
            clock,
            NullObserver,
        )
        .with_rng_seed(7)
    }

    #[test]
    fn fanout_table() {
        for (n, k) in [(0, 0), (1, 1), (2, 1), (3, 1), (4, 2), (8, 3), (9, 3)] {
            assert_eq!(fanout_size(n), k, "n = {n}");
        }
    }

    #[test]
    fn founder_joins_without_messages() {
        let mut transport = RecordingTransport::default();
        let mut founder = node(1, 1, TickClock::new());

        founder.start(&mut transport);

        assert!(founder.is_joined());
        assert!(founder.store().is_empty());
        assert!(transport.sent.is_empty());
    }

    #[test]
    fn joiner_sends_join_req_and_stays_unjoined() {
        let mut transport = RecordingTransport::default();
        let mut joiner = node(2, 1, TickClock::new());

        joiner.start(&mut transport);
        assert!(!joiner.is_joined());

        let (from, to, payload) = transport.sent.pop().unwrap();
        assert_eq!((from, to), (addr(2), addr(1)));
        assert_eq!(
            wire::decode(&payload).unwrap(),
            Message::JoinReq {
                sender: addr(2),
                heartbeat: 0
            }
        );

        // Without a JoinRep the node never gossips.
        joiner.tick(&mut transport);
        assert!(transport.sent.is_empty());
        assert_eq!(joiner.stats().rounds, 0);
    }

    #[test]
    fn introducer_replies_with_pre_admission_snapshot() {
        let mut transport = RecordingTransport::default();
        let mut introducer = node(1, 1, TickClock::new());
        introducer.start(&mut transport);

        // An earlier member is already known.
        introducer.enqueue(
            wire::encode(&Message::JoinReq {
                sender: addr(2),
                heartbeat: 0,
            })
            .unwrap(),
        );
        introducer.tick(&mut transport);
        transport.sent.clear();

        introducer.enqueue(
            wire::encode(&Message::JoinReq {
                sender: addr(3),
                heartbeat: 0,
            })
            .unwrap(),
        );
        introducer.tick(&mut transport);

        assert!(introducer.store().contains(&addr(3)));

        let reply = transport
            .sent
            .iter()
            .find(|(_, to, _)| *to == addr(3))
            .expect("JoinRep to the requester");
        match wire::decode(&reply.2).unwrap() {
            Message::JoinRep { sender, snapshot, .. } => {
                assert_eq!(sender, addr(1));
                let keys: Vec<NodeAddr> = snapshot.iter().map(|r| r.addr).collect();
                assert!(keys.contains(&addr(2)));
                assert!(!keys.contains(&addr(3)), "snapshot predates the admission");
            }
            other => panic!("expected JoinRep, got {other:?}"),
        }
    }

    #[test]
    fn join_rep_completes_the_handshake() {
        let mut transport = RecordingTransport::default();
        let mut joiner = node(2, 1, TickClock::new());
        joiner.start(&mut transport);

        joiner.enqueue(
            wire::encode(&Message::JoinRep {
                sender: addr(1),
                heartbeat: 4,
                snapshot: vec![SnapshotEntry {
                    addr: addr(3),
                    heartbeat: 2,
                    last_updated: 0,
                }],
            })
            .unwrap(),
        );
        joiner.tick(&mut transport);

        assert!(joiner.is_joined());
        assert!(joiner.store().contains(&addr(1)));
        assert!(joiner.store().contains(&addr(3)));
        assert!(!joiner.store().contains(&addr(2)));
    }

    #[test]
    fn heartbeat_refreshes_sender_before_snapshot() {
        let clock = TickClock::new();
        let mut transport = RecordingTransport::default();
        let mut n = node(1, 1, clock.clone());
        n.start(&mut transport);

        // Sender 2 gossips a staler copy of itself inside its own
        // snapshot; the synthetic sender row must win.
        n.enqueue(
            wire::encode(&Message::Heartbeat {
                sender: addr(2),
                heartbeat: 10,
                snapshot: vec![SnapshotEntry {
                    addr: addr(2),
                    heartbeat: 6,
                    last_updated: 0,
                }],
            })
            .unwrap(),
        );
        n.tick(&mut transport);

        assert_eq!(n.store().get(&addr(2)).unwrap().heartbeat, 10);
    }

    #[test]
    fn round_contacts_exactly_fanout_distinct_peers() {
        let clock = TickClock::new();
        let mut transport = RecordingTransport::default();
        let mut n = node(1, 1, clock.clone());
        n.start(&mut transport);

        for id in 2..=10 {
            n.enqueue(
                wire::encode(&Message::JoinReq {
                    sender: addr(id),
                    heartbeat: 0,
                })
                .unwrap(),
            );
        }
        n.tick(&mut transport);
        transport.sent.clear();

        clock.advance();
        n.tick(&mut transport);

        // 9 members after eviction: fanout is floor(log2(9)) = 3.
        let mut targets: Vec<NodeAddr> = transport.sent.iter().map(|(_, to, _)| *to).collect();
        targets.sort();
        targets.dedup();
        assert_eq!(transport.sent.len(), 3);
        assert_eq!(targets.len(), 3);
        assert!(!targets.contains(&addr(1)));
    }

    #[test]
    fn eviction_happens_on_the_round_after_the_threshold() {
        let clock = TickClock::new();
        let mut transport = RecordingTransport::default();
        let mut n = node(1, 1, clock.clone());
        n.start(&mut transport);

        n.enqueue(
            wire::encode(&Message::JoinReq {
                sender: addr(2),
                heartbeat: 0,
            })
            .unwrap(),
        );
        n.tick(&mut transport);

        let timeout = ProtocolConfig::default().evict_timeout;
        for _ in 0..timeout - 1 {
            clock.advance();
            n.tick(&mut transport);
        }
        assert!(n.store().contains(&addr(2)));

        clock.advance();
        n.tick(&mut transport);
        assert!(!n.store().contains(&addr(2)));
    }

    #[test]
    fn garbage_payload_leaves_state_untouched() {
        let mut transport = RecordingTransport::default();
        let mut n = node(1, 1, TickClock::new());
        n.start(&mut transport);

        n.enqueue(vec![0xFF, 0xFF, 0xFF]);
        n.tick(&mut transport);

        assert!(n.store().is_empty());
        assert_eq!(n.stats().rejected, 1);
        assert_eq!(n.stats().messages, 0);
    }

    #[test]
    fn failed_node_is_inert() {
        let mut transport = RecordingTransport::default();
        let mut n = node(1, 1, TickClock::new());
        n.start(&mut transport);
        n.fail();
        assert!(n.is_failed());

        n.enqueue(
            wire::encode(&Message::JoinReq {
                sender: addr(2),
                heartbeat: 0,
            })
            .unwrap(),
        );
        n.tick(&mut transport);

        assert!(n.store().is_empty());
        assert!(transport.sent.is_empty());
        assert_eq!(n.stats().rounds, 0);
    }
}
