//! UDP transport for the gossip plane
//!
//! Logical addresses map onto `host:port` socket addresses; the numeric
//! id travels inside the messages themselves. Sends are fire-and-forget
//! to match the protocol's no-guarantee delivery model: a dropped
//! datagram is masked by the next gossip round.

use mesh_gossip_core::{NodeAddr, Transport};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::net::UdpSocket;
use tracing::debug;

/// Fire-and-forget UDP sender over a shared bound socket.
pub struct UdpTransport {
    socket: Arc<UdpSocket>,
    host: IpAddr,
}

impl UdpTransport {
    pub fn new(socket: Arc<UdpSocket>, host: IpAddr) -> Self {
        Self { socket, host }
    }

    fn resolve(&self, addr: NodeAddr) -> SocketAddr {
        SocketAddr::new(self.host, addr.port)
    }
}

impl Transport for UdpTransport {
    fn send(&mut self, from: NodeAddr, to: NodeAddr, payload: &[u8]) {
        let target = self.resolve(to);
        if let Err(err) = self.socket.try_send_to(payload, target) {
            // No retry here; re-gossip covers transient loss.
            debug!(%from, %to, %target, %err, "dropped outbound datagram");
        }
    }
}
