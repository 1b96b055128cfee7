//! memberd server - per-node protocol loop
//!
//! One node runs on one task: a socket reader feeds received datagrams
//! into a channel, and the loop below interleaves them with the tick
//! timer. Every protocol mutation happens on this task, so the
//! membership table needs no locking.

use crate::config::Config;
use crate::observe::TracingObserver;
use crate::transport::UdpTransport;
use anyhow::Context;
use mesh_gossip_core::traits::TickClock;
use mesh_gossip_core::{Node, ProtocolConfig};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{broadcast, mpsc};
use tokio::time::interval;
use tracing::{error, info};

const MAX_DATAGRAM: usize = 64 * 1024;

/// Server state
pub struct Server {
    config: Config,
    /// Shutdown signal
    shutdown_tx: broadcast::Sender<()>,
}

impl Server {
    pub fn new(config: Config) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            config,
            shutdown_tx,
        }
    }

    /// Signal the run loop to stop.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    pub fn shutdown_handle(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    /// Run the node until shutdown.
    pub async fn run(&self) -> anyhow::Result<()> {
        let bind_addr = SocketAddr::new(self.config.host, self.config.port);
        let socket = Arc::new(
            UdpSocket::bind(bind_addr)
                .await
                .with_context(|| format!("binding {bind_addr}"))?,
        );
        info!(
            addr = %self.config.self_addr(),
            introducer = %self.config.introducer_addr(),
            %bind_addr,
            "starting memberd"
        );

        let clock = TickClock::new();
        let mut transport = UdpTransport::new(socket.clone(), self.config.host);
        let mut node = Node::new(
            self.config.self_addr(),
            self.config.introducer_addr(),
            ProtocolConfig {
                evict_timeout: self.config.evict_timeout,
            },
            clock.clone(),
            TracingObserver,
        );

        node.start(&mut transport);

        let (inbound_tx, mut inbound_rx) = mpsc::channel::<Vec<u8>>(1024);
        let reader = spawn_reader(socket, inbound_tx);

        let mut ticker = interval(Duration::from_millis(self.config.tick_ms));
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    clock.advance();
                    node.tick(&mut transport);
                }
                Some(payload) = inbound_rx.recv() => {
                    node.enqueue(payload);
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutting down...");
                    break;
                }
            }
        }

        reader.abort();

        let stats = node.stats();
        info!(
            members = node.store().len(),
            heartbeat = node.heartbeat(),
            rounds = stats.rounds,
            messages = stats.messages,
            rejected = stats.rejected,
            "final membership state"
        );

        Ok(())
    }
}

/// Pump received datagrams into the node's inbound channel.
fn spawn_reader(
    socket: Arc<UdpSocket>,
    inbound_tx: mpsc::Sender<Vec<u8>>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut buf = vec![0u8; MAX_DATAGRAM];
        loop {
            match socket.recv_from(&mut buf).await {
                Ok((len, _src)) => {
                    if inbound_tx.send(buf[..len].to_vec()).await.is_err() {
                        break;
                    }
                }
                Err(err) => {
                    error!(%err, "receive error");
                }
            }
        }
    })
}
