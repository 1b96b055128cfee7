//! Configuration for memberd

use clap::Parser;
use mesh_gossip_core::NodeAddr;
use std::net::IpAddr;

/// memberd - gossip membership daemon
#[derive(Parser, Debug, Clone)]
#[command(name = "memberd")]
#[command(about = "Gossip-based group membership daemon")]
pub struct Config {
    /// Numeric node identifier within the group
    #[arg(long, env = "MEMBERD_ID")]
    pub id: u32,

    /// UDP port this node binds (also its logical port)
    #[arg(short, long, default_value = "9100")]
    pub port: u16,

    /// Host all group members are reachable on
    #[arg(long, default_value = "127.0.0.1")]
    pub host: IpAddr,

    /// Introducer node identifier
    #[arg(long, default_value = "1")]
    pub introducer_id: u32,

    /// Introducer port
    #[arg(long, default_value = "9100")]
    pub introducer_port: u16,

    /// Tick interval in milliseconds
    #[arg(long, default_value = "250")]
    pub tick_ms: u64,

    /// Member eviction timeout, in ticks
    #[arg(long, default_value = "20")]
    pub evict_timeout: u64,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Log format (json or pretty)
    #[arg(long, default_value = "pretty")]
    pub log_format: String,
}

impl Config {
    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.tick_ms == 0 {
            anyhow::bail!("Tick interval must be non-zero");
        }
        if self.evict_timeout == 0 {
            anyhow::bail!("Eviction timeout must be non-zero");
        }
        Ok(())
    }

    /// This node's logical address.
    pub fn self_addr(&self) -> NodeAddr {
        NodeAddr::new(self.id, self.port)
    }

    /// The introducer's logical address.
    pub fn introducer_addr(&self) -> NodeAddr {
        NodeAddr::new(self.introducer_id, self.introducer_port)
    }
}
