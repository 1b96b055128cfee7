//! memberd - Gossip Membership Daemon
//!
//! This daemon provides:
//! - Introducer-based join handshake
//! - Heartbeat-timeout failure detection
//! - Randomized logarithmic-fanout dissemination
//! - Anti-entropy reconciliation of membership views

pub mod config;
pub mod observe;
pub mod server;
pub mod transport;

pub use config::Config;
pub use observe::TracingObserver;
pub use server::Server;
pub use transport::UdpTransport;
