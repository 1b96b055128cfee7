//! memberd - gossip membership daemon
//!
//! Each process is one group member: it joins through the configured
//! introducer, then gossips its membership view on every tick.

use clap::Parser;
use memberd::config::Config;
use memberd::server::Server;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> ExitCode {
    // Parse configuration
    let config = Config::parse();

    // Initialize logging
    let default_directives = if config.verbose {
        "memberd=debug,mesh_gossip_core=debug"
    } else {
        "memberd=info,mesh_gossip_core=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));
    if config.log_format == "json" {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init();
    }

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        return ExitCode::FAILURE;
    }

    info!(
        "memberd v{} - gossip membership daemon",
        env!("CARGO_PKG_VERSION")
    );

    let server = Server::new(config);

    let shutdown = server.shutdown_handle();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        let _ = shutdown.send(());
    });

    if let Err(e) = server.run().await {
        error!("Server error: {:#}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
