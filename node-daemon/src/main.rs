//! Node daemon binary
//!
//! Usage: `node-daemon [config.toml]`. Without a file, configuration comes
//! from `NODE_DAEMON_*`, `GUARD_*` and `LEDGER_SIM_*` environment variables.

use anyhow::Context;
use node_daemon::{open_keystore, server, start_local, DaemonConfig};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{filter::LevelFilter, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_target(false)
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => DaemonConfig::from_file(&path).with_context(|| format!("loading {}", path))?,
        None => DaemonConfig::from_env().context("loading configuration from environment")?,
    };
    info!(
        "Starting {} v{}",
        config.guard.service_name, config.guard.service_version
    );

    let keystore = open_keystore(&config)?;
    let node = start_local(&config, keystore)?;

    let addr = config.socket_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;

    server::serve(listener, node.guard, async {
        let _ = tokio::signal::ctrl_c().await;
        info!("Shutdown signal received");
    })
    .await?;

    node.ledger.shutdown().await?;
    info!("Node daemon stopped");
    Ok(())
}
