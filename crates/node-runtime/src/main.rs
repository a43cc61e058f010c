//! # DID Anchor Node
//!
//! Follows one ledger's upstream chain and keeps the local block forest and
//! DID state in step with it.
//!
//! ## Startup Sequence
//!
//! 1. Initialize logging (`RUST_LOG`, default `info`)
//! 2. Load configuration (defaults, `DID_NODE_CONFIG` file, `DID_*` env)
//! 3. Build the chain store, resolver, parser and sync engine
//! 4. Open the upstream chain dump
//! 5. Poll until Ctrl+C, then let the running pass stop between blocks

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use node_runtime::adapters::JsonFileBlockSource;
use node_runtime::{NodeConfig, NodeContainer, SyncLoop};

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .with_thread_ids(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = NodeConfig::load().context("Failed to load node configuration")?;

    info!("===========================================");
    info!("  DID Anchor Node v{}", env!("CARGO_PKG_VERSION"));
    info!("  Ledger: {}", config.ledger);
    info!("  DID method: {}", config.protocol.did_method);
    info!("===========================================");

    let node = NodeContainer::new(config.clone());
    let source = JsonFileBlockSource::open(&config.chain_file)
        .await
        .with_context(|| format!("Failed to open chain dump {}", config.chain_file.display()))?;

    let sync_loop = SyncLoop::new(
        node.engine.clone(),
        Arc::new(source),
        config.ledger,
        config.sync.clone(),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(async move { sync_loop.run(shutdown_rx).await });

    info!("Node is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    info!("Initiating graceful shutdown...");
    if let Err(e) = shutdown_tx.send(true) {
        error!("Failed to send shutdown signal: {}", e);
    }
    handle.await.context("Sync loop task failed")?;

    let blocks = node.store.block_count(config.ledger);
    info!("Shutdown complete ({} blocks stored)", blocks);
    Ok(())
}
