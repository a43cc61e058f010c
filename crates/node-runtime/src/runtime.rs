//! # Sync Loop
//!
//! Runs one sync pass per poll interval until shutdown is signalled. The
//! shutdown receiver doubles as the pass's cancellation signal, so Ctrl+C
//! stops a long pass between blocks.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::adapters::JsonFileBlockSource;
use did_02_chain_sync::{
    BlockSource, MockBlockSource, SourceError, SyncApi, SyncConfig, SyncError, SyncReport,
    SyncRequest,
};
use shared_types::LedgerId;

/// Block source whose view of upstream can be refreshed between passes.
#[async_trait]
pub trait ReloadableSource: BlockSource {
    async fn reload(&self) -> Result<(), SourceError> {
        Ok(())
    }
}

#[async_trait]
impl ReloadableSource for JsonFileBlockSource {
    async fn reload(&self) -> Result<(), SourceError> {
        self.refresh().await
    }
}

#[async_trait]
impl ReloadableSource for MockBlockSource {}

/// Periodic driver of one ledger's sync passes.
pub struct SyncLoop<E: SyncApi, B: ReloadableSource> {
    engine: Arc<E>,
    source: Arc<B>,
    ledger: LedgerId,
    config: SyncConfig,
}

impl<E: SyncApi, B: ReloadableSource> SyncLoop<E, B> {
    pub fn new(engine: Arc<E>, source: Arc<B>, ledger: LedgerId, config: SyncConfig) -> Self {
        Self {
            engine,
            source,
            ledger,
            config,
        }
    }

    /// Run passes until `shutdown` reads `true` or its sender is dropped.
    /// Returns the number of passes attempted.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> usize {
        let interval = Duration::from_secs(self.config.poll_interval_secs.max(1));
        let mut passes = 0;
        info!(
            "Sync loop started for {} (every {}s)",
            self.ledger,
            interval.as_secs()
        );

        loop {
            if *shutdown.borrow() {
                break;
            }
            self.tick(shutdown.clone()).await;
            passes += 1;

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = tokio::time::sleep(interval) => {}
            }
        }

        info!("Sync loop for {} stopped after {} passes", self.ledger, passes);
        passes
    }

    /// One pass: reload the source, sync, log the outcome.
    pub async fn tick(&self, cancel: watch::Receiver<bool>) -> Option<SyncReport> {
        if let Err(e) = self.source.reload().await {
            warn!("Upstream reload failed, skipping pass: {}", e);
            return None;
        }

        let request = SyncRequest::new(self.ledger, &self.config);
        match self.engine.run_sync(self.source.as_ref(), request, cancel).await {
            Ok(report) => {
                if !report.is_noop() {
                    info!(
                        "Synced {}: +{} blocks ({} forks), {} operations, switched: {}, tip: {}",
                        report.ledger,
                        report.blocks_added,
                        report.forks_recorded,
                        report.operations_accepted,
                        report.branch_switched,
                        report
                            .local_tip
                            .map_or_else(|| "none".to_string(), |t| t.to_string())
                    );
                }
                Some(report)
            }
            Err(SyncError::Cancelled) => {
                info!("Sync pass for {} cancelled", self.ledger);
                None
            }
            Err(e) => {
                warn!("Sync pass for {} failed ({:?}): {}", self.ledger, e.category(), e);
                None
            }
        }
    }
}
