//! # Inbound Ports
//!
//! API exposed by the sync engine.

use super::outbound::BlockSource;
use crate::config::SyncConfig;
use crate::domain::{SyncError, SyncReport};
use async_trait::async_trait;
use shared_types::LedgerId;
use tokio::sync::watch;

/// Parameters of one sync pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncRequest {
    pub ledger: LedgerId,
    pub start_height: u64,
    pub force_full_rescan: bool,
}

impl SyncRequest {
    /// Request for `ledger` using the configured start height and rescan
    /// flag.
    pub fn new(ledger: LedgerId, config: &SyncConfig) -> Self {
        Self {
            ledger,
            start_height: config.start_height,
            force_full_rescan: config.force_full_rescan,
        }
    }

    pub fn with_full_rescan(mut self) -> Self {
        self.force_full_rescan = true;
        self
    }
}

/// Sync engine API.
#[async_trait]
pub trait SyncApi: Send + Sync {
    /// Run one pass against `source`.
    ///
    /// `cancel` is checked between blocks; once it reads `true` the pass
    /// stops with `SyncError::Cancelled` and committed blocks stay.
    async fn run_sync(
        &self,
        source: &dyn BlockSource,
        request: SyncRequest,
        cancel: watch::Receiver<bool>,
    ) -> Result<SyncReport, SyncError>;
}
