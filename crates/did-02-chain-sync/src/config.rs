//! # Sync Configuration
//!
//! Tunables of the sync engine.

use serde::{Deserialize, Serialize};

/// Sync engine configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// First height the local lineage starts from.
    pub start_height: u64,

    /// Walk back to `start_height` on every pass, re-checking known blocks.
    pub force_full_rescan: bool,

    /// Blocks fetched per request round on the forward path.
    pub forward_batch_size: usize,

    /// Fork blocks deeper than this below the canonical tip are pruned.
    /// Zero keeps every fork.
    pub fork_retention_depth: u64,

    /// Delay between passes in the node runtime.
    pub poll_interval_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            start_height: 0,
            force_full_rescan: false,
            forward_batch_size: 100,
            fork_retention_depth: 2160,
            poll_interval_secs: 20,
        }
    }
}

impl SyncConfig {
    /// Create a config for testing (small batches, keep every fork).
    pub fn for_testing() -> Self {
        Self {
            start_height: 0,
            force_full_rescan: false,
            forward_batch_size: 4,
            fork_retention_depth: 0,
            poll_interval_secs: 1,
        }
    }
}
