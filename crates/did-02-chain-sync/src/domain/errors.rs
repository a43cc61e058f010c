//! # Domain Errors
//!
//! Failures of the upstream source, the chain store and the sync pass.

use did_01_operation_parser::{ErrorCategory, OperationError, ResolveError};
use shared_types::{BlockRef, LedgerId};
use thiserror::Error;

/// Upstream chain source failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SourceError {
    #[error("Upstream unreachable: {0}")]
    Unreachable(String),

    #[error("Malformed upstream response: {0}")]
    Malformed(String),

    #[error("Upstream has no block {0}")]
    NotFound(String),
}

/// Chain store failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Block {0} already stored")]
    Duplicate(BlockRef),

    #[error("Block {0} not found")]
    NotFound(BlockRef),

    #[error("Branch switch rejected: {0}")]
    InvalidSwitch(String),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Failure class of a sync pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncErrorCategory {
    /// An operation in a block was rejected.
    Operation(ErrorCategory),
    /// Unexpected previous-block reference during ingestion.
    ForkLinkage,
    /// Source unreachable or malformed response.
    Upstream,
    /// Local store or resolver failed.
    Storage,
    /// Pass did not run to completion by request.
    Interrupted,
}

/// Sync pass failures.
///
/// Blocks committed before the failure stay committed; re-running the pass
/// is always safe.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Upstream(#[from] SourceError),

    #[error("Fork linkage error at height {height}: {reason}")]
    ForkLinkage { height: u64, reason: String },

    #[error("Operation {tx_index}/{op_sequence} in block {height} rejected: {source}")]
    Operation {
        height: u64,
        tx_index: u32,
        op_sequence: u32,
        #[source]
        source: OperationError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("Sync pass cancelled")]
    Cancelled,

    #[error("A sync pass is already running for {0}")]
    AlreadyRunning(LedgerId),
}

impl SyncError {
    pub fn category(&self) -> SyncErrorCategory {
        match self {
            SyncError::Upstream(_) => SyncErrorCategory::Upstream,
            SyncError::ForkLinkage { .. } => SyncErrorCategory::ForkLinkage,
            SyncError::Operation { source, .. } => SyncErrorCategory::Operation(source.category()),
            SyncError::Store(_) | SyncError::Resolve(_) => SyncErrorCategory::Storage,
            SyncError::Cancelled | SyncError::AlreadyRunning(_) => SyncErrorCategory::Interrupted,
        }
    }
}
