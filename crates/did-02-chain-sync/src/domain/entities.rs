//! # Domain Entities
//!
//! Upstream blocks as the source reports them, and blocks as the local
//! store keeps them.
//!
//! The local lineage is a forest, not a list: blocks are keyed by
//! `(height, hash_prefix)` and link to their parent by key, never by
//! reference.

use did_01_operation_parser::AcceptedOperation;
use serde::{Deserialize, Serialize};
use shared_types::{BlockKey, BlockRef, Hash, LedgerId};

// =============================================================================
// UPSTREAM
// =============================================================================

/// Block header as reported by the upstream chain source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceBlock {
    pub height: u64,
    pub hash: Hash,
    /// `None` only for the first block of the chain.
    pub previous_hash: Option<Hash>,
    pub epoch: u64,
    pub timestamp: u64,
    pub tx_count: u32,
}

impl SourceBlock {
    pub fn block_ref(&self) -> BlockRef {
        BlockRef::new(self.height, self.hash)
    }

    pub fn key(&self) -> BlockKey {
        self.block_ref().key()
    }

    /// Reference to the parent, derived from the height and previous hash.
    pub fn parent_ref(&self) -> Option<BlockRef> {
        match (self.previous_hash, self.height.checked_sub(1)) {
            (Some(hash), Some(height)) => Some(BlockRef::new(height, hash)),
            _ => None,
        }
    }
}

/// A transaction carrying identity-operation payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceTransaction {
    pub hash: Hash,
    /// Position of the transaction inside its block.
    pub index: u32,
    /// Encoded signed operations in declared order.
    pub payloads: Vec<Vec<u8>>,
}

// =============================================================================
// LOCAL STORE
// =============================================================================

/// A committed block together with the operations accepted in it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredBlock {
    pub ledger: LedgerId,
    pub block: BlockRef,
    pub epoch: u64,
    pub timestamp: u64,
    pub tx_count: u32,
    /// Not on the canonical chain.
    pub fork: bool,
    pub previous: Option<BlockRef>,
    pub operations: Vec<AcceptedOperation>,
}

impl StoredBlock {
    pub fn height(&self) -> u64 {
        self.block.height
    }

    pub fn hash(&self) -> &Hash {
        &self.block.hash
    }

    pub fn key(&self) -> BlockKey {
        self.block.key()
    }

    /// Whether this block is the one `source` reports.
    pub fn matches(&self, source: &SourceBlock) -> bool {
        self.block.height == source.height && self.block.hash == source.hash
    }
}

/// Coarse grouping of blocks. Exists while it holds at least one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Epoch {
    pub number: u64,
    pub block_count: usize,
}

// =============================================================================
// SYNC RESULT
// =============================================================================

/// Outcome of one sync pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub ledger: LedgerId,
    pub blocks_added: usize,
    /// Blocks committed with the fork flag set.
    pub forks_recorded: usize,
    pub branch_switched: bool,
    pub operations_accepted: usize,
    /// Canonical tip after the pass.
    pub local_tip: Option<BlockRef>,
    pub upstream_height: u64,
}

impl SyncReport {
    pub fn new(ledger: LedgerId, upstream_height: u64) -> Self {
        Self {
            ledger,
            blocks_added: 0,
            forks_recorded: 0,
            branch_switched: false,
            operations_accepted: 0,
            local_tip: None,
            upstream_height,
        }
    }

    /// Nothing was written.
    pub fn is_noop(&self) -> bool {
        self.blocks_added == 0 && !self.branch_switched
    }
}
