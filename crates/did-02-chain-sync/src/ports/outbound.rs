//! # Outbound Ports
//!
//! The upstream chain source and the durable chain store.

use crate::domain::{Epoch, SourceBlock, SourceError, SourceTransaction, StoreError, StoredBlock};
use async_trait::async_trait;
use parking_lot::RwLock;
use shared_types::{sha256, short_hex, BlockKey, BlockRef, Hash, LedgerId};
use std::collections::{BTreeMap, HashMap};

/// Upstream chain data provider - outbound port.
#[async_trait]
pub trait BlockSource: Send + Sync {
    /// Block at the upstream tip.
    async fn tip(&self) -> Result<SourceBlock, SourceError>;

    /// Block at `height` on the upstream's current chain.
    async fn block_by_height(&self, height: u64) -> Result<SourceBlock, SourceError>;

    /// Block with hash `hash`, on any branch the upstream still knows.
    async fn block_by_hash(&self, hash: &Hash) -> Result<SourceBlock, SourceError>;

    /// Transactions of the block carrying identity-operation payloads.
    async fn operations_for_block(&self, hash: &Hash)
        -> Result<Vec<SourceTransaction>, SourceError>;
}

/// Durable block forest - outbound port.
///
/// Every mutating call is atomic: it applies fully or not at all.
#[async_trait]
pub trait ChainStore: Send + Sync {
    /// Highest block whose fork flag is false.
    async fn canonical_tip(&self, ledger: LedgerId) -> Result<Option<StoredBlock>, StoreError>;

    /// All blocks at `height`, canonical and forks.
    async fn blocks_at_height(
        &self,
        ledger: LedgerId,
        height: u64,
    ) -> Result<Vec<StoredBlock>, StoreError>;

    /// The block with `key` whose full hash is `hash`.
    async fn find_block(
        &self,
        ledger: LedgerId,
        key: BlockKey,
        hash: &Hash,
    ) -> Result<Option<StoredBlock>, StoreError>;

    /// Commit a block together with its accepted operations.
    async fn create_block(&self, block: StoredBlock) -> Result<(), StoreError>;

    /// Mark `old_canonical` as forks and `new_canonical` as canonical in one
    /// update.
    async fn switch_branch(
        &self,
        ledger: LedgerId,
        old_canonical: &[BlockRef],
        new_canonical: &[BlockRef],
    ) -> Result<(), StoreError>;

    /// Delete every fork branch that leaves the canonical chain below
    /// `height`, with all of its blocks and operations. A branch is removed
    /// whole, so no stored block is left without its parent. Returns the
    /// number of blocks removed.
    async fn prune_forks_below(&self, ledger: LedgerId, height: u64) -> Result<usize, StoreError>;

    /// Epochs that still hold blocks.
    async fn epochs(&self, ledger: LedgerId) -> Result<Vec<Epoch>, StoreError>;
}

// =============================================================================
// Mock Implementations for Testing
// =============================================================================

/// Blocks per epoch in the mock chain.
pub const MOCK_EPOCH_LENGTH: u64 = 10;

#[derive(Default)]
struct MockChain {
    blocks: HashMap<Hash, SourceBlock>,
    transactions: HashMap<Hash, Vec<SourceTransaction>>,
    /// Current upstream chain by height.
    chain: BTreeMap<u64, Hash>,
    tip: Option<Hash>,
    unreachable: bool,
}

/// Scriptable upstream chain for tests.
///
/// Blocks are kept forever once added; `block_by_height` follows the
/// current tip's lineage.
#[derive(Default)]
pub struct MockBlockSource {
    inner: RwLock<MockChain>,
}

impl MockBlockSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deterministic block header; `label` tells siblings apart.
    pub fn build_block(height: u64, previous_hash: Option<Hash>, label: &str) -> SourceBlock {
        let mut seed = Vec::new();
        seed.extend_from_slice(&height.to_be_bytes());
        seed.extend_from_slice(&previous_hash.unwrap_or([0u8; 32]));
        seed.extend_from_slice(label.as_bytes());
        SourceBlock {
            height,
            hash: sha256(&seed),
            previous_hash,
            epoch: height / MOCK_EPOCH_LENGTH,
            timestamp: 1_600_000_000 + height * 20,
            tx_count: 0,
        }
    }

    /// Add a child of `parent` (or a first block) and make it the tip.
    pub fn add_block(
        &self,
        parent: Option<&SourceBlock>,
        label: &str,
        payloads: Vec<Vec<Vec<u8>>>,
    ) -> SourceBlock {
        let height = parent.map_or(0, |p| p.height + 1);
        let mut block = Self::build_block(height, parent.map(|p| p.hash), label);
        block.tx_count = payloads.len() as u32;

        let transactions = payloads
            .into_iter()
            .enumerate()
            .map(|(index, payloads)| {
                let mut seed = block.hash.to_vec();
                seed.extend_from_slice(&(index as u32).to_be_bytes());
                SourceTransaction {
                    hash: sha256(&seed),
                    index: index as u32,
                    payloads,
                }
            })
            .collect();

        let mut inner = self.inner.write();
        inner.blocks.insert(block.hash, block.clone());
        inner.transactions.insert(block.hash, transactions);
        Self::retarget(&mut inner, block.hash);
        block
    }

    /// Extend the current tip with an empty block.
    pub fn extend(&self, label: &str) -> SourceBlock {
        let tip = self.current_tip();
        self.add_block(tip.as_ref(), label, Vec::new())
    }

    /// Extend the current tip with `count` empty blocks.
    pub fn extend_by(&self, count: usize, label: &str) -> Vec<SourceBlock> {
        (0..count).map(|_| self.extend(label)).collect()
    }

    /// Point the upstream tip at an already added block.
    pub fn set_tip(&self, hash: &Hash) {
        let mut inner = self.inner.write();
        Self::retarget(&mut inner, *hash);
    }

    /// Serve `block` at its height and make it the tip, without following
    /// its previous hash. Replaces any block already stored under its hash.
    pub fn insert_unlinked(&self, block: SourceBlock) {
        let mut inner = self.inner.write();
        inner.transactions.entry(block.hash).or_default();
        inner.chain.insert(block.height, block.hash);
        inner.tip = Some(block.hash);
        inner.blocks.insert(block.hash, block);
    }

    pub fn current_tip(&self) -> Option<SourceBlock> {
        let inner = self.inner.read();
        inner.tip.and_then(|hash| inner.blocks.get(&hash).cloned())
    }

    /// Block on the current chain at `height`.
    pub fn at_height(&self, height: u64) -> Option<SourceBlock> {
        let inner = self.inner.read();
        inner
            .chain
            .get(&height)
            .and_then(|hash| inner.blocks.get(hash).cloned())
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.inner.write().unreachable = unreachable;
    }

    fn retarget(inner: &mut MockChain, tip: Hash) {
        let mut chain = BTreeMap::new();
        let mut cursor = inner.blocks.get(&tip);
        while let Some(block) = cursor {
            chain.insert(block.height, block.hash);
            cursor = block.previous_hash.and_then(|h| inner.blocks.get(&h));
        }
        inner.chain = chain;
        inner.tip = Some(tip);
    }

    fn check_reachable(inner: &MockChain) -> Result<(), SourceError> {
        if inner.unreachable {
            Err(SourceError::Unreachable("mock source offline".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl BlockSource for MockBlockSource {
    async fn tip(&self) -> Result<SourceBlock, SourceError> {
        let inner = self.inner.read();
        Self::check_reachable(&inner)?;
        inner
            .tip
            .and_then(|hash| inner.blocks.get(&hash).cloned())
            .ok_or_else(|| SourceError::NotFound("tip".to_string()))
    }

    async fn block_by_height(&self, height: u64) -> Result<SourceBlock, SourceError> {
        let inner = self.inner.read();
        Self::check_reachable(&inner)?;
        inner
            .chain
            .get(&height)
            .and_then(|hash| inner.blocks.get(hash).cloned())
            .ok_or_else(|| SourceError::NotFound(format!("height {}", height)))
    }

    async fn block_by_hash(&self, hash: &Hash) -> Result<SourceBlock, SourceError> {
        let inner = self.inner.read();
        Self::check_reachable(&inner)?;
        inner
            .blocks
            .get(hash)
            .cloned()
            .ok_or_else(|| SourceError::NotFound(short_hex(hash)))
    }

    async fn operations_for_block(
        &self,
        hash: &Hash,
    ) -> Result<Vec<SourceTransaction>, SourceError> {
        let inner = self.inner.read();
        Self::check_reachable(&inner)?;
        inner
            .transactions
            .get(hash)
            .cloned()
            .ok_or_else(|| SourceError::NotFound(short_hex(hash)))
    }
}
