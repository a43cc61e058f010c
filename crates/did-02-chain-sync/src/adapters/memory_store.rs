//! # In-Memory Chain Store
//!
//! Block forest kept in a `BTreeMap` keyed by `(height, hash_prefix)`.
//! Blocks sharing a key are told apart by full hash. Parents are referenced
//! by key, so enumerating a height range is a range scan.
//!
//! The store also serves as the operation log the resolver reads, with
//! lineage-aware views over the forest.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::domain::{Epoch, StoreError, StoredBlock};
use crate::ports::ChainStore;
use did_01_operation_parser::{
    AcceptedOperation, DidIdentifier, LedgerView, OperationKind, OperationLog, ResolveError,
};
use shared_types::{BlockKey, BlockRef, Hash, LedgerId};

#[derive(Default)]
struct LedgerChain {
    blocks: BTreeMap<BlockKey, Vec<StoredBlock>>,
    /// Epoch number to block count.
    epochs: BTreeMap<u64, usize>,
}

impl LedgerChain {
    fn get(&self, block: &BlockRef) -> Option<&StoredBlock> {
        self.blocks
            .get(&block.key())?
            .iter()
            .find(|b| b.block.hash == block.hash)
    }

    fn get_mut(&mut self, block: &BlockRef) -> Option<&mut StoredBlock> {
        self.blocks
            .get_mut(&block.key())?
            .iter_mut()
            .find(|b| b.block.hash == block.hash)
    }

    fn all(&self) -> impl Iterator<Item = &StoredBlock> {
        self.blocks.values().flat_map(|v| v.iter())
    }

    fn canonical(&self) -> impl Iterator<Item = &StoredBlock> {
        self.all().filter(|b| !b.fork)
    }

    fn canonical_tip(&self) -> Option<&StoredBlock> {
        self.blocks
            .values()
            .rev()
            .flat_map(|v| v.iter())
            .find(|b| !b.fork)
    }

    fn at_height(&self, height: u64) -> impl Iterator<Item = &StoredBlock> {
        let from = BlockKey {
            height,
            hash_prefix: 0,
        };
        let to = BlockKey {
            height,
            hash_prefix: u32::MAX,
        };
        self.blocks.range(from..=to).flat_map(|(_, v)| v.iter())
    }

    /// Blocks visible on `view`, lowest height first.
    fn lineage(&self, view: &LedgerView) -> Result<Vec<&StoredBlock>, ResolveError> {
        match view {
            LedgerView::Canonical => Ok(self.canonical().collect()),
            LedgerView::Detached => Ok(Vec::new()),
            LedgerView::Branch(tip) => {
                let mut segment = Vec::new();
                let mut fork_point = None;
                let mut cursor = Some(
                    self.get(tip)
                        .ok_or_else(|| ResolveError::Store(format!("unknown block {}", tip)))?,
                );
                while let Some(block) = cursor {
                    if !block.fork {
                        fork_point = Some(block.height());
                        break;
                    }
                    segment.push(block);
                    cursor = match &block.previous {
                        Some(previous) => Some(self.get(previous).ok_or_else(|| {
                            ResolveError::Store(format!(
                                "block {} links to missing block {}",
                                block.block, previous
                            ))
                        })?),
                        None => None,
                    };
                }

                let mut blocks: Vec<&StoredBlock> = match fork_point {
                    Some(height) => self.canonical().filter(|b| b.height() <= height).collect(),
                    None => Vec::new(),
                };
                blocks.extend(segment.into_iter().rev());
                Ok(blocks)
            }
        }
    }

    fn remove_from_epoch(&mut self, epoch: u64) {
        if let Some(count) = self.epochs.get_mut(&epoch) {
            *count -= 1;
            if *count == 0 {
                self.epochs.remove(&epoch);
                tracing::debug!("[did-02] Epoch {} emptied and removed", epoch);
            }
        }
    }
}

/// In-memory `ChainStore` and `OperationLog`.
#[derive(Default)]
pub struct InMemoryChainStore {
    ledgers: RwLock<HashMap<LedgerId, LedgerChain>>,
}

impl InMemoryChainStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored block of `ledger`, lowest height first.
    pub fn all_blocks(&self, ledger: LedgerId) -> Vec<StoredBlock> {
        self.ledgers
            .read()
            .get(&ledger)
            .map(|chain| chain.all().cloned().collect())
            .unwrap_or_default()
    }

    pub fn block_count(&self, ledger: LedgerId) -> usize {
        self.ledgers
            .read()
            .get(&ledger)
            .map_or(0, |chain| chain.all().count())
    }

    fn operations_on<F>(
        &self,
        ledger: LedgerId,
        view: &LedgerView,
        keep: F,
    ) -> Result<Vec<AcceptedOperation>, ResolveError>
    where
        F: Fn(&AcceptedOperation) -> bool,
    {
        let ledgers = self.ledgers.read();
        let Some(chain) = ledgers.get(&ledger) else {
            return Ok(Vec::new());
        };
        let mut operations: Vec<AcceptedOperation> = chain
            .lineage(view)?
            .into_iter()
            .flat_map(|b| b.operations.iter())
            .filter(|&op| keep(op))
            .cloned()
            .collect();
        operations.sort_by_key(|op| op.position);
        Ok(operations)
    }
}

#[async_trait]
impl ChainStore for InMemoryChainStore {
    async fn canonical_tip(&self, ledger: LedgerId) -> Result<Option<StoredBlock>, StoreError> {
        Ok(self
            .ledgers
            .read()
            .get(&ledger)
            .and_then(|chain| chain.canonical_tip().cloned()))
    }

    async fn blocks_at_height(
        &self,
        ledger: LedgerId,
        height: u64,
    ) -> Result<Vec<StoredBlock>, StoreError> {
        Ok(self
            .ledgers
            .read()
            .get(&ledger)
            .map(|chain| chain.at_height(height).cloned().collect())
            .unwrap_or_default())
    }

    async fn find_block(
        &self,
        ledger: LedgerId,
        key: BlockKey,
        hash: &Hash,
    ) -> Result<Option<StoredBlock>, StoreError> {
        let block = BlockRef {
            height: key.height,
            hash_prefix: key.hash_prefix,
            hash: *hash,
        };
        Ok(self
            .ledgers
            .read()
            .get(&ledger)
            .and_then(|chain| chain.get(&block).cloned()))
    }

    async fn create_block(&self, block: StoredBlock) -> Result<(), StoreError> {
        let mut ledgers = self.ledgers.write();
        let chain = ledgers.entry(block.ledger).or_default();
        if chain.get(&block.block).is_some() {
            return Err(StoreError::Duplicate(block.block));
        }

        let count = chain.epochs.entry(block.epoch).or_insert(0);
        if *count == 0 {
            tracing::debug!("[did-02] Epoch {} opened by block {}", block.epoch, block.block);
        }
        *count += 1;
        chain.blocks.entry(block.key()).or_default().push(block);
        Ok(())
    }

    async fn switch_branch(
        &self,
        ledger: LedgerId,
        old_canonical: &[BlockRef],
        new_canonical: &[BlockRef],
    ) -> Result<(), StoreError> {
        let mut ledgers = self.ledgers.write();
        let chain = ledgers
            .get_mut(&ledger)
            .ok_or_else(|| StoreError::InvalidSwitch(format!("no blocks for {}", ledger)))?;

        // Validate everything before touching a flag.
        for block in old_canonical {
            match chain.get(block) {
                Some(b) if !b.fork => {}
                Some(_) => {
                    return Err(StoreError::InvalidSwitch(format!("{} is not canonical", block)))
                }
                None => return Err(StoreError::NotFound(*block)),
            }
        }
        let leaving: HashSet<&BlockRef> = old_canonical.iter().collect();
        for block in new_canonical {
            match chain.get(block) {
                Some(b) if b.fork => {}
                Some(_) => {
                    return Err(StoreError::InvalidSwitch(format!("{} is already canonical", block)))
                }
                None => return Err(StoreError::NotFound(*block)),
            }
            let clash = chain
                .at_height(block.height)
                .any(|b| !b.fork && !leaving.contains(&b.block));
            if clash {
                return Err(StoreError::InvalidSwitch(format!(
                    "height {} would have two canonical blocks",
                    block.height
                )));
            }
        }

        for block in old_canonical {
            if let Some(b) = chain.get_mut(block) {
                b.fork = true;
            }
        }
        for block in new_canonical {
            if let Some(b) = chain.get_mut(block) {
                b.fork = false;
            }
        }
        Ok(())
    }

    async fn prune_forks_below(&self, ledger: LedgerId, height: u64) -> Result<usize, StoreError> {
        let mut ledgers = self.ledgers.write();
        let Some(chain) = ledgers.get_mut(&ledger) else {
            return Ok(0);
        };

        // Fork blocks mapped to the height their branch leaves the canonical
        // chain. Heights ascend, so a parent is always seen before its children.
        let mut branch_roots: HashMap<BlockRef, u64> = HashMap::new();
        for block in chain.all().filter(|b| b.fork) {
            let root = block
                .previous
                .and_then(|p| branch_roots.get(&p).copied())
                .unwrap_or(block.height());
            branch_roots.insert(block.block, root);
        }

        // Whole branches go, never a lower part of one.
        let doomed: HashSet<BlockRef> = branch_roots
            .into_iter()
            .filter(|(_, root)| *root < height)
            .map(|(block, _)| block)
            .collect();
        if doomed.is_empty() {
            return Ok(0);
        }

        let mut removed_epochs = Vec::new();
        chain.blocks.retain(|_, blocks| {
            blocks.retain(|b| {
                let remove = doomed.contains(&b.block);
                if remove {
                    removed_epochs.push(b.epoch);
                }
                !remove
            });
            !blocks.is_empty()
        });
        for epoch in &removed_epochs {
            chain.remove_from_epoch(*epoch);
        }
        Ok(removed_epochs.len())
    }

    async fn epochs(&self, ledger: LedgerId) -> Result<Vec<Epoch>, StoreError> {
        Ok(self
            .ledgers
            .read()
            .get(&ledger)
            .map(|chain| {
                chain
                    .epochs
                    .iter()
                    .map(|(number, block_count)| Epoch {
                        number: *number,
                        block_count: *block_count,
                    })
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[async_trait]
impl OperationLog for InMemoryChainStore {
    async fn operations_for_did(
        &self,
        ledger: LedgerId,
        did: &DidIdentifier,
        view: &LedgerView,
    ) -> Result<Vec<AcceptedOperation>, ResolveError> {
        self.operations_on(ledger, view, |op| op.did == *did)
    }

    async fn protocol_updates(
        &self,
        ledger: LedgerId,
        view: &LedgerView,
    ) -> Result<Vec<AcceptedOperation>, ResolveError> {
        self.operations_on(ledger, view, |op| {
            op.kind() == OperationKind::ProtocolVersionUpdate
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::sha256;

    const LEDGER: LedgerId = LedgerId::InMemory;

    fn block(height: u64, label: &str, parent: Option<&StoredBlock>, fork: bool) -> StoredBlock {
        StoredBlock {
            ledger: LEDGER,
            block: BlockRef::new(height, sha256(format!("{}-{}", height, label).as_bytes())),
            epoch: height / 10,
            timestamp: height,
            tx_count: 0,
            fork,
            previous: parent.map(|p| p.block),
            operations: Vec::new(),
        }
    }

    /// Canonical 0..=3, fork 2' -> 3' off block 1.
    async fn forked_store() -> (InMemoryChainStore, Vec<StoredBlock>, Vec<StoredBlock>) {
        let store = InMemoryChainStore::new();
        let mut main = Vec::new();
        for h in 0..4 {
            let b = block(h, "main", main.last(), false);
            store.create_block(b.clone()).await.unwrap();
            main.push(b);
        }
        let f2 = block(2, "fork", Some(&main[1]), true);
        let f3 = block(3, "fork", Some(&f2), true);
        store.create_block(f2.clone()).await.unwrap();
        store.create_block(f3.clone()).await.unwrap();
        (store, main, vec![f2, f3])
    }

    #[tokio::test]
    async fn test_duplicate_block_rejected() {
        let (store, main, _) = forked_store().await;
        assert!(matches!(
            store.create_block(main[0].clone()).await,
            Err(StoreError::Duplicate(_))
        ));
    }

    #[tokio::test]
    async fn test_canonical_tip_ignores_forks() {
        let (store, main, _) = forked_store().await;
        let tip = store.canonical_tip(LEDGER).await.unwrap().unwrap();
        assert_eq!(tip.block, main[3].block);
        assert_eq!(store.blocks_at_height(LEDGER, 3).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_branch_lineage() {
        let (store, main, fork) = forked_store().await;
        let ledgers = store.ledgers.read();
        let chain = ledgers.get(&LEDGER).unwrap();
        let lineage: Vec<BlockRef> = chain
            .lineage(&LedgerView::Branch(fork[1].block))
            .unwrap()
            .into_iter()
            .map(|b| b.block)
            .collect();
        assert_eq!(
            lineage,
            vec![main[0].block, main[1].block, fork[0].block, fork[1].block]
        );

        let canonical = chain.lineage(&LedgerView::Branch(main[2].block)).unwrap();
        assert_eq!(canonical.len(), 3);
    }

    #[tokio::test]
    async fn test_switch_branch_flips_flags() {
        let (store, main, fork) = forked_store().await;
        store
            .switch_branch(
                LEDGER,
                &[main[2].block, main[3].block],
                &[fork[0].block, fork[1].block],
            )
            .await
            .unwrap();

        let tip = store.canonical_tip(LEDGER).await.unwrap().unwrap();
        assert_eq!(tip.block, fork[1].block);
        for height in 0..4 {
            let canonical = store
                .blocks_at_height(LEDGER, height)
                .await
                .unwrap()
                .into_iter()
                .filter(|b| !b.fork)
                .count();
            assert_eq!(canonical, 1);
        }
    }

    #[tokio::test]
    async fn test_switch_branch_is_all_or_nothing() {
        let (store, main, fork) = forked_store().await;
        // Leaving block 3 canonical would give height 3 two canonical blocks.
        let result = store
            .switch_branch(LEDGER, &[main[2].block], &[fork[0].block, fork[1].block])
            .await;
        assert!(matches!(result, Err(StoreError::InvalidSwitch(_))));
        let still_fork = store
            .find_block(LEDGER, fork[0].key(), fork[0].hash())
            .await
            .unwrap()
            .unwrap();
        assert!(still_fork.fork);
    }

    #[tokio::test]
    async fn test_branch_lineage_with_missing_ancestor_fails() {
        let store = InMemoryChainStore::new();
        let b0 = block(0, "main", None, false);
        let absent = block(1, "absent", Some(&b0), true);
        let f2 = block(2, "fork", Some(&absent), true);
        store.create_block(b0).await.unwrap();
        store.create_block(f2.clone()).await.unwrap();

        let ledgers = store.ledgers.read();
        let chain = ledgers.get(&LEDGER).unwrap();
        assert!(matches!(
            chain.lineage(&LedgerView::Branch(f2.block)),
            Err(ResolveError::Store(_))
        ));
    }

    #[tokio::test]
    async fn test_prune_removes_whole_fork_branch() {
        let (store, main, fork) = forked_store().await;

        // The branch leaves the canonical chain at height 2; nothing to do yet.
        assert_eq!(store.prune_forks_below(LEDGER, 2).await.unwrap(), 0);

        // Block 3' sits at the cutoff but goes with its branch.
        let removed = store.prune_forks_below(LEDGER, 3).await.unwrap();
        assert_eq!(removed, 2);
        for f in &fork {
            assert!(store
                .find_block(LEDGER, f.key(), f.hash())
                .await
                .unwrap()
                .is_none());
        }
        let left: Vec<BlockRef> = store.all_blocks(LEDGER).iter().map(|b| b.block).collect();
        assert_eq!(left, main.iter().map(|b| b.block).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_prune_removes_forks_and_empty_epochs() {
        let store = InMemoryChainStore::new();
        let b0 = block(0, "main", None, false);
        let f10 = block(10, "orphan", Some(&b0), true);
        store.create_block(b0.clone()).await.unwrap();
        store.create_block(f10).await.unwrap();
        assert_eq!(store.epochs(LEDGER).await.unwrap().len(), 2);

        let removed = store.prune_forks_below(LEDGER, 11).await.unwrap();
        assert_eq!(removed, 1);
        let epochs = store.epochs(LEDGER).await.unwrap();
        assert_eq!(epochs, vec![Epoch { number: 0, block_count: 1 }]);
        assert_eq!(store.block_count(LEDGER), 1);
    }
}
