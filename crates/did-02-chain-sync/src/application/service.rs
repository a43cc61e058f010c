//! # Sync Engine
//!
//! Runs one synchronization pass per call: fetch the upstream tip, find
//! where the local forest diverges from it, ingest the missing blocks with
//! their validated operations, then decide which lineage is canonical.
//!
//! ## Pass outline
//!
//! 1. Upstream tip already stored as canonical: no-op.
//! 2. Upstream still agrees with the local tip: fetch forward by height.
//! 3. Otherwise walk backward by previous hash to a known block (or the
//!    start height), then ingest the candidates lowest first.
//! 4. Make the upstream tip's lineage canonical if it is at least as high
//!    as the local canonical tip.
//! 5. Prune old forks.
//!
//! Each block is committed with all of its operations or not at all. A
//! failure aborts the pass; blocks committed before it stay.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{watch, Mutex as AsyncMutex};
use tracing::Instrument;
use uuid::Uuid;

use crate::config::SyncConfig;
use crate::domain::{SourceBlock, StoredBlock, SyncError, SyncReport};
use crate::ports::{BlockSource, ChainStore, SyncApi, SyncRequest};
use did_01_operation_parser::{AcceptedOperation, LedgerView, OperationHandler, ResolveContext};
use shared_types::{BlockRef, ChainPosition, Hash, LedgerId};

/// Sync engine over a chain store and an operation handler.
pub struct SyncEngine<C: ChainStore, H: OperationHandler> {
    store: Arc<C>,
    handler: Arc<H>,
    config: SyncConfig,
    /// One pass lock per ledger.
    locks: Mutex<HashMap<LedgerId, Arc<AsyncMutex<()>>>>,
}

impl<C: ChainStore, H: OperationHandler> SyncEngine<C, H> {
    pub fn new(store: Arc<C>, handler: Arc<H>, config: SyncConfig) -> Self {
        Self {
            store,
            handler,
            config,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<C> {
        &self.store
    }

    fn ledger_lock(&self, ledger: LedgerId) -> Arc<AsyncMutex<()>> {
        self.locks.lock().entry(ledger).or_default().clone()
    }

    fn check_cancel(cancel: &watch::Receiver<bool>) -> Result<(), SyncError> {
        if *cancel.borrow() {
            Err(SyncError::Cancelled)
        } else {
            Ok(())
        }
    }

    async fn run_pass(
        &self,
        source: &dyn BlockSource,
        request: SyncRequest,
        cancel: &watch::Receiver<bool>,
    ) -> Result<SyncReport, SyncError> {
        let ledger = request.ledger;
        let upstream_tip = source.tip().await?;
        let mut report = SyncReport::new(ledger, upstream_tip.height);
        let local_tip = self.store.canonical_tip(ledger).await?;

        if upstream_tip.height < request.start_height {
            tracing::warn!(
                "[did-02] Upstream tip {} is below start height {}",
                upstream_tip.height,
                request.start_height
            );
            report.local_tip = local_tip.map(|b| b.block);
            return Ok(report);
        }

        if !request.force_full_rescan {
            if let Some(local) = &local_tip {
                if local.height() >= upstream_tip.height {
                    let known = self
                        .store
                        .find_block(ledger, upstream_tip.key(), &upstream_tip.hash)
                        .await?;
                    if known.map_or(false, |b| !b.fork) {
                        tracing::debug!(
                            "[did-02] Local tip {} already covers upstream tip {}",
                            local.block,
                            upstream_tip.block_ref()
                        );
                        report.local_tip = Some(local.block);
                        return Ok(report);
                    }
                }
            }
        }

        match self
            .forward_start(source, &request, local_tip.as_ref(), &upstream_tip)
            .await?
        {
            Some((from, previous)) => {
                self.sync_forward(source, &request, from, previous, &upstream_tip, cancel, &mut report)
                    .await?
            }
            None => {
                self.sync_backward(source, &request, upstream_tip.clone(), cancel, &mut report)
                    .await?
            }
        }

        report.branch_switched = self.switch_if_ahead(ledger, &upstream_tip).await?;
        self.prune(ledger).await?;
        report.local_tip = self.store.canonical_tip(ledger).await?.map(|b| b.block);
        Ok(report)
    }

    /// Height to fetch forward from, and the hash the first fetched block
    /// must link to. `None` when the backward walk is needed.
    async fn forward_start(
        &self,
        source: &dyn BlockSource,
        request: &SyncRequest,
        local_tip: Option<&StoredBlock>,
        upstream_tip: &SourceBlock,
    ) -> Result<Option<(u64, Option<Hash>)>, SyncError> {
        if request.force_full_rescan {
            return Ok(None);
        }
        match local_tip {
            None => Ok(Some((request.start_height, None))),
            Some(local) if local.height() < upstream_tip.height => {
                let upstream_at_local = source.block_by_height(local.height()).await?;
                if local.matches(&upstream_at_local) {
                    Ok(Some((local.height() + 1, Some(local.block.hash))))
                } else {
                    Ok(None)
                }
            }
            Some(_) => Ok(None),
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn sync_forward(
        &self,
        source: &dyn BlockSource,
        request: &SyncRequest,
        from: u64,
        mut previous: Option<Hash>,
        upstream_tip: &SourceBlock,
        cancel: &watch::Receiver<bool>,
        report: &mut SyncReport,
    ) -> Result<(), SyncError> {
        let batch_size = self.config.forward_batch_size.max(1) as u64;
        let mut height = from;

        while height <= upstream_tip.height {
            let end = (height + batch_size - 1).min(upstream_tip.height);
            let mut batch = Vec::new();
            for h in height..=end {
                batch.push(source.block_by_height(h).await?);
            }
            tracing::debug!("[did-02] Fetched blocks {}..={}", height, end);

            for block in &batch {
                Self::check_cancel(cancel)?;
                if let Some(expected) = previous {
                    if block.previous_hash != Some(expected) {
                        return Err(SyncError::ForkLinkage {
                            height: block.height,
                            reason: "upstream block does not link to its predecessor".to_string(),
                        });
                    }
                }
                previous = Some(block.hash);
                self.ingest(source, request, block, report).await?;
            }
            height = end + 1;
        }
        Ok(())
    }

    async fn sync_backward(
        &self,
        source: &dyn BlockSource,
        request: &SyncRequest,
        upstream_tip: SourceBlock,
        cancel: &watch::Receiver<bool>,
        report: &mut SyncReport,
    ) -> Result<(), SyncError> {
        let ledger = request.ledger;
        let mut candidates = Vec::new();
        let mut cursor = upstream_tip;

        loop {
            Self::check_cancel(cancel)?;
            match self
                .store
                .find_block(ledger, cursor.key(), &cursor.hash)
                .await?
            {
                Some(known) => {
                    if let Some(stored_previous) = known.previous {
                        if Some(stored_previous.hash) != cursor.previous_hash {
                            return Err(SyncError::ForkLinkage {
                                height: cursor.height,
                                reason: format!(
                                    "stored block {} links to a different previous block",
                                    known.block
                                ),
                            });
                        }
                    }
                    if !request.force_full_rescan {
                        break;
                    }
                }
                None => candidates.push(cursor.clone()),
            }

            if cursor.height <= request.start_height {
                break;
            }
            let previous_hash = cursor.previous_hash.ok_or_else(|| SyncError::ForkLinkage {
                height: cursor.height,
                reason: "block above start height has no previous block".to_string(),
            })?;
            let parent = source.block_by_hash(&previous_hash).await?;
            if parent.height + 1 != cursor.height {
                return Err(SyncError::ForkLinkage {
                    height: cursor.height,
                    reason: format!("previous block reported at height {}", parent.height),
                });
            }
            cursor = parent;
        }

        if !candidates.is_empty() {
            tracing::debug!(
                "[did-02] Walked back to height {}, {} candidate blocks",
                cursor.height,
                candidates.len()
            );
        }

        for block in candidates.iter().rev() {
            Self::check_cancel(cancel)?;
            self.ingest(source, request, block, report).await?;
        }
        Ok(())
    }

    /// Validate and commit one upstream block. Known blocks are skipped.
    async fn ingest(
        &self,
        source: &dyn BlockSource,
        request: &SyncRequest,
        block: &SourceBlock,
        report: &mut SyncReport,
    ) -> Result<(), SyncError> {
        let ledger = request.ledger;
        if self
            .store
            .find_block(ledger, block.key(), &block.hash)
            .await?
            .is_some()
        {
            tracing::trace!("[did-02] Block {} already stored", block.block_ref());
            return Ok(());
        }

        let parent = if block.height <= request.start_height {
            None
        } else {
            let parent_ref = block.parent_ref().ok_or_else(|| SyncError::ForkLinkage {
                height: block.height,
                reason: "block has no previous block".to_string(),
            })?;
            let parent = self
                .store
                .find_block(ledger, parent_ref.key(), &parent_ref.hash)
                .await?
                .ok_or_else(|| SyncError::ForkLinkage {
                    height: block.height,
                    reason: format!("previous block {} is not stored", parent_ref),
                })?;
            Some(parent)
        };

        let canonical_here = self
            .store
            .blocks_at_height(ledger, block.height)
            .await?
            .iter()
            .any(|b| !b.fork);
        let fork = canonical_here || parent.as_ref().map_or(false, |p| p.fork);

        let view = match &parent {
            Some(p) => LedgerView::Branch(p.block),
            None => LedgerView::Detached,
        };
        let operations = self.parse_block(source, ledger, block, view).await?;
        let accepted = operations.len();

        self.store
            .create_block(StoredBlock {
                ledger,
                block: block.block_ref(),
                epoch: block.epoch,
                timestamp: block.timestamp,
                tx_count: block.tx_count,
                fork,
                previous: parent.map(|p| p.block),
                operations,
            })
            .await?;

        report.blocks_added += 1;
        report.operations_accepted += accepted;
        if fork {
            report.forks_recorded += 1;
        }
        tracing::debug!(
            "[did-02] Committed block {} ({} operations, fork: {})",
            block.block_ref(),
            accepted,
            fork
        );
        Ok(())
    }

    /// Validate every operation of `block` in transaction then sequence
    /// order. Later operations see the earlier ones through the pending
    /// overlay.
    async fn parse_block(
        &self,
        source: &dyn BlockSource,
        ledger: LedgerId,
        block: &SourceBlock,
        view: LedgerView,
    ) -> Result<Vec<AcceptedOperation>, SyncError> {
        let mut transactions = source.operations_for_block(&block.hash).await?;
        transactions.sort_by_key(|tx| tx.index);

        let mut accepted: Vec<AcceptedOperation> = Vec::new();
        for tx in &transactions {
            for (sequence, payload) in tx.payloads.iter().enumerate() {
                let op_sequence = sequence as u32;
                let position = ChainPosition::new(block.height, tx.index, op_sequence);
                let ctx = ResolveContext {
                    view,
                    as_of: None,
                    pending: accepted.clone(),
                };
                let operation = self
                    .handler
                    .parse_operation(payload, ledger, position, &ctx)
                    .await
                    .map_err(|source| SyncError::Operation {
                        height: block.height,
                        tx_index: tx.index,
                        op_sequence,
                        source,
                    })?;
                accepted.push(operation);
            }
        }
        Ok(accepted)
    }

    /// Promote the lineage ending at the upstream tip when it is stored as a
    /// fork and reaches at least the canonical tip's height.
    async fn switch_if_ahead(
        &self,
        ledger: LedgerId,
        upstream_tip: &SourceBlock,
    ) -> Result<bool, SyncError> {
        let Some(head) = self
            .store
            .find_block(ledger, upstream_tip.key(), &upstream_tip.hash)
            .await?
        else {
            return Ok(false);
        };
        if !head.fork {
            return Ok(false);
        }

        let canonical_tip = self.store.canonical_tip(ledger).await?;
        if let Some(tip) = &canonical_tip {
            if head.height() < tip.height() {
                tracing::info!(
                    "[did-02] Fork {} is below canonical tip {}; canonical chain retained",
                    head.block,
                    tip.block
                );
                return Ok(false);
            }
        }

        let mut new_segment: Vec<BlockRef> = Vec::new();
        let mut fork_point = None;
        let mut cursor = Some(head);
        while let Some(block) = cursor {
            if !block.fork {
                fork_point = Some(block.height());
                break;
            }
            new_segment.push(block.block);
            cursor = match block.previous {
                Some(p) => Some(
                    self.store
                        .find_block(ledger, p.key(), &p.hash)
                        .await?
                        .ok_or_else(|| SyncError::ForkLinkage {
                            height: block.height(),
                            reason: format!(
                                "fork block {} links to missing block {}",
                                block.block, p
                            ),
                        })?,
                ),
                None => None,
            };
        }
        new_segment.reverse();

        let lowest_new = new_segment.first().map_or(upstream_tip.height, |b| b.height);
        let from = fork_point.map_or(lowest_new, |h| h + 1);
        let to = canonical_tip.as_ref().map_or(from, |t| t.height());

        let mut old_segment: Vec<BlockRef> = Vec::new();
        for height in from..=to {
            old_segment.extend(
                self.store
                    .blocks_at_height(ledger, height)
                    .await?
                    .into_iter()
                    .filter(|b| !b.fork)
                    .map(|b| b.block),
            );
        }

        self.store
            .switch_branch(ledger, &old_segment, &new_segment)
            .await?;
        tracing::info!(
            "[did-02] Branch switch above height {}: {} blocks retired, {} promoted, tip {}",
            from.saturating_sub(1),
            old_segment.len(),
            new_segment.len(),
            upstream_tip.block_ref()
        );
        Ok(true)
    }

    async fn prune(&self, ledger: LedgerId) -> Result<(), SyncError> {
        let depth = self.config.fork_retention_depth;
        if depth == 0 {
            return Ok(());
        }
        let Some(tip) = self.store.canonical_tip(ledger).await? else {
            return Ok(());
        };
        if let Some(below) = tip.height().checked_sub(depth) {
            let removed = self.store.prune_forks_below(ledger, below).await?;
            if removed > 0 {
                tracing::debug!("[did-02] Pruned {} fork blocks below height {}", removed, below);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl<C, H> SyncApi for SyncEngine<C, H>
where
    C: ChainStore + 'static,
    H: OperationHandler + 'static,
{
    async fn run_sync(
        &self,
        source: &dyn BlockSource,
        request: SyncRequest,
        cancel: watch::Receiver<bool>,
    ) -> Result<SyncReport, SyncError> {
        let lock = self.ledger_lock(request.ledger);
        let _guard = lock
            .try_lock()
            .map_err(|_| SyncError::AlreadyRunning(request.ledger))?;

        let pass_id = Uuid::new_v4();
        let span = tracing::info_span!("sync_pass", ledger = %request.ledger, pass = %pass_id);
        let result = self
            .run_pass(source, request, &cancel)
            .instrument(span.clone())
            .await;

        span.in_scope(|| match &result {
            Ok(report) if report.is_noop() => {
                tracing::debug!("[did-02] Pass complete, nothing to do");
            }
            Ok(report) => {
                tracing::info!(
                    "[did-02] Pass complete: {} blocks ({} forks), {} operations, switched: {}",
                    report.blocks_added,
                    report.forks_recorded,
                    report.operations_accepted,
                    report.branch_switched
                );
            }
            Err(e) => {
                tracing::error!("[did-02] Pass aborted: {}", e);
            }
        });
        result
    }
}
