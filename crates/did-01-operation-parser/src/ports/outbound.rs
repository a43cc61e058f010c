//! # Outbound Ports
//!
//! What the parser needs from the outside: a log of accepted operations and
//! a resolver over it.

use crate::domain::{AcceptedOperation, DidIdentifier, ProtocolVersion, ResolveError, ResolvedDid};
use async_trait::async_trait;
use parking_lot::RwLock;
use shared_types::{BlockRef, ChainPosition, LedgerId};

// =============================================================================
// RESOLUTION CONTEXT
// =============================================================================

/// Which lineage of the block forest to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerView {
    /// Blocks whose fork flag is false.
    Canonical,
    /// Lineage ending at this block: its fork segment plus the canonical
    /// chain up to the segment's fork point.
    Branch(BlockRef),
    /// No stored ancestry; only the pending overlay is visible.
    Detached,
}

/// Where and up to when prior state is resolved.
#[derive(Debug, Clone)]
pub struct ResolveContext {
    pub view: LedgerView,
    /// Inclusive cutoff; `None` reads the whole lineage.
    pub as_of: Option<ChainPosition>,
    /// Operations accepted earlier in a block that is not committed yet.
    pub pending: Vec<AcceptedOperation>,
}

impl ResolveContext {
    pub fn canonical() -> Self {
        Self {
            view: LedgerView::Canonical,
            as_of: None,
            pending: Vec::new(),
        }
    }

    /// Resolve on the lineage ending at `block`.
    pub fn branch(block: BlockRef) -> Self {
        Self {
            view: LedgerView::Branch(block),
            as_of: None,
            pending: Vec::new(),
        }
    }

    pub fn with_as_of(mut self, as_of: ChainPosition) -> Self {
        self.as_of = Some(as_of);
        self
    }

    pub fn with_pending(mut self, pending: Vec<AcceptedOperation>) -> Self {
        self.pending = pending;
        self
    }

    /// Whether an operation at `position` is visible under the cutoff.
    pub fn includes(&self, position: &ChainPosition) -> bool {
        self.as_of.map_or(true, |cutoff| *position <= cutoff)
    }
}

impl Default for ResolveContext {
    fn default() -> Self {
        Self::canonical()
    }
}

// =============================================================================
// PORTS
// =============================================================================

/// Read access to accepted operations.
#[async_trait]
pub trait OperationLog: Send + Sync {
    /// Operations whose subject is `did` on `view`, in chain order.
    async fn operations_for_did(
        &self,
        ledger: LedgerId,
        did: &DidIdentifier,
        view: &LedgerView,
    ) -> Result<Vec<AcceptedOperation>, ResolveError>;

    /// Accepted protocol version updates on `view`, in chain order.
    async fn protocol_updates(
        &self,
        ledger: LedgerId,
        view: &LedgerView,
    ) -> Result<Vec<AcceptedOperation>, ResolveError>;
}

/// DID resolution as seen by the parser.
#[async_trait]
pub trait DidResolution: Send + Sync {
    /// Replay `did` under `ctx`. `Ok(None)` if it was never created.
    async fn resolve(
        &self,
        ledger: LedgerId,
        did: &DidIdentifier,
        ctx: &ResolveContext,
    ) -> Result<Option<ResolvedDid>, ResolveError>;

    /// Highest protocol version accepted under `ctx`.
    async fn protocol_version(
        &self,
        ledger: LedgerId,
        ctx: &ResolveContext,
    ) -> Result<ProtocolVersion, ResolveError>;
}

// =============================================================================
// Mock Implementations for Testing
// =============================================================================

/// Flat in-memory operation log. Every operation is canonical, so branch
/// views read the same operations as the canonical view.
#[derive(Default)]
pub struct InMemoryOperationLog {
    operations: RwLock<Vec<AcceptedOperation>>,
}

impl InMemoryOperationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an accepted operation.
    pub fn append(&self, operation: AcceptedOperation) {
        let mut operations = self.operations.write();
        operations.push(operation);
        operations.sort_by_key(|op| op.position);
    }

    pub fn len(&self) -> usize {
        self.operations.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.read().is_empty()
    }
}

#[async_trait]
impl OperationLog for InMemoryOperationLog {
    async fn operations_for_did(
        &self,
        ledger: LedgerId,
        did: &DidIdentifier,
        view: &LedgerView,
    ) -> Result<Vec<AcceptedOperation>, ResolveError> {
        if *view == LedgerView::Detached {
            return Ok(Vec::new());
        }
        Ok(self
            .operations
            .read()
            .iter()
            .filter(|op| op.ledger == ledger && op.did == *did)
            .cloned()
            .collect())
    }

    async fn protocol_updates(
        &self,
        ledger: LedgerId,
        view: &LedgerView,
    ) -> Result<Vec<AcceptedOperation>, ResolveError> {
        if *view == LedgerView::Detached {
            return Ok(Vec::new());
        }
        Ok(self
            .operations
            .read()
            .iter()
            .filter(|op| {
                op.ledger == ledger
                    && op.kind() == crate::domain::OperationKind::ProtocolVersionUpdate
            })
            .cloned()
            .collect())
    }
}
