//! # DID Resolver
//!
//! Replays a DID's accepted operations, in chain order, into its current
//! document and hash-chain head.

use async_trait::async_trait;
use std::sync::Arc;

use crate::algorithms::apply;
use crate::config::ProtocolParameters;
use crate::domain::{
    AcceptedOperation, DidIdentifier, DocumentState, Operation, ProtocolVersion, ResolveError,
    ResolvedDid,
};
use crate::ports::{DidResolution, OperationLog, ResolveContext};
use shared_types::LedgerId;

/// Resolver over an operation log.
pub struct DidResolver<L: OperationLog> {
    log: Arc<L>,
    params: ProtocolParameters,
}

impl<L: OperationLog> DidResolver<L> {
    pub fn new(log: Arc<L>, params: ProtocolParameters) -> Self {
        Self { log, params }
    }

    pub fn params(&self) -> &ProtocolParameters {
        &self.params
    }

    /// Logged operations for `did` followed by the pending overlay, cut at
    /// `ctx.as_of`.
    async fn visible_operations(
        &self,
        ledger: LedgerId,
        did: &DidIdentifier,
        ctx: &ResolveContext,
    ) -> Result<Vec<AcceptedOperation>, ResolveError> {
        let mut operations = self.log.operations_for_did(ledger, did, &ctx.view).await?;
        operations.extend(
            ctx.pending
                .iter()
                .filter(|op| op.ledger == ledger && op.did == *did)
                .cloned(),
        );
        operations.retain(|op| ctx.includes(&op.position));
        operations.sort_by_key(|op| op.position);
        Ok(operations)
    }
}

/// Fold an ordered operation chain into resolved state.
pub fn fold_operations(
    did: &DidIdentifier,
    operations: &[AcceptedOperation],
) -> Result<Option<ResolvedDid>, ResolveError> {
    let corrupt = |reason: &str| ResolveError::CorruptChain {
        did: *did,
        reason: reason.to_string(),
    };

    let mut state: Option<ResolvedDid> = None;
    for op in operations {
        match op.operation() {
            Operation::CreateDid(create) => {
                if state.is_some() {
                    return Err(corrupt("second CreateDid in chain"));
                }
                state = Some(ResolvedDid {
                    did: *did,
                    document: DocumentState {
                        keys: create.public_keys.clone(),
                        services: create.services.clone(),
                        contexts: create.contexts.clone(),
                    },
                    last_operation_hash: op.operation_hash,
                    deactivated: false,
                    created_at: op.position,
                    updated_at: op.position,
                });
            }
            Operation::UpdateDid(update) => {
                let current = state
                    .as_mut()
                    .ok_or_else(|| corrupt("UpdateDid before CreateDid"))?;
                if current.deactivated {
                    return Err(corrupt("UpdateDid after DeactivateDid"));
                }
                if update.previous_operation_hash != current.last_operation_hash {
                    return Err(corrupt("UpdateDid breaks the hash chain"));
                }
                current.document = apply(&current.document, &update.actions);
                current.last_operation_hash = op.operation_hash;
                current.updated_at = op.position;
            }
            Operation::DeactivateDid(deactivate) => {
                let current = state
                    .as_mut()
                    .ok_or_else(|| corrupt("DeactivateDid before CreateDid"))?;
                if current.deactivated {
                    return Err(corrupt("DeactivateDid after DeactivateDid"));
                }
                if deactivate.previous_operation_hash != current.last_operation_hash {
                    return Err(corrupt("DeactivateDid breaks the hash chain"));
                }
                current.document.keys.clear();
                current.document.services.clear();
                current.deactivated = true;
                current.last_operation_hash = op.operation_hash;
                current.updated_at = op.position;
            }
            // Protocol updates do not advance the proposer's chain.
            Operation::ProtocolVersionUpdate(_) => {}
        }
    }
    Ok(state)
}

#[async_trait]
impl<L: OperationLog + 'static> DidResolution for DidResolver<L> {
    async fn resolve(
        &self,
        ledger: LedgerId,
        did: &DidIdentifier,
        ctx: &ResolveContext,
    ) -> Result<Option<ResolvedDid>, ResolveError> {
        let operations = self.visible_operations(ledger, did, ctx).await?;
        let resolved = fold_operations(did, &operations)?;
        tracing::trace!(
            "[did-01] Resolved {} from {} operations (found: {})",
            did,
            operations.len(),
            resolved.is_some()
        );
        Ok(resolved)
    }

    async fn protocol_version(
        &self,
        ledger: LedgerId,
        ctx: &ResolveContext,
    ) -> Result<ProtocolVersion, ResolveError> {
        let logged = self.log.protocol_updates(ledger, &ctx.view).await?;
        let highest = logged
            .iter()
            .chain(ctx.pending.iter().filter(|op| op.ledger == ledger))
            .filter(|op| ctx.includes(&op.position))
            .filter_map(|op| match op.operation() {
                Operation::ProtocolVersionUpdate(update) => Some(update.version.protocol_version),
                _ => None,
            })
            .max();
        Ok(highest
            .unwrap_or(self.params.initial_protocol_version)
            .max(self.params.initial_protocol_version))
    }
}
