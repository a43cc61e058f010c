//! # Operation Parser
//!
//! Validates a signed operation against protocol rules and, for operations
//! that extend an existing DID, against its resolved prior state.
//!
//! ## Check order
//!
//! 1. Structural checks that need no prior state
//! 2. Resolution of prior state and hash-chain continuity
//! 3. Signature over the canonical operation bytes
//! 4. State checks on the result (update stack, limits, versions)

use async_trait::async_trait;
use std::sync::Arc;

use crate::algorithms::{
    evaluate, validate_actions, validate_contexts, validate_keys, validate_services,
    validate_version_info,
};
use crate::config::ProtocolParameters;
use crate::domain::{
    AcceptedOperation, CreateDid, DeactivateDid, DidIdentifier, Operation, OperationError,
    ProtocolVersionUpdate, PublicKey, ResolvedDid, SignedOperation, UpdateDid,
};
use crate::ports::{DidResolution, OperationHandler, ResolveContext};
use shared_crypto::CryptoVerifier;
use shared_types::{short_hex, ChainPosition, Hash, LedgerId};

/// Operation parser.
pub struct OperationParser<R: DidResolution, V: CryptoVerifier> {
    resolver: Arc<R>,
    verifier: Arc<V>,
    params: ProtocolParameters,
}

impl<R: DidResolution, V: CryptoVerifier> OperationParser<R, V> {
    pub fn new(resolver: Arc<R>, verifier: Arc<V>, params: ProtocolParameters) -> Self {
        Self {
            resolver,
            verifier,
            params,
        }
    }

    pub fn params(&self) -> &ProtocolParameters {
        &self.params
    }

    fn accept(
        signed: &SignedOperation,
        operation_hash: Hash,
        did: DidIdentifier,
        ledger: LedgerId,
        position: ChainPosition,
    ) -> AcceptedOperation {
        tracing::debug!(
            "[did-01] Accepted {} for {} at {:?}",
            signed.operation.kind(),
            did,
            position
        );
        AcceptedOperation {
            ledger,
            operation_hash,
            did,
            position,
            signed: signed.clone(),
        }
    }

    /// Verify the signature with `key`.
    fn verify_with(
        &self,
        signed: &SignedOperation,
        key: &PublicKey,
    ) -> Result<(), OperationError> {
        let payload = signed.operation.canonical_bytes()?;
        let curve_key = key
            .curve_key()
            .ok_or_else(|| OperationError::SignatureInvalid(key.id.clone()))?;
        if self
            .verifier
            .verify(&payload, &signed.signature, &curve_key)
        {
            Ok(())
        } else {
            Err(OperationError::SignatureInvalid(key.id.clone()))
        }
    }

    /// Signer must be a master key among `keys`.
    fn verify_master_signature(
        &self,
        signed: &SignedOperation,
        keys: &[PublicKey],
    ) -> Result<(), OperationError> {
        if signed.signature.is_empty() {
            return Err(OperationError::MissingSignature);
        }
        let key = keys
            .iter()
            .find(|k| k.id == signed.signed_with)
            .ok_or_else(|| OperationError::SignerKeyNotFound(signed.signed_with.clone()))?;
        if !key.is_master() {
            return Err(OperationError::SignerNotMaster(key.id.clone()));
        }
        self.verify_with(signed, key)
    }

    /// Resolve `did` and check that `previous` is its chain head.
    async fn resolve_head(
        &self,
        ledger: LedgerId,
        did: &DidIdentifier,
        operation_hash: &Hash,
        previous: &Hash,
        ctx: &ResolveContext,
    ) -> Result<ResolvedDid, OperationError> {
        let prior = self
            .resolver
            .resolve(ledger, did, ctx)
            .await?
            .ok_or(OperationError::DidNotFound(*did))?;

        if prior.last_operation_hash == *operation_hash {
            return Err(OperationError::AlreadyApplied(hex::encode(operation_hash)));
        }
        if prior.deactivated {
            return Err(OperationError::DidDeactivated(*did));
        }
        if prior.last_operation_hash != *previous {
            return Err(OperationError::PreviousHashMismatch {
                expected: hex::encode(prior.last_operation_hash),
                declared: hex::encode(previous),
            });
        }
        Ok(prior)
    }

    // =========================================================================
    // Per-kind handlers
    // =========================================================================

    async fn handle_create(
        &self,
        signed: &SignedOperation,
        create: &CreateDid,
        ledger: LedgerId,
        position: ChainPosition,
        ctx: &ResolveContext,
    ) -> Result<AcceptedOperation, OperationError> {
        validate_keys(&create.public_keys, &self.params)?;
        if !create.public_keys.iter().any(|k| k.is_master()) {
            return Err(OperationError::MissingMasterKey);
        }
        validate_services(&create.services, &self.params)?;
        validate_contexts(&create.contexts)?;

        let operation_hash = signed.operation.hash()?;
        let did = DidIdentifier(operation_hash);

        if !signed.signature.is_empty() {
            self.verify_master_signature(signed, &create.public_keys)?;
        }

        if self.resolver.resolve(ledger, &did, ctx).await?.is_some() {
            return Err(OperationError::AlreadyApplied(hex::encode(operation_hash)));
        }

        Ok(Self::accept(signed, operation_hash, did, ledger, position))
    }

    async fn handle_update(
        &self,
        signed: &SignedOperation,
        update: &UpdateDid,
        ledger: LedgerId,
        position: ChainPosition,
        ctx: &ResolveContext,
    ) -> Result<AcceptedOperation, OperationError> {
        validate_actions(&update.actions, &self.params)?;

        let operation_hash = signed.operation.hash()?;
        let prior = self
            .resolve_head(
                ledger,
                &update.id,
                &operation_hash,
                &update.previous_operation_hash,
                ctx,
            )
            .await?;

        self.verify_master_signature(signed, &prior.document.keys)?;

        let next = evaluate(&prior.document, &update.actions)?;
        if next.master_key_count() == 0 {
            return Err(OperationError::MissingMasterKey);
        }
        if next.services.len() > self.params.max_services {
            return Err(OperationError::TooManyServices {
                count: next.services.len(),
                max: self.params.max_services,
            });
        }
        if next.keys.len() > self.params.max_verification_methods {
            return Err(OperationError::TooManyVerificationMethods {
                count: next.keys.len(),
                max: self.params.max_verification_methods,
            });
        }

        Ok(Self::accept(signed, operation_hash, update.id, ledger, position))
    }

    async fn handle_deactivate(
        &self,
        signed: &SignedOperation,
        deactivate: &DeactivateDid,
        ledger: LedgerId,
        position: ChainPosition,
        ctx: &ResolveContext,
    ) -> Result<AcceptedOperation, OperationError> {
        let operation_hash = signed.operation.hash()?;
        let prior = self
            .resolve_head(
                ledger,
                &deactivate.id,
                &operation_hash,
                &deactivate.previous_operation_hash,
                ctx,
            )
            .await?;

        self.verify_master_signature(signed, &prior.document.keys)?;

        Ok(Self::accept(signed, operation_hash, deactivate.id, ledger, position))
    }

    async fn handle_protocol_update(
        &self,
        signed: &SignedOperation,
        update: &ProtocolVersionUpdate,
        ledger: LedgerId,
        position: ChainPosition,
        ctx: &ResolveContext,
    ) -> Result<AcceptedOperation, OperationError> {
        validate_version_info(&update.version, &self.params)?;

        let operation_hash = signed.operation.hash()?;
        let prior = self
            .resolve_head(
                ledger,
                &update.proposer,
                &operation_hash,
                &update.previous_operation_hash,
                ctx,
            )
            .await?;

        if signed.signature.is_empty() {
            return Err(OperationError::MissingSignature);
        }
        let key = prior
            .document
            .keys
            .iter()
            .find(|k| k.id.eq_ignore_ascii_case(&signed.signed_with))
            .ok_or_else(|| OperationError::SignerKeyNotFound(signed.signed_with.clone()))?;
        self.verify_with(signed, key)?;

        let current = self.resolver.protocol_version(ledger, ctx).await?;
        let proposed = update.version.protocol_version;
        if proposed <= current {
            return Err(OperationError::InvalidProtocolVersion(format!(
                "version {} is not newer than {}",
                proposed, current
            )));
        }

        tracing::info!(
            "[did-01] Protocol version {} proposed by {} effective at block {}",
            proposed,
            short_hex(&update.proposer.0),
            update.version.effective_since
        );
        Ok(Self::accept(
            signed,
            operation_hash,
            update.proposer,
            ledger,
            position,
        ))
    }
}

#[async_trait]
impl<R, V> OperationHandler for OperationParser<R, V>
where
    R: DidResolution + 'static,
    V: CryptoVerifier + 'static,
{
    async fn handle(
        &self,
        signed: &SignedOperation,
        ledger: LedgerId,
        position: ChainPosition,
        ctx: &ResolveContext,
    ) -> Result<AcceptedOperation, OperationError> {
        let result = match &signed.operation {
            Operation::CreateDid(create) => {
                self.handle_create(signed, create, ledger, position, ctx).await
            }
            Operation::UpdateDid(update) => {
                self.handle_update(signed, update, ledger, position, ctx).await
            }
            Operation::DeactivateDid(deactivate) => {
                self.handle_deactivate(signed, deactivate, ledger, position, ctx)
                    .await
            }
            Operation::ProtocolVersionUpdate(update) => {
                self.handle_protocol_update(signed, update, ledger, position, ctx)
                    .await
            }
        };

        if let Err(e) = &result {
            tracing::debug!(
                "[did-01] Rejected {} at {:?}: {}",
                signed.operation.kind(),
                position,
                e
            );
        }
        result
    }
}
