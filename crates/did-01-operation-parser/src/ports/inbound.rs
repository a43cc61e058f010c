//! # Inbound Ports
//!
//! API exposed by the operation parser to the sync engine and the write path.

use super::outbound::ResolveContext;
use crate::domain::{AcceptedOperation, OperationError, SignedOperation};
use async_trait::async_trait;
use shared_types::{ChainPosition, LedgerId};

/// Validates signed operations into accepted state transitions.
#[async_trait]
pub trait OperationHandler: Send + Sync {
    /// Validate `signed` as if it sat at `position` on `ledger`.
    async fn handle(
        &self,
        signed: &SignedOperation,
        ledger: LedgerId,
        position: ChainPosition,
        ctx: &ResolveContext,
    ) -> Result<AcceptedOperation, OperationError>;

    /// Decode a wire record and validate it.
    ///
    /// The write path calls this to self-check an operation before it is
    /// broadcast.
    async fn parse_operation(
        &self,
        bytes: &[u8],
        ledger: LedgerId,
        position: ChainPosition,
        ctx: &ResolveContext,
    ) -> Result<AcceptedOperation, OperationError> {
        let signed = SignedOperation::decode(bytes)?;
        self.handle(&signed, ledger, position, ctx).await
    }
}
