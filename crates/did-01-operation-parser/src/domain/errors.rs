//! # Domain Errors
//!
//! Error types for operation parsing, update-stack evaluation and DID
//! resolution.
//!
//! Every rejection is a typed value. Nothing in this crate panics on
//! attacker-controlled input.

use super::entities::{Curve, DidIdentifier};
use thiserror::Error;

/// Failure class of a rejected operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Malformed operation: bad keys, services, limits, empty actions.
    Structural,
    /// Hash chain broken, DID unknown, deactivated or already applied.
    ChainContinuity,
    /// Signer key not resolvable or signature does not verify.
    Signature,
    /// Prior state could not be read.
    Resolution,
}

/// Errors raised while folding an update action list.
///
/// `index` is the position of the offending action in the list.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UpdateStackError {
    #[error("Action {index}: key '{key_id}' already exists")]
    DuplicateKey { index: usize, key_id: String },

    #[error("Action {index}: key '{key_id}' not found")]
    KeyNotFound { index: usize, key_id: String },

    #[error("Action {index}: key '{key_id}' already removed")]
    KeyAlreadyRemoved { index: usize, key_id: String },

    #[error("Action {index}: removing '{key_id}' would leave no master key")]
    LastMasterKey { index: usize, key_id: String },

    #[error("Action {index}: service '{service_id}' already exists")]
    DuplicateService { index: usize, service_id: String },

    #[error("Action {index}: service '{service_id}' not found")]
    ServiceNotFound { index: usize, service_id: String },

    #[error("Action {index}: service '{service_id}' already removed")]
    ServiceAlreadyRemoved { index: usize, service_id: String },

    #[error("Action {index}: service '{service_id}' was removed earlier in this update")]
    UpdateOfRemovedService { index: usize, service_id: String },
}

/// Errors raised while reading accepted operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    /// The backing operation log failed.
    #[error("Operation log unavailable: {0}")]
    Store(String),

    /// The log holds a chain that cannot be folded.
    #[error("Corrupt operation chain for {did}: {reason}")]
    CorruptChain { did: DidIdentifier, reason: String },
}

/// Reasons a signed operation is rejected.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OperationError {
    // -------------------------------------------------------------------------
    // Structural
    // -------------------------------------------------------------------------
    #[error("Malformed operation encoding: {0}")]
    Malformed(String),

    #[error("Operation must keep at least one master key")]
    MissingMasterKey,

    #[error("Master key '{key_id}' must use the primary curve, got {curve}")]
    MasterKeyCurve { key_id: String, curve: Curve },

    #[error("Key id '{key_id}' is empty or longer than {max} bytes")]
    KeyIdInvalid { key_id: String, max: usize },

    #[error("Duplicate key id '{0}'")]
    DuplicateKeyId(String),

    #[error("Key '{key_id}' has invalid material: {reason}")]
    KeyMaterial { key_id: String, reason: String },

    #[error("Key '{key_id}' has unknown usage")]
    UnknownKeyUsage { key_id: String },

    #[error("Too many verification methods: {count} > {max}")]
    TooManyVerificationMethods { count: usize, max: usize },

    #[error("Too many services: {count} > {max}")]
    TooManyServices { count: usize, max: usize },

    #[error("Service id '{service_id}' is empty or longer than {max} bytes")]
    ServiceIdInvalid { service_id: String, max: usize },

    #[error("Duplicate service id '{0}'")]
    DuplicateServiceId(String),

    #[error("Service '{service_id}' has an invalid type: {reason}")]
    ServiceTypeInvalid { service_id: String, reason: String },

    #[error("Service '{service_id}' endpoint is {size} bytes, limit is {max}")]
    ServiceEndpointTooLarge {
        service_id: String,
        size: usize,
        max: usize,
    },

    #[error("Service '{service_id}' has an invalid endpoint: {reason}")]
    ServiceEndpointInvalid { service_id: String, reason: String },

    #[error("Invalid context entry: {0}")]
    ContextInvalid(String),

    #[error("Update action {index} is empty")]
    EmptyAction { index: usize },

    #[error("Update carries no actions")]
    EmptyActionList,

    #[error(transparent)]
    UpdateStack(#[from] UpdateStackError),

    #[error("Invalid protocol version update: {0}")]
    InvalidProtocolVersion(String),

    // -------------------------------------------------------------------------
    // Chain continuity
    // -------------------------------------------------------------------------
    #[error("DID not found: {0}")]
    DidNotFound(DidIdentifier),

    #[error("DID is deactivated: {0}")]
    DidDeactivated(DidIdentifier),

    #[error("Previous operation hash mismatch: expected {expected}, declared {declared}")]
    PreviousHashMismatch { expected: String, declared: String },

    #[error("Operation already applied: {0}")]
    AlreadyApplied(String),

    // -------------------------------------------------------------------------
    // Signature
    // -------------------------------------------------------------------------
    #[error("Operation is not signed")]
    MissingSignature,

    #[error("Signing key '{0}' not found")]
    SignerKeyNotFound(String),

    #[error("Signing key '{0}' is not a master key")]
    SignerNotMaster(String),

    #[error("Signature does not verify with key '{0}'")]
    SignatureInvalid(String),

    // -------------------------------------------------------------------------
    // Resolution
    // -------------------------------------------------------------------------
    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

impl OperationError {
    /// Failure class of this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            OperationError::DidNotFound(_)
            | OperationError::DidDeactivated(_)
            | OperationError::PreviousHashMismatch { .. }
            | OperationError::AlreadyApplied(_) => ErrorCategory::ChainContinuity,

            OperationError::MissingSignature
            | OperationError::SignerKeyNotFound(_)
            | OperationError::SignerNotMaster(_)
            | OperationError::SignatureInvalid(_) => ErrorCategory::Signature,

            OperationError::Resolve(_) => ErrorCategory::Resolution,

            _ => ErrorCategory::Structural,
        }
    }
}
