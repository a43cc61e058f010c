//! # DID-01 Operation Parser
//!
//! Turns signed identity operations into accepted state transitions.
//!
//! **Subsystem ID:** 1
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Purpose
//!
//! Every operation found on chain passes through this crate before the
//! block carrying it is committed:
//! - `CreateDid` establishes a DID whose identifier is the hash of the
//!   operation itself
//! - `UpdateDid` and `DeactivateDid` extend the DID's hash chain and must be
//!   signed by one of its master keys
//! - `ProtocolVersionUpdate` announces a newer protocol version
//!
//! ## Rules Enforced
//!
//! | Rule | Where |
//! |------|-------|
//! | Key, service and context shape | `algorithms::validation` |
//! | Order-sensitive update actions | `algorithms::update_stack` |
//! | Hash-chain continuity | `application::parser` |
//! | Master-key signatures | `application::parser` via `CryptoVerifier` |
//!
//! ## Module Structure
//!
//! ```text
//! did-01-operation-parser/
//! ├── domain/          # Operations, resolved state, errors
//! ├── algorithms/      # Structural validation, update stack fold
//! ├── ports/           # OperationHandler (inbound), OperationLog + DidResolution (outbound)
//! ├── application/     # DidResolver, OperationParser
//! └── config.rs        # ProtocolParameters
//! ```

#![warn(clippy::all)]

pub mod algorithms;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

// Re-exports
pub use algorithms::{evaluate, Touch, UpdateStackEvaluator};
pub use application::resolver::fold_operations;
pub use application::{DidResolver, OperationParser};
pub use config::ProtocolParameters;
pub use domain::{
    AcceptedOperation, CreateDid, Curve, DeactivateDid, DidIdentifier, DocumentState,
    ErrorCategory, KeyData, KeyUsage, Operation, OperationError, OperationKind,
    ProtocolVersion, ProtocolVersionInfo, ProtocolVersionUpdate, PublicKey, ResolveError,
    ResolvedDid, Service, SignedOperation, UpdateAction, UpdateDid, UpdateStackError,
};
pub use ports::{
    DidResolution, InMemoryOperationLog, LedgerView, OperationHandler, OperationLog,
    ResolveContext,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
