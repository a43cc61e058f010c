//! # DID-02 Chain Sync
//!
//! Keeps a local block forest in step with an upstream UTXO chain and
//! commits the identity operations each block carries.
//!
//! **Subsystem ID:** 2
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Purpose
//!
//! - Detect where the upstream chain diverges from the local one
//! - Store every block seen, flagging blocks off the canonical lineage as
//!   forks
//! - Switch branches when a fork catches up with the canonical tip
//! - Validate each block's operations through DID-01 before committing it
//!
//! ## Invariants
//!
//! | Invariant | Enforced by |
//! |-----------|-------------|
//! | At most one canonical block per height | `ChainStore::switch_branch` |
//! | A block commits with all its operations or not at all | `ChainStore::create_block` |
//! | One pass per ledger at a time | `SyncEngine` pass lock |
//! | Forks resolve against their own lineage | `LedgerView::Branch` |
//!
//! ## Module Structure
//!
//! ```text
//! did-02-chain-sync/
//! ├── domain/          # Source and stored blocks, reports, errors
//! ├── ports/           # SyncApi (inbound), BlockSource + ChainStore (outbound)
//! ├── application/     # SyncEngine
//! ├── adapters/        # InMemoryChainStore
//! └── config.rs        # SyncConfig
//! ```

#![warn(clippy::all)]

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

// Re-exports
pub use adapters::InMemoryChainStore;
pub use application::SyncEngine;
pub use config::SyncConfig;
pub use domain::{
    Epoch, SourceBlock, SourceError, SourceTransaction, StoreError, StoredBlock, SyncError,
    SyncErrorCategory, SyncReport,
};
pub use ports::{BlockSource, ChainStore, MockBlockSource, SyncApi, SyncRequest, MOCK_EPOCH_LENGTH};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
