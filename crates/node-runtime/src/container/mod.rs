//! # Node Container
//!
//! Wires the chain store, the resolver, the operation parser and the sync
//! engine together.
//!
//! ```text
//! InMemoryChainStore ──(OperationLog)──→ DidResolver
//!         │                                  │
//!   (ChainStore)                     OperationParser ←── DefaultCryptoVerifier
//!         │                                  │
//!         └──────────→ SyncEngine ←──(OperationHandler)
//! ```

pub mod config;

pub use config::{ConfigError, NodeConfig};

use std::sync::Arc;

use did_01_operation_parser::{DidResolver, OperationParser};
use did_02_chain_sync::{InMemoryChainStore, SyncEngine};
use shared_crypto::DefaultCryptoVerifier;
use tracing::info;

pub type NodeResolver = DidResolver<InMemoryChainStore>;
pub type NodeParser = OperationParser<NodeResolver, DefaultCryptoVerifier>;
pub type NodeSyncEngine = SyncEngine<InMemoryChainStore, NodeParser>;

/// All services of a running node.
pub struct NodeContainer {
    pub config: NodeConfig,
    pub store: Arc<InMemoryChainStore>,
    pub resolver: Arc<NodeResolver>,
    pub parser: Arc<NodeParser>,
    pub engine: Arc<NodeSyncEngine>,
}

impl NodeContainer {
    pub fn new(config: NodeConfig) -> Self {
        let store = Arc::new(InMemoryChainStore::new());
        let resolver = Arc::new(DidResolver::new(store.clone(), config.protocol.clone()));
        let parser = Arc::new(OperationParser::new(
            resolver.clone(),
            Arc::new(DefaultCryptoVerifier::new()),
            config.protocol.clone(),
        ));
        let engine = Arc::new(SyncEngine::new(
            store.clone(),
            parser.clone(),
            config.sync.clone(),
        ));
        info!(
            "Node container ready for {} (start height {})",
            config.ledger, config.sync.start_height
        );

        Self {
            config,
            store,
            resolver,
            parser,
            engine,
        }
    }
}
