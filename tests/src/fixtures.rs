//! # Test Fixtures
//!
//! A scriptable upstream chain wired to the real store, resolver, parser and
//! sync engine, plus deterministic DID key material.

use std::sync::Arc;

use tokio::sync::watch;

use did_01_operation_parser::{
    CreateDid, DeactivateDid, DidIdentifier, DidResolution, DidResolver, KeyUsage, Operation,
    OperationParser, ProtocolParameters, PublicKey, ResolveContext, ResolvedDid, Service,
    SignedOperation, UpdateAction, UpdateDid,
};
use did_02_chain_sync::{
    InMemoryChainStore, MockBlockSource, SourceBlock, StoredBlock, SyncApi, SyncConfig,
    SyncEngine, SyncError, SyncReport, SyncRequest,
};
use shared_crypto::{DefaultCryptoVerifier, Secp256k1KeyPair};
use shared_types::{Hash, LedgerId};

pub const LEDGER: LedgerId = LedgerId::InMemory;

pub type Resolver = DidResolver<InMemoryChainStore>;
pub type Parser = OperationParser<Resolver, DefaultCryptoVerifier>;
pub type Engine = SyncEngine<InMemoryChainStore, Parser>;

/// Upstream mock plus a full local node.
pub struct Harness {
    pub source: MockBlockSource,
    pub store: Arc<InMemoryChainStore>,
    pub resolver: Arc<Resolver>,
    pub parser: Arc<Parser>,
    pub engine: Engine,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(SyncConfig::for_testing())
    }

    pub fn with_config(config: SyncConfig) -> Self {
        let params = ProtocolParameters::default();
        let store = Arc::new(InMemoryChainStore::new());
        let resolver = Arc::new(DidResolver::new(store.clone(), params.clone()));
        let parser = Arc::new(OperationParser::new(
            resolver.clone(),
            Arc::new(DefaultCryptoVerifier::new()),
            params,
        ));
        let engine = SyncEngine::new(store.clone(), parser.clone(), config);
        Self {
            source: MockBlockSource::new(),
            store,
            resolver,
            parser,
            engine,
        }
    }

    pub async fn sync(&self) -> Result<SyncReport, SyncError> {
        let request = SyncRequest::new(LEDGER, self.engine.config());
        self.engine
            .run_sync(&self.source, request, watch::channel(false).1)
            .await
    }

    pub async fn sync_with_cancel(
        &self,
        cancel: watch::Receiver<bool>,
    ) -> Result<SyncReport, SyncError> {
        let request = SyncRequest::new(LEDGER, self.engine.config());
        self.engine.run_sync(&self.source, request, cancel).await
    }

    /// Append a block carrying one transaction per payload list.
    pub fn add_block(&self, parent: &SourceBlock, label: &str, txs: Vec<Vec<Vec<u8>>>) -> SourceBlock {
        self.source.add_block(Some(parent), label, txs)
    }

    /// Extend the upstream tip with a block of single-payload transactions.
    pub fn extend_with(&self, label: &str, payloads: Vec<Vec<u8>>) -> SourceBlock {
        let tip = self.source.current_tip();
        let txs = payloads.into_iter().map(|p| vec![p]).collect();
        self.source.add_block(tip.as_ref(), label, txs)
    }

    pub fn stored(&self) -> Vec<StoredBlock> {
        self.store.all_blocks(LEDGER)
    }

    pub fn blocks_at(&self, height: u64) -> Vec<StoredBlock> {
        self.stored()
            .into_iter()
            .filter(|b| b.height() == height)
            .collect()
    }

    pub fn fork_flag(&self, block: &SourceBlock) -> Option<bool> {
        self.stored()
            .into_iter()
            .find(|b| b.block == block.block_ref())
            .map(|b| b.fork)
    }

    /// Fork flags of every stored block, for before/after comparisons.
    pub fn fork_flags(&self) -> Vec<(u64, Hash, bool)> {
        self.stored()
            .into_iter()
            .map(|b| (b.height(), *b.hash(), b.fork))
            .collect()
    }

    pub async fn resolve(&self, did: &DidIdentifier) -> Option<ResolvedDid> {
        self.resolver
            .resolve(LEDGER, did, &ResolveContext::canonical())
            .await
            .unwrap()
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

/// Deterministic secp256k1 key pair.
pub fn key_pair(seed: u8) -> Secp256k1KeyPair {
    Secp256k1KeyPair::from_bytes([seed; 32]).unwrap()
}

/// A DID's controller: its master key pair and key id.
pub struct Controller {
    pub key_id: String,
    pub pair: Secp256k1KeyPair,
}

impl Controller {
    pub fn new(key_id: &str, seed: u8) -> Self {
        Self {
            key_id: key_id.to_string(),
            pair: key_pair(seed),
        }
    }

    pub fn master_key(&self) -> PublicKey {
        PublicKey::from_key_pair(self.key_id.clone(), KeyUsage::Master, &self.pair)
    }

    pub fn sign(&self, operation: Operation) -> SignedOperation {
        SignedOperation::sign(operation, self.key_id.clone(), &self.pair).unwrap()
    }

    /// Signed wire bytes of `operation`.
    pub fn payload(&self, operation: Operation) -> Vec<u8> {
        self.sign(operation).encode().unwrap()
    }
}

pub fn create_op(controller: &Controller, services: Vec<Service>) -> Operation {
    Operation::CreateDid(CreateDid {
        public_keys: vec![controller.master_key()],
        services,
        contexts: vec![],
    })
}

pub fn update_op(did: DidIdentifier, previous: Hash, actions: Vec<UpdateAction>) -> Operation {
    Operation::UpdateDid(UpdateDid {
        id: did,
        previous_operation_hash: previous,
        actions,
    })
}

pub fn deactivate_op(did: DidIdentifier, previous: Hash) -> Operation {
    Operation::DeactivateDid(DeactivateDid {
        id: did,
        previous_operation_hash: previous,
    })
}

/// DID established by a create operation.
pub fn did_of(operation: &Operation) -> DidIdentifier {
    DidIdentifier(operation.hash().unwrap())
}

pub fn service(id: &str) -> Service {
    Service::new(id, "LinkedDomains", "https://example.com/")
}
