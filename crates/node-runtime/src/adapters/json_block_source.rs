//! # JSON File Block Source
//!
//! `BlockSource` over an upstream chain dump on disk:
//!
//! ```json
//! {
//!   "tip": "<hex hash, optional>",
//!   "blocks": [
//!     {
//!       "height": 0,
//!       "hash": "<hex>",
//!       "previous_hash": null,
//!       "epoch": 0,
//!       "timestamp": 1700000000,
//!       "transactions": [
//!         { "index": 0, "hash": "<hex>", "payloads": ["<hex wire record>"] }
//!       ]
//!     }
//!   ]
//! }
//! ```
//!
//! Without `tip`, the highest block is the tip. The file is re-read by
//! `refresh`, so a dump rewritten between passes is picked up.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use did_02_chain_sync::{BlockSource, SourceBlock, SourceError, SourceTransaction};
use shared_types::{hash_from_hex, short_hex, Hash};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChainDump {
    #[serde(default)]
    pub tip: Option<String>,
    pub blocks: Vec<DumpBlock>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DumpBlock {
    pub height: u64,
    pub hash: String,
    #[serde(default)]
    pub previous_hash: Option<String>,
    #[serde(default)]
    pub epoch: u64,
    #[serde(default)]
    pub timestamp: u64,
    #[serde(default)]
    pub transactions: Vec<DumpTransaction>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DumpTransaction {
    pub index: u32,
    pub hash: String,
    #[serde(default)]
    pub payloads: Vec<String>,
}

/// Decoded dump, indexed for lookups.
#[derive(Default)]
struct LoadedChain {
    blocks: HashMap<Hash, SourceBlock>,
    transactions: HashMap<Hash, Vec<SourceTransaction>>,
    /// Tip lineage by height.
    chain: BTreeMap<u64, Hash>,
    tip: Option<Hash>,
}

impl LoadedChain {
    fn from_dump(dump: ChainDump) -> Result<Self, SourceError> {
        let mut loaded = LoadedChain::default();
        for block in dump.blocks {
            let hash = decode_hash(&block.hash)?;
            let previous_hash = block.previous_hash.as_deref().map(decode_hash).transpose()?;
            let mut transactions = Vec::with_capacity(block.transactions.len());
            for tx in &block.transactions {
                let payloads = tx
                    .payloads
                    .iter()
                    .map(|p| {
                        hex::decode(p).map_err(|e| {
                            SourceError::Malformed(format!("payload in tx {}: {}", tx.hash, e))
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                transactions.push(SourceTransaction {
                    hash: decode_hash(&tx.hash)?,
                    index: tx.index,
                    payloads,
                });
            }

            loaded.blocks.insert(
                hash,
                SourceBlock {
                    height: block.height,
                    hash,
                    previous_hash,
                    epoch: block.epoch,
                    timestamp: block.timestamp,
                    tx_count: transactions.len() as u32,
                },
            );
            loaded.transactions.insert(hash, transactions);
        }

        let tip = match dump.tip.as_deref() {
            Some(text) => Some(decode_hash(text)?),
            None => loaded
                .blocks
                .values()
                .max_by_key(|b| (b.height, b.hash))
                .map(|b| b.hash),
        };
        if let Some(tip) = tip {
            if !loaded.blocks.contains_key(&tip) {
                return Err(SourceError::Malformed(format!(
                    "tip {} is not in the dump",
                    short_hex(&tip)
                )));
            }
            let mut cursor = loaded.blocks.get(&tip);
            while let Some(block) = cursor {
                loaded.chain.insert(block.height, block.hash);
                cursor = block.previous_hash.and_then(|h| loaded.blocks.get(&h));
            }
        }
        loaded.tip = tip;
        Ok(loaded)
    }
}

fn decode_hash(text: &str) -> Result<Hash, SourceError> {
    hash_from_hex(text).map_err(|e| SourceError::Malformed(e.to_string()))
}

/// Block source reading a chain dump file.
pub struct JsonFileBlockSource {
    path: PathBuf,
    chain: RwLock<LoadedChain>,
}

impl JsonFileBlockSource {
    /// Open and load `path`.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let source = Self {
            path: path.as_ref().to_path_buf(),
            chain: RwLock::new(LoadedChain::default()),
        };
        source.refresh().await?;
        Ok(source)
    }

    /// Build from an in-memory dump; `refresh` then re-reads `path`.
    pub fn from_dump(path: impl AsRef<Path>, dump: ChainDump) -> Result<Self, SourceError> {
        Ok(Self {
            path: path.as_ref().to_path_buf(),
            chain: RwLock::new(LoadedChain::from_dump(dump)?),
        })
    }

    /// Re-read the dump file. On failure the previous contents stay.
    pub async fn refresh(&self) -> Result<(), SourceError> {
        let text = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            SourceError::Unreachable(format!("{}: {}", self.path.display(), e))
        })?;
        let dump: ChainDump =
            serde_json::from_str(&text).map_err(|e| SourceError::Malformed(e.to_string()))?;
        let loaded = LoadedChain::from_dump(dump)?;
        tracing::debug!(
            "Loaded chain dump {} ({} blocks)",
            self.path.display(),
            loaded.blocks.len()
        );
        *self.chain.write() = loaded;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl BlockSource for JsonFileBlockSource {
    async fn tip(&self) -> Result<SourceBlock, SourceError> {
        let chain = self.chain.read();
        chain
            .tip
            .and_then(|hash| chain.blocks.get(&hash).cloned())
            .ok_or_else(|| SourceError::NotFound("tip of empty dump".to_string()))
    }

    async fn block_by_height(&self, height: u64) -> Result<SourceBlock, SourceError> {
        let chain = self.chain.read();
        chain
            .chain
            .get(&height)
            .and_then(|hash| chain.blocks.get(hash).cloned())
            .ok_or_else(|| SourceError::NotFound(format!("height {}", height)))
    }

    async fn block_by_hash(&self, hash: &Hash) -> Result<SourceBlock, SourceError> {
        self.chain
            .read()
            .blocks
            .get(hash)
            .cloned()
            .ok_or_else(|| SourceError::NotFound(short_hex(hash)))
    }

    async fn operations_for_block(
        &self,
        hash: &Hash,
    ) -> Result<Vec<SourceTransaction>, SourceError> {
        self.chain
            .read()
            .transactions
            .get(hash)
            .cloned()
            .ok_or_else(|| SourceError::NotFound(short_hex(hash)))
    }
}
