//! # Core Domain Entities
//!
//! Chain coordinates shared by the parser, the resolver and the sync engine.
//!
//! ## Clusters
//!
//! - **Hashing**: `Hash`, `sha256`, `hash_prefix`
//! - **Ledgers**: `LedgerId`
//! - **Block forest**: `BlockKey`, `BlockRef`
//! - **Ordering**: `ChainPosition`

use crate::errors::TypesError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

// =============================================================================
// CLUSTER A: HASHING
// =============================================================================

/// A 32-byte SHA-256 hash.
pub type Hash = [u8; 32];

/// Number of leading hash bytes used as the secondary block key.
pub const HASH_PREFIX_LEN: usize = 4;

/// Compute the SHA-256 digest of `data`.
pub fn sha256(data: &[u8]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// First four bytes of a hash as a big-endian integer.
pub fn hash_prefix(hash: &Hash) -> u32 {
    u32::from_be_bytes([hash[0], hash[1], hash[2], hash[3]])
}

/// Abbreviated hex rendering for log lines.
pub fn short_hex(hash: &Hash) -> String {
    hex::encode(&hash[..HASH_PREFIX_LEN])
}

/// Parse a 64-character hex string into a hash.
pub fn hash_from_hex(text: &str) -> Result<Hash, TypesError> {
    let bytes = hex::decode(text).map_err(|_| TypesError::InvalidHashHex(text.to_string()))?;
    bytes
        .try_into()
        .map_err(|_| TypesError::InvalidHashHex(text.to_string()))
}

// =============================================================================
// CLUSTER B: LEDGERS
// =============================================================================

/// Independent network whose blocks are synchronized separately.
///
/// Each ledger has its own block forest, its own pass lock and its own DID
/// namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LedgerId {
    Mainnet,
    Preprod,
    Preview,
    /// Local chain used by tests and fixtures.
    InMemory,
}

impl LedgerId {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerId::Mainnet => "mainnet",
            LedgerId::Preprod => "preprod",
            LedgerId::Preview => "preview",
            LedgerId::InMemory => "in-memory",
        }
    }
}

impl fmt::Display for LedgerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LedgerId {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" => Ok(LedgerId::Mainnet),
            "preprod" => Ok(LedgerId::Preprod),
            "preview" => Ok(LedgerId::Preview),
            "in-memory" | "inmemory" => Ok(LedgerId::InMemory),
            _ => Err(TypesError::UnknownLedger(s.to_string())),
        }
    }
}

// =============================================================================
// CLUSTER C: BLOCK FOREST
// =============================================================================

/// Cheap secondary key of a block: height plus hash prefix.
///
/// Several blocks may share a key; the full hash disambiguates them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockKey {
    pub height: u64,
    pub hash_prefix: u32,
}

/// Reference to exactly one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockRef {
    pub height: u64,
    pub hash_prefix: u32,
    pub hash: Hash,
}

impl BlockRef {
    /// Build a reference, deriving the prefix from the hash.
    pub fn new(height: u64, hash: Hash) -> Self {
        Self {
            height,
            hash_prefix: hash_prefix(&hash),
            hash,
        }
    }

    pub fn key(&self) -> BlockKey {
        BlockKey {
            height: self.height,
            hash_prefix: self.hash_prefix,
        }
    }
}

impl fmt::Display for BlockRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}:{}", self.height, short_hex(&self.hash))
    }
}

// =============================================================================
// CLUSTER D: ORDERING
// =============================================================================

/// Position of an operation in on-chain order.
///
/// Field order matters: the derived `Ord` compares block height, then
/// transaction index, then operation sequence.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct ChainPosition {
    pub block_height: u64,
    pub tx_index: u32,
    pub op_sequence: u32,
}

impl ChainPosition {
    pub fn new(block_height: u64, tx_index: u32, op_sequence: u32) -> Self {
        Self {
            block_height,
            tx_index,
            op_sequence,
        }
    }

    /// Cutoff covering every operation of blocks up to and including `height`.
    pub fn end_of_block(height: u64) -> Self {
        Self {
            block_height: height,
            tx_index: u32::MAX,
            op_sequence: u32::MAX,
        }
    }
}
