//! # Adapter Implementations
//!
//! Concrete implementations of the sync engine's outbound ports that live
//! in the binary.

pub mod json_block_source;

pub use json_block_source::{ChainDump, DumpBlock, DumpTransaction, JsonFileBlockSource};
