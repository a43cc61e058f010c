//! # Adapters Module
//!
//! - `memory_store`: in-memory block forest, also the resolver's operation log

pub mod memory_store;

pub use memory_store::InMemoryChainStore;
