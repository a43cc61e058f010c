//! # Node Runtime Library
//!
//! This library exposes the internal modules of the node runtime for testing.
//! The main entry point is the `main.rs` binary.
//!
//! - `container/` - configuration and service wiring
//! - `adapters/` - JSON chain dump block source
//! - `runtime` - periodic sync loop with cooperative shutdown

#![allow(clippy::type_complexity)]

pub mod adapters;
pub mod container;
pub mod runtime;

pub use container::{ConfigError, NodeConfig, NodeContainer};
pub use runtime::SyncLoop;
