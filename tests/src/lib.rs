//! # DID Anchor Test Suite
//!
//! Unified test crate.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── fixtures.rs       # Harness: mock upstream + store + parser + engine
//! └── integration/      # Cross-crate scenarios
//!     ├── sync_forks.rs     # Idempotence, fork detection, branch switch
//!     └── did_lifecycle.rs  # Operation rules exercised through sync
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p did-tests
//! cargo test -p did-tests integration::sync_forks
//! cargo bench -p did-tests
//! ```

#![allow(dead_code)]

pub mod fixtures;
pub mod integration;
