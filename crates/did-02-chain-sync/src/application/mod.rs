//! # Application Layer
//!
//! The sync engine service.

pub mod service;

pub use service::SyncEngine;
