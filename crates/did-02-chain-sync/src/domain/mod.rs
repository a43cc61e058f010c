//! # Domain Module
//!
//! Block forest types and sync errors.

pub mod entities;
pub mod errors;

pub use entities::*;
pub use errors::*;
