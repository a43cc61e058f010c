//! # Shared Types Crate
//!
//! Chain coordinates and hashing primitives used by every subsystem.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: block references, chain positions and the
//!   hash type are defined once here.
//! - **Keyed, not linked**: blocks refer to their parent by `BlockRef`
//!   value, never by a live pointer, so the block forest stays acyclic.

pub mod entities;
pub mod errors;

pub use entities::*;
pub use errors::*;
