//! Cross-crate integration scenarios.

pub mod did_lifecycle;
pub mod sync_forks;
