//! # Error Types
//!
//! Defines error types used across subsystems.

use thiserror::Error;

/// Errors raised while parsing shared values from text.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TypesError {
    /// Ledger name not recognised.
    #[error("Unknown ledger: {0}")]
    UnknownLedger(String),

    /// Hash text was not 64 hex characters.
    #[error("Invalid hash hex: {0}")]
    InvalidHashHex(String),
}
