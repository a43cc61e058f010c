//! # Shared Crypto - Signature Primitives
//!
//! ## Components
//!
//! | Module | Algorithm | Use Case |
//! |--------|-----------|----------|
//! | `ecdsa` | secp256k1 | DID master keys, operation signing |
//! | `signatures` | Ed25519 | Non-master DID keys |
//! | `verifier` | dispatch | `CryptoVerifier` port for the parser |
//!
//! ## Security Properties
//!
//! - **secp256k1**: RFC 6979 deterministic, SHA-256 digest, low-S normalisation
//! - **Ed25519**: Deterministic nonces, no RNG dependency

#![warn(clippy::all)]

pub mod ecdsa;
pub mod errors;
pub mod signatures;
pub mod verifier;

// Re-exports
pub use ecdsa::{Secp256k1KeyPair, Secp256k1PublicKey, COMPRESSED_LEN, COORDINATE_LEN};
pub use errors::{CryptoError, KeyCurve};
pub use signatures::{Ed25519KeyPair, Ed25519PublicKey};
pub use verifier::{CryptoVerifier, CurveKey, DefaultCryptoVerifier};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
