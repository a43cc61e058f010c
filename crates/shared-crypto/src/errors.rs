//! # Crypto Errors
//!
//! Every failure names the curve it came from, so a rejected DID key or
//! signature can be reported against the right verification method.

use std::fmt;
use thiserror::Error;

/// Curve a key or signature belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCurve {
    Secp256k1,
    Ed25519,
}

impl fmt::Display for KeyCurve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyCurve::Secp256k1 => f.write_str("secp256k1"),
            KeyCurve::Ed25519 => f.write_str("Ed25519"),
        }
    }
}

/// Key decoding and signature verification failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("{curve} key material is {actual} bytes, expected {expected}")]
    KeyLength {
        curve: KeyCurve,
        expected: usize,
        actual: usize,
    },

    #[error("{0} public key is not a valid curve point")]
    NotOnCurve(KeyCurve),

    #[error("{0} signature encoding is invalid")]
    SignatureEncoding(KeyCurve),

    #[error("{0} signature does not match the message")]
    Mismatch(KeyCurve),

    #[error("secp256k1 secret scalar is out of range")]
    SecretOutOfRange,
}
