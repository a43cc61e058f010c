//! # Signature Verifier
//!
//! Curve-dispatching verification port used by the operation parser.
//!
//! The parser only ever asks one question: does `signature` over `data`
//! verify under this public key? Production wiring uses
//! `DefaultCryptoVerifier`; tests may substitute their own implementation.

use crate::ecdsa::Secp256k1PublicKey;
use crate::signatures::Ed25519PublicKey;
use tracing::debug;

/// Public key material tagged with its curve.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CurveKey {
    /// SEC1 encoded secp256k1 point (33 or 65 bytes).
    Secp256k1(Vec<u8>),
    /// Raw Ed25519 key (32 bytes).
    Ed25519(Vec<u8>),
    /// Raw X25519 key (32 bytes). Key agreement only, never verifies.
    X25519(Vec<u8>),
}

/// Signature verification port.
pub trait CryptoVerifier: Send + Sync {
    /// Verify `signature` over `data` with `public_key`.
    fn verify(&self, data: &[u8], signature: &[u8], public_key: &CurveKey) -> bool;
}

/// Verifier backed by `k256` and `ed25519-dalek`.
#[derive(Debug, Clone, Default)]
pub struct DefaultCryptoVerifier;

impl DefaultCryptoVerifier {
    pub fn new() -> Self {
        Self
    }
}

impl CryptoVerifier for DefaultCryptoVerifier {
    fn verify(&self, data: &[u8], signature: &[u8], public_key: &CurveKey) -> bool {
        let result = match public_key {
            CurveKey::Secp256k1(sec1) => Secp256k1PublicKey::from_sec1(sec1)
                .and_then(|key| key.verify(data, signature)),
            CurveKey::Ed25519(raw) => {
                Ed25519PublicKey::from_slice(raw).and_then(|key| key.verify(data, signature))
            }
            CurveKey::X25519(_) => return false,
        };

        match result {
            Ok(()) => true,
            Err(e) => {
                debug!("Signature rejected: {}", e);
                false
            }
        }
    }
}
