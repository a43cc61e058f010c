//! # Ed25519 Keys
//!
//! Alternate-curve keys a DID document may carry for authentication or
//! issuing. They never act as master keys, so only verification is needed
//! on the read path; key pairs exist for the write path and for tests.

use crate::{CryptoError, KeyCurve};
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use zeroize::Zeroize;

/// Raw Ed25519 public key length.
pub const ED25519_KEY_LEN: usize = 32;

const SIGNATURE_LEN: usize = 64;
const CURVE: KeyCurve = KeyCurve::Ed25519;

/// Ed25519 public key as carried in `KeyData::Raw`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ed25519PublicKey(VerifyingKey);

impl Ed25519PublicKey {
    /// Decode raw key bytes; rejects wrong lengths and invalid points.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let raw: &[u8; ED25519_KEY_LEN] = bytes.try_into().map_err(|_| CryptoError::KeyLength {
            curve: CURVE,
            expected: ED25519_KEY_LEN,
            actual: bytes.len(),
        })?;
        VerifyingKey::from_bytes(raw)
            .map(Self)
            .map_err(|_| CryptoError::NotOnCurve(CURVE))
    }

    pub fn as_bytes(&self) -> &[u8; ED25519_KEY_LEN] {
        self.0.as_bytes()
    }

    /// Strict verification of a 64-byte signature over `message`.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> Result<(), CryptoError> {
        let raw: &[u8; SIGNATURE_LEN] = signature
            .try_into()
            .map_err(|_| CryptoError::SignatureEncoding(CURVE))?;
        self.0
            .verify_strict(message, &Signature::from_bytes(raw))
            .map_err(|_| CryptoError::Mismatch(CURVE))
    }
}

/// Ed25519 signing key pair.
pub struct Ed25519KeyPair {
    signing_key: SigningKey,
}

impl Ed25519KeyPair {
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut rand::thread_rng()),
        }
    }

    /// Deterministic key pair from a 32-byte seed.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(&seed),
        }
    }

    pub fn public_key(&self) -> Ed25519PublicKey {
        Ed25519PublicKey(self.signing_key.verifying_key())
    }

    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        self.signing_key.sign(message).to_bytes().to_vec()
    }
}

impl Drop for Ed25519KeyPair {
    fn drop(&mut self) {
        let mut secret = self.signing_key.to_bytes();
        secret.zeroize();
    }
}
