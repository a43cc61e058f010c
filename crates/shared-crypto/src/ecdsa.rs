//! # ECDSA Signatures (secp256k1)
//!
//! Production ECDSA signatures using the secp256k1 curve, the primary curve
//! for DID master keys.
//!
//! ## Security Properties
//!
//! - RFC 6979 deterministic nonces (no RNG dependency for signing)
//! - SHA-256 message digest
//! - High-S signatures are normalised before verification, DER and 64-byte
//!   compact encodings are both accepted

use crate::{CryptoError, KeyCurve};
use k256::ecdsa::{
    signature::{Signer, Verifier},
    Signature, SigningKey, VerifyingKey,
};
use zeroize::Zeroize;

const CURVE: KeyCurve = KeyCurve::Secp256k1;

/// Length of one affine coordinate.
pub const COORDINATE_LEN: usize = 32;

/// Length of a SEC1 compressed point.
pub const COMPRESSED_LEN: usize = 33;

/// secp256k1 public key in SEC1 encoding (33 or 65 bytes).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Secp256k1PublicKey(Vec<u8>);

impl Secp256k1PublicKey {
    /// Create from SEC1 bytes (compressed or uncompressed).
    pub fn from_sec1(bytes: &[u8]) -> Result<Self, CryptoError> {
        VerifyingKey::from_sec1_bytes(bytes).map_err(|_| CryptoError::NotOnCurve(CURVE))?;
        Ok(Self(bytes.to_vec()))
    }

    /// Create from the two affine coordinates.
    pub fn from_coordinates(x: &[u8], y: &[u8]) -> Result<Self, CryptoError> {
        if x.len() != COORDINATE_LEN {
            return Err(CryptoError::KeyLength {
                curve: CURVE,
                expected: COORDINATE_LEN,
                actual: x.len(),
            });
        }
        if y.len() != COORDINATE_LEN {
            return Err(CryptoError::KeyLength {
                curve: CURVE,
                expected: COORDINATE_LEN,
                actual: y.len(),
            });
        }
        let mut sec1 = Vec::with_capacity(1 + 2 * COORDINATE_LEN);
        sec1.push(0x04);
        sec1.extend_from_slice(x);
        sec1.extend_from_slice(y);
        Self::from_sec1(&sec1)
    }

    /// Get raw SEC1 bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Verify a signature over `message` (hashed with SHA-256).
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> Result<(), CryptoError> {
        let verifying_key =
            VerifyingKey::from_sec1_bytes(&self.0).map_err(|_| CryptoError::NotOnCurve(CURVE))?;

        let sig = parse_signature(signature)?;
        let sig = sig.normalize_s().unwrap_or(sig);

        verifying_key
            .verify(message, &sig)
            .map_err(|_| CryptoError::Mismatch(CURVE))
    }
}

fn parse_signature(bytes: &[u8]) -> Result<Signature, CryptoError> {
    if bytes.len() == 64 {
        return Signature::from_slice(bytes).map_err(|_| CryptoError::SignatureEncoding(CURVE));
    }
    Signature::from_der(bytes).map_err(|_| CryptoError::SignatureEncoding(CURVE))
}

/// secp256k1 ECDSA keypair.
pub struct Secp256k1KeyPair {
    signing_key: SigningKey,
}

impl Secp256k1KeyPair {
    /// Generate random keypair.
    pub fn generate() -> Self {
        let signing_key = SigningKey::random(&mut rand::thread_rng());
        Self { signing_key }
    }

    /// Create from secret key bytes (32 bytes).
    pub fn from_bytes(bytes: [u8; 32]) -> Result<Self, CryptoError> {
        let signing_key =
            SigningKey::from_bytes((&bytes).into()).map_err(|_| CryptoError::SecretOutOfRange)?;
        Ok(Self { signing_key })
    }

    /// Affine coordinates `(x, y)` of the public key.
    pub fn coordinates(&self) -> ([u8; 32], [u8; 32]) {
        let point = self.signing_key.verifying_key().to_encoded_point(false);
        let mut x = [0u8; 32];
        let mut y = [0u8; 32];
        if let (Some(px), Some(py)) = (point.x(), point.y()) {
            x.copy_from_slice(px);
            y.copy_from_slice(py);
        }
        (x, y)
    }

    /// SEC1 compressed public key (33 bytes).
    pub fn compressed(&self) -> Vec<u8> {
        self.signing_key
            .verifying_key()
            .to_encoded_point(true)
            .as_bytes()
            .to_vec()
    }

    /// Public key in uncompressed SEC1 form.
    pub fn public_key(&self) -> Secp256k1PublicKey {
        let point = self.signing_key.verifying_key().to_encoded_point(false);
        Secp256k1PublicKey(point.as_bytes().to_vec())
    }

    /// Sign a message (deterministic RFC 6979), DER encoded.
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        let sig: Signature = self.signing_key.sign(message);
        sig.to_der().as_bytes().to_vec()
    }
}

impl Drop for Secp256k1KeyPair {
    fn drop(&mut self) {
        // Zeroize secret key material
        let mut bytes: [u8; 32] = self.signing_key.to_bytes().into();
        bytes.zeroize();
    }
}
