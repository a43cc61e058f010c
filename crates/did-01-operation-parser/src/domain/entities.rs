//! # Domain Entities
//!
//! Wire-level DID operations and the records produced when they are accepted.
//!
//! ## Encoding
//!
//! The canonical encoding of an operation is `bincode` of the inner
//! `Operation` value. Its SHA-256 digest is the operation hash; for a
//! `CreateDid` that digest is also the DID identifier.

use super::errors::OperationError;
use serde::{Deserialize, Serialize};
use shared_crypto::{CurveKey, Secp256k1KeyPair};
use shared_types::{sha256, ChainPosition, Hash, LedgerId};
use std::fmt;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Self-certifying DID identifier: hash of the creating operation.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DidIdentifier(pub Hash);

impl DidIdentifier {
    /// Full DID string under `method`, e.g. `did:prism:<hex>`.
    pub fn to_did_string(&self, method: &str) -> String {
        format!("{}:{}", method, hex::encode(self.0))
    }

    /// Parse a DID string under `method`.
    pub fn parse(text: &str, method: &str) -> Option<Self> {
        let suffix = text.strip_prefix(method)?.strip_prefix(':')?;
        shared_types::hash_from_hex(suffix).ok().map(DidIdentifier)
    }
}

impl fmt::Display for DidIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for DidIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DidIdentifier({})", shared_types::short_hex(&self.0))
    }
}

// =============================================================================
// KEYS AND SERVICES
// =============================================================================

/// Elliptic curve of a public key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Curve {
    /// Primary curve; the only one allowed for master keys.
    Secp256k1,
    Ed25519,
    X25519,
}

impl fmt::Display for Curve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Curve::Secp256k1 => "secp256k1",
            Curve::Ed25519 => "Ed25519",
            Curve::X25519 => "X25519",
        };
        f.write_str(name)
    }
}

/// What a key may be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyUsage {
    /// Signs lifecycle and protocol operations.
    Master,
    Issuing,
    KeyAgreement,
    Authentication,
    Revocation,
    CapabilityInvocation,
    CapabilityDelegation,
    /// Sentinel for an unset usage; always rejected.
    Unknown,
}

/// Encoded public key material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyData {
    /// Affine coordinates of a secp256k1 point (32 bytes each).
    Coordinates { x: Vec<u8>, y: Vec<u8> },
    /// SEC1 compressed secp256k1 point (33 bytes).
    Compressed(Vec<u8>),
    /// Raw key bytes for Ed25519 and X25519 (32 bytes).
    Raw(Vec<u8>),
}

/// A verification method declared by a DID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKey {
    pub id: String,
    pub usage: KeyUsage,
    pub curve: Curve,
    pub data: KeyData,
}

impl PublicKey {
    /// secp256k1 key from affine coordinates.
    pub fn secp256k1(id: impl Into<String>, usage: KeyUsage, x: &[u8], y: &[u8]) -> Self {
        Self {
            id: id.into(),
            usage,
            curve: Curve::Secp256k1,
            data: KeyData::Coordinates {
                x: x.to_vec(),
                y: y.to_vec(),
            },
        }
    }

    /// secp256k1 key built from a signing key pair.
    pub fn from_key_pair(id: impl Into<String>, usage: KeyUsage, pair: &Secp256k1KeyPair) -> Self {
        let (x, y) = pair.coordinates();
        Self::secp256k1(id, usage, &x, &y)
    }

    /// Ed25519 key from raw bytes.
    pub fn ed25519(id: impl Into<String>, usage: KeyUsage, raw: &[u8]) -> Self {
        Self {
            id: id.into(),
            usage,
            curve: Curve::Ed25519,
            data: KeyData::Raw(raw.to_vec()),
        }
    }

    pub fn is_master(&self) -> bool {
        self.usage == KeyUsage::Master
    }

    /// Key material in the form the signature verifier expects.
    pub fn curve_key(&self) -> Option<CurveKey> {
        match (&self.curve, &self.data) {
            (Curve::Secp256k1, KeyData::Coordinates { x, y }) => {
                let mut sec1 = Vec::with_capacity(1 + x.len() + y.len());
                sec1.push(0x04);
                sec1.extend_from_slice(x);
                sec1.extend_from_slice(y);
                Some(CurveKey::Secp256k1(sec1))
            }
            (Curve::Secp256k1, KeyData::Compressed(bytes)) => {
                Some(CurveKey::Secp256k1(bytes.clone()))
            }
            (Curve::Ed25519, KeyData::Raw(bytes)) => Some(CurveKey::Ed25519(bytes.clone())),
            (Curve::X25519, KeyData::Raw(bytes)) => Some(CurveKey::X25519(bytes.clone())),
            _ => None,
        }
    }
}

/// A service endpoint declared by a DID.
///
/// `endpoint` is kept as the raw string: a URI, a JSON array of URIs or a
/// JSON object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub id: String,
    pub service_type: String,
    pub endpoint: String,
}

impl Service {
    pub fn new(
        id: impl Into<String>,
        service_type: impl Into<String>,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            service_type: service_type.into(),
            endpoint: endpoint.into(),
        }
    }
}

// =============================================================================
// OPERATIONS
// =============================================================================

/// Protocol version, ordered by major then minor.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ProtocolVersion {
    pub major: u32,
    pub minor: u32,
}

impl ProtocolVersion {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// One step of an `UpdateDid`. Actions replay in list order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateAction {
    AddKey(PublicKey),
    RemoveKey {
        key_id: String,
    },
    AddService(Service),
    RemoveService {
        service_id: String,
    },
    UpdateService {
        service_id: String,
        service_type: Option<String>,
        endpoint: Option<String>,
    },
    PatchContext {
        contexts: Vec<String>,
    },
    /// Action with no payload; always rejected.
    Unspecified,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateDid {
    pub public_keys: Vec<PublicKey>,
    pub services: Vec<Service>,
    pub contexts: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateDid {
    pub id: DidIdentifier,
    pub previous_operation_hash: Hash,
    pub actions: Vec<UpdateAction>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeactivateDid {
    pub id: DidIdentifier,
    pub previous_operation_hash: Hash,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolVersionInfo {
    pub version_name: Option<String>,
    /// First block at which the version applies. Must be positive.
    pub effective_since: u64,
    pub protocol_version: ProtocolVersion,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolVersionUpdate {
    pub proposer: DidIdentifier,
    pub previous_operation_hash: Hash,
    pub version: ProtocolVersionInfo,
}

/// Closed set of operation kinds. Adding a kind requires a protocol bump.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    CreateDid(CreateDid),
    UpdateDid(UpdateDid),
    DeactivateDid(DeactivateDid),
    ProtocolVersionUpdate(ProtocolVersionUpdate),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    CreateDid,
    UpdateDid,
    DeactivateDid,
    ProtocolVersionUpdate,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationKind::CreateDid => "CreateDid",
            OperationKind::UpdateDid => "UpdateDid",
            OperationKind::DeactivateDid => "DeactivateDid",
            OperationKind::ProtocolVersionUpdate => "ProtocolVersionUpdate",
        };
        f.write_str(name)
    }
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::CreateDid(_) => OperationKind::CreateDid,
            Operation::UpdateDid(_) => OperationKind::UpdateDid,
            Operation::DeactivateDid(_) => OperationKind::DeactivateDid,
            Operation::ProtocolVersionUpdate(_) => OperationKind::ProtocolVersionUpdate,
        }
    }

    /// Canonical byte encoding; the signed payload.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>, OperationError> {
        bincode::serialize(self).map_err(|e| OperationError::Malformed(e.to_string()))
    }

    /// SHA-256 of the canonical encoding.
    pub fn hash(&self) -> Result<Hash, OperationError> {
        Ok(sha256(&self.canonical_bytes()?))
    }
}

/// Wire record: an operation, the id of the key that signed it, and the
/// signature over the operation's canonical bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedOperation {
    pub signed_with: String,
    pub signature: Vec<u8>,
    pub operation: Operation,
}

impl SignedOperation {
    /// Sign `operation` with a secp256k1 key pair.
    pub fn sign(
        operation: Operation,
        key_id: impl Into<String>,
        key_pair: &Secp256k1KeyPair,
    ) -> Result<Self, OperationError> {
        let signature = key_pair.sign(&operation.canonical_bytes()?);
        Ok(Self {
            signed_with: key_id.into(),
            signature,
            operation,
        })
    }

    pub fn encode(&self) -> Result<Vec<u8>, OperationError> {
        bincode::serialize(self).map_err(|e| OperationError::Malformed(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, OperationError> {
        bincode::deserialize(bytes).map_err(|e| OperationError::Malformed(e.to_string()))
    }
}

/// An operation that passed validation at a chain position.
///
/// Immutable once produced; keyed by `operation_hash`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptedOperation {
    pub ledger: LedgerId,
    pub operation_hash: Hash,
    /// DID the operation belongs to (the proposer for protocol updates).
    pub did: DidIdentifier,
    pub position: ChainPosition,
    pub signed: SignedOperation,
}

impl AcceptedOperation {
    pub fn kind(&self) -> OperationKind {
        self.signed.operation.kind()
    }

    pub fn operation(&self) -> &Operation {
        &self.signed.operation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_create() -> Operation {
        let pair = Secp256k1KeyPair::from_bytes([1u8; 32]).unwrap();
        Operation::CreateDid(CreateDid {
            public_keys: vec![PublicKey::from_key_pair("master0", KeyUsage::Master, &pair)],
            services: vec![Service::new("svc", "LinkedDomains", "https://example.com")],
            contexts: vec![],
        })
    }

    #[test]
    fn test_create_hash_is_deterministic() {
        let op = sample_create();
        assert_eq!(op.hash().unwrap(), op.clone().hash().unwrap());
    }

    #[test]
    fn test_hash_changes_with_content() {
        let a = sample_create();
        let mut b = a.clone();
        if let Operation::CreateDid(create) = &mut b {
            create.contexts.push("https://w3id.org/security/v1".to_string());
        }
        assert_ne!(a.hash().unwrap(), b.hash().unwrap());
    }

    #[test]
    fn test_signed_operation_wire_roundtrip() {
        let pair = Secp256k1KeyPair::from_bytes([1u8; 32]).unwrap();
        let signed = SignedOperation::sign(sample_create(), "master0", &pair).unwrap();
        let bytes = signed.encode().unwrap();
        assert_eq!(SignedOperation::decode(&bytes).unwrap(), signed);
    }

    #[test]
    fn test_decode_garbage_is_malformed() {
        let result = SignedOperation::decode(&[0xFF, 0x01]);
        assert!(matches!(result, Err(OperationError::Malformed(_))));
    }

    #[test]
    fn test_did_string_roundtrip() {
        let did = DidIdentifier(sha256(b"create"));
        let text = did.to_did_string("did:prism");
        assert!(text.starts_with("did:prism:"));
        assert_eq!(DidIdentifier::parse(&text, "did:prism"), Some(did));
        assert_eq!(DidIdentifier::parse(&text, "did:other"), None);
    }

    #[test]
    fn test_protocol_version_order() {
        assert!(ProtocolVersion::new(1, 9) < ProtocolVersion::new(2, 0));
        assert!(ProtocolVersion::new(2, 0) < ProtocolVersion::new(2, 1));
    }

    #[test]
    fn test_curve_key_mismatch_is_none() {
        let key = PublicKey {
            id: "k".to_string(),
            usage: KeyUsage::Issuing,
            curve: Curve::Ed25519,
            data: KeyData::Coordinates {
                x: vec![0; 32],
                y: vec![0; 32],
            },
        };
        assert!(key.curve_key().is_none());
    }
}
