//! # Value Objects
//!
//! Resolved DID state produced by folding an operation chain.

use super::entities::{DidIdentifier, PublicKey, Service};
use serde::{Deserialize, Serialize};
use shared_types::{ChainPosition, Hash};

/// Keys, services and contexts of a DID at some point of its chain.
///
/// Entries keep insertion order; ids are unique within each list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentState {
    pub keys: Vec<PublicKey>,
    pub services: Vec<Service>,
    pub contexts: Vec<String>,
}

impl DocumentState {
    pub fn key(&self, key_id: &str) -> Option<&PublicKey> {
        self.keys.iter().find(|k| k.id == key_id)
    }

    pub fn service(&self, service_id: &str) -> Option<&Service> {
        self.services.iter().find(|s| s.id == service_id)
    }

    pub fn has_key(&self, key_id: &str) -> bool {
        self.key(key_id).is_some()
    }

    pub fn has_service(&self, service_id: &str) -> bool {
        self.service(service_id).is_some()
    }

    pub fn master_key_count(&self) -> usize {
        self.keys.iter().filter(|k| k.is_master()).count()
    }
}

/// Result of replaying a DID's accepted operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedDid {
    pub did: DidIdentifier,
    pub document: DocumentState,
    /// Head of the DID's hash chain.
    pub last_operation_hash: Hash,
    pub deactivated: bool,
    pub created_at: ChainPosition,
    pub updated_at: ChainPosition,
}
