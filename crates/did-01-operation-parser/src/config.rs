//! # Protocol Parameters
//!
//! Size and count limits enforced by the operation parser. One immutable
//! value is injected into the parser and the resolver.

use crate::domain::ProtocolVersion;
use serde::{Deserialize, Serialize};

/// Maximum length of key ids, service ids and version names.
pub const DEFAULT_MAX_ID_SIZE: usize = 50;

/// Maximum keys a DID may hold.
pub const DEFAULT_MAX_VERIFICATION_METHODS: usize = 50;

/// Maximum services a DID may hold.
pub const DEFAULT_MAX_SERVICES: usize = 50;

/// Maximum length of a service type.
pub const DEFAULT_MAX_SERVICE_TYPE_SIZE: usize = 100;

/// Maximum length of a service endpoint string.
pub const DEFAULT_MAX_SERVICE_ENDPOINT_SIZE: usize = 300;

/// Protocol limits and naming.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolParameters {
    pub max_id_size: usize,
    pub max_verification_methods: usize,
    pub max_services: usize,
    pub max_service_type_size: usize,
    pub max_service_endpoint_size: usize,
    /// Service types recognized without a warning.
    pub known_service_types: Vec<String>,
    /// DID method prefix, e.g. `did:prism`.
    pub did_method: String,
    /// Version in force before any protocol update is accepted.
    pub initial_protocol_version: ProtocolVersion,
}

impl Default for ProtocolParameters {
    fn default() -> Self {
        Self {
            max_id_size: DEFAULT_MAX_ID_SIZE,
            max_verification_methods: DEFAULT_MAX_VERIFICATION_METHODS,
            max_services: DEFAULT_MAX_SERVICES,
            max_service_type_size: DEFAULT_MAX_SERVICE_TYPE_SIZE,
            max_service_endpoint_size: DEFAULT_MAX_SERVICE_ENDPOINT_SIZE,
            known_service_types: vec![
                "LinkedDomains".to_string(),
                "DIDCommMessaging".to_string(),
                "CredentialRegistry".to_string(),
            ],
            did_method: "did:prism".to_string(),
            initial_protocol_version: ProtocolVersion::new(1, 0),
        }
    }
}

impl ProtocolParameters {
    /// Whether `service_type` is one of the recognized types.
    pub fn is_known_service_type(&self, service_type: &str) -> bool {
        self.known_service_types.iter().any(|t| t == service_type)
    }
}
