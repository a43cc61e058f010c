//! # Structural Validation
//!
//! Stateless checks on keys, services, contexts and action lists. None of
//! these need prior DID state; the parser runs them before resolving
//! anything.

use crate::config::ProtocolParameters;
use crate::domain::{
    Curve, KeyData, KeyUsage, OperationError, ProtocolVersionInfo, PublicKey, Service,
    UpdateAction,
};
use shared_crypto::{Ed25519PublicKey, Secp256k1PublicKey, COMPRESSED_LEN};
use std::collections::HashSet;

/// Raw key length for Ed25519 and X25519.
const RAW_KEY_LEN: usize = 32;

fn id_ok(id: &str, params: &ProtocolParameters) -> bool {
    !id.is_empty() && id.len() <= params.max_id_size
}

fn check_key_id(key_id: &str, params: &ProtocolParameters) -> Result<(), OperationError> {
    if id_ok(key_id, params) {
        Ok(())
    } else {
        Err(OperationError::KeyIdInvalid {
            key_id: key_id.to_string(),
            max: params.max_id_size,
        })
    }
}

fn check_service_id(service_id: &str, params: &ProtocolParameters) -> Result<(), OperationError> {
    if id_ok(service_id, params) {
        Ok(())
    } else {
        Err(OperationError::ServiceIdInvalid {
            service_id: service_id.to_string(),
            max: params.max_id_size,
        })
    }
}

// =============================================================================
// KEYS
// =============================================================================

/// Validate one key: id, usage, master curve and key material.
pub fn validate_key(key: &PublicKey, params: &ProtocolParameters) -> Result<(), OperationError> {
    check_key_id(&key.id, params)?;

    if key.usage == KeyUsage::Unknown {
        return Err(OperationError::UnknownKeyUsage {
            key_id: key.id.clone(),
        });
    }
    if key.is_master() && key.curve != Curve::Secp256k1 {
        return Err(OperationError::MasterKeyCurve {
            key_id: key.id.clone(),
            curve: key.curve,
        });
    }

    let material = |reason: String| OperationError::KeyMaterial {
        key_id: key.id.clone(),
        reason,
    };

    match (&key.curve, &key.data) {
        (Curve::Secp256k1, KeyData::Coordinates { x, y }) => {
            Secp256k1PublicKey::from_coordinates(x, y).map_err(|e| material(e.to_string()))?;
        }
        (Curve::Secp256k1, KeyData::Compressed(bytes)) => {
            if bytes.len() != COMPRESSED_LEN {
                return Err(material(format!(
                    "compressed point must be {} bytes, got {}",
                    COMPRESSED_LEN,
                    bytes.len()
                )));
            }
            Secp256k1PublicKey::from_sec1(bytes).map_err(|e| material(e.to_string()))?;
        }
        (Curve::Ed25519, KeyData::Raw(bytes)) => {
            Ed25519PublicKey::from_slice(bytes).map_err(|e| material(e.to_string()))?;
        }
        (Curve::X25519, KeyData::Raw(bytes)) => {
            if bytes.len() != RAW_KEY_LEN {
                return Err(material(format!(
                    "raw key must be {} bytes, got {}",
                    RAW_KEY_LEN,
                    bytes.len()
                )));
            }
        }
        (curve, _) => {
            return Err(material(format!("encoding does not match curve {}", curve)));
        }
    }
    Ok(())
}

/// Validate a full key list: count, each key and id uniqueness.
pub fn validate_keys(keys: &[PublicKey], params: &ProtocolParameters) -> Result<(), OperationError> {
    if keys.len() > params.max_verification_methods {
        return Err(OperationError::TooManyVerificationMethods {
            count: keys.len(),
            max: params.max_verification_methods,
        });
    }
    let mut seen = HashSet::new();
    for key in keys {
        validate_key(key, params)?;
        if !seen.insert(key.id.as_str()) {
            return Err(OperationError::DuplicateKeyId(key.id.clone()));
        }
    }
    Ok(())
}

// =============================================================================
// SERVICES
// =============================================================================

/// Validate a service type. Unknown but well-formed types are accepted.
pub fn validate_service_type(
    service_id: &str,
    service_type: &str,
    params: &ProtocolParameters,
) -> Result<(), OperationError> {
    let invalid = |reason: &str| OperationError::ServiceTypeInvalid {
        service_id: service_id.to_string(),
        reason: reason.to_string(),
    };

    if service_type.is_empty() {
        return Err(invalid("type is empty"));
    }
    if service_type.trim() != service_type {
        return Err(invalid("leading or trailing whitespace"));
    }
    if service_type.len() > params.max_service_type_size {
        return Err(invalid(&format!(
            "longer than {} bytes",
            params.max_service_type_size
        )));
    }
    if !params.is_known_service_type(service_type) {
        tracing::warn!(
            "[did-01] Service '{}' uses unrecognized type '{}'",
            service_id,
            service_type
        );
    }
    Ok(())
}

/// Validate a service endpoint: a URI, a JSON array of URIs or a JSON
/// object, within the size limit.
pub fn validate_endpoint(
    service_id: &str,
    endpoint: &str,
    params: &ProtocolParameters,
) -> Result<(), OperationError> {
    if endpoint.len() > params.max_service_endpoint_size {
        return Err(OperationError::ServiceEndpointTooLarge {
            service_id: service_id.to_string(),
            size: endpoint.len(),
            max: params.max_service_endpoint_size,
        });
    }

    let invalid = |reason: String| OperationError::ServiceEndpointInvalid {
        service_id: service_id.to_string(),
        reason,
    };

    if endpoint.is_empty() {
        return Err(invalid("endpoint is empty".to_string()));
    }
    if endpoint.trim() != endpoint {
        return Err(invalid("leading or trailing whitespace".to_string()));
    }

    if endpoint.starts_with('[') {
        let uris: Vec<String> =
            serde_json::from_str(endpoint).map_err(|e| invalid(e.to_string()))?;
        if uris.is_empty() {
            return Err(invalid("endpoint list is empty".to_string()));
        }
        for uri in &uris {
            url::Url::parse(uri).map_err(|e| invalid(format!("'{}': {}", uri, e)))?;
        }
        return Ok(());
    }

    if endpoint.starts_with('{') {
        serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(endpoint)
            .map_err(|e| invalid(e.to_string()))?;
        return Ok(());
    }

    url::Url::parse(endpoint).map_err(|e| invalid(e.to_string()))?;
    Ok(())
}

/// Validate one service.
pub fn validate_service(
    service: &Service,
    params: &ProtocolParameters,
) -> Result<(), OperationError> {
    check_service_id(&service.id, params)?;
    validate_service_type(&service.id, &service.service_type, params)?;
    validate_endpoint(&service.id, &service.endpoint, params)
}

/// Validate a full service list: count, each service and id uniqueness.
pub fn validate_services(
    services: &[Service],
    params: &ProtocolParameters,
) -> Result<(), OperationError> {
    if services.len() > params.max_services {
        return Err(OperationError::TooManyServices {
            count: services.len(),
            max: params.max_services,
        });
    }
    let mut seen = HashSet::new();
    for service in services {
        validate_service(service, params)?;
        if !seen.insert(service.id.as_str()) {
            return Err(OperationError::DuplicateServiceId(service.id.clone()));
        }
    }
    Ok(())
}

// =============================================================================
// CONTEXTS, ACTIONS, VERSIONS
// =============================================================================

/// Each context must be a unique absolute URI.
pub fn validate_contexts(contexts: &[String]) -> Result<(), OperationError> {
    let mut seen = HashSet::new();
    for context in contexts {
        url::Url::parse(context)
            .map_err(|e| OperationError::ContextInvalid(format!("'{}': {}", context, e)))?;
        if !seen.insert(context.as_str()) {
            return Err(OperationError::ContextInvalid(format!(
                "duplicate context '{}'",
                context
            )));
        }
    }
    Ok(())
}

/// Shape checks on an update action list. Order-sensitive checks belong to
/// the update stack evaluator.
pub fn validate_actions(
    actions: &[UpdateAction],
    params: &ProtocolParameters,
) -> Result<(), OperationError> {
    if actions.is_empty() {
        return Err(OperationError::EmptyActionList);
    }
    for (index, action) in actions.iter().enumerate() {
        match action {
            UpdateAction::AddKey(key) => validate_key(key, params)?,
            UpdateAction::RemoveKey { key_id } => check_key_id(key_id, params)?,
            UpdateAction::AddService(service) => validate_service(service, params)?,
            UpdateAction::RemoveService { service_id } => check_service_id(service_id, params)?,
            UpdateAction::UpdateService {
                service_id,
                service_type,
                endpoint,
            } => {
                if service_type.is_none() && endpoint.is_none() {
                    return Err(OperationError::EmptyAction { index });
                }
                check_service_id(service_id, params)?;
                if let Some(service_type) = service_type {
                    validate_service_type(service_id, service_type, params)?;
                }
                if let Some(endpoint) = endpoint {
                    validate_endpoint(service_id, endpoint, params)?;
                }
            }
            UpdateAction::PatchContext { contexts } => validate_contexts(contexts)?,
            UpdateAction::Unspecified => return Err(OperationError::EmptyAction { index }),
        }
    }
    Ok(())
}

/// Version info must name a positive activation block and a short name.
pub fn validate_version_info(
    info: &ProtocolVersionInfo,
    params: &ProtocolParameters,
) -> Result<(), OperationError> {
    if info.effective_since == 0 {
        return Err(OperationError::InvalidProtocolVersion(
            "effective_since must be positive".to_string(),
        ));
    }
    if let Some(name) = &info.version_name {
        if name.len() > params.max_id_size {
            return Err(OperationError::InvalidProtocolVersion(format!(
                "version name longer than {} bytes",
                params.max_id_size
            )));
        }
    }
    Ok(())
}
