//! # Update Stack Evaluator
//!
//! Pure left fold over the ordered action list of an `UpdateDid`.
//!
//! Every check looks only at the actions folded so far: "was the most recent
//! action touching this id an addition, a removal or an update?" Nothing is
//! counted outside the fold, so order matters. Adding a replacement master
//! key and then removing the old one is legal; the reverse is not.

use crate::domain::{DocumentState, PublicKey, UpdateAction, UpdateStackError};

/// Most recent action touching an id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Touch {
    Added,
    Removed,
    /// Services only.
    Updated,
}

/// Last action in `folded` that touched key `key_id`.
pub fn last_key_touch(folded: &[UpdateAction], key_id: &str) -> Option<Touch> {
    folded.iter().fold(None, |last, action| match action {
        UpdateAction::AddKey(key) if key.id == key_id => Some(Touch::Added),
        UpdateAction::RemoveKey { key_id: id } if id == key_id => Some(Touch::Removed),
        _ => last,
    })
}

/// Last action in `folded` that touched service `service_id`.
pub fn last_service_touch(folded: &[UpdateAction], service_id: &str) -> Option<Touch> {
    folded.iter().fold(None, |last, action| match action {
        UpdateAction::AddService(service) if service.id == service_id => Some(Touch::Added),
        UpdateAction::RemoveService { service_id: id } if id == service_id => {
            Some(Touch::Removed)
        }
        UpdateAction::UpdateService { service_id: id, .. } if id == service_id => {
            Some(Touch::Updated)
        }
        _ => last,
    })
}

/// Keys in effect after folding `folded` over `baseline`.
pub fn keys_in_effect(baseline: &DocumentState, folded: &[UpdateAction]) -> Vec<PublicKey> {
    folded
        .iter()
        .fold(baseline.keys.clone(), |mut keys, action| {
            match action {
                UpdateAction::AddKey(key) => keys.push(key.clone()),
                UpdateAction::RemoveKey { key_id } => keys.retain(|k| &k.id != key_id),
                _ => {}
            }
            keys
        })
}

/// Check every action against the actions before it, then return the
/// resulting state.
pub fn evaluate(
    baseline: &DocumentState,
    actions: &[UpdateAction],
) -> Result<DocumentState, UpdateStackError> {
    for (index, action) in actions.iter().enumerate() {
        let folded = &actions[..index];
        match action {
            UpdateAction::AddKey(key) => {
                let present = match last_key_touch(folded, &key.id) {
                    Some(Touch::Removed) => false,
                    Some(_) => true,
                    None => baseline.has_key(&key.id),
                };
                if present {
                    return Err(UpdateStackError::DuplicateKey {
                        index,
                        key_id: key.id.clone(),
                    });
                }
            }
            UpdateAction::RemoveKey { key_id } => {
                match last_key_touch(folded, key_id) {
                    Some(Touch::Removed) => {
                        return Err(UpdateStackError::KeyAlreadyRemoved {
                            index,
                            key_id: key_id.clone(),
                        })
                    }
                    None if !baseline.has_key(key_id) => {
                        return Err(UpdateStackError::KeyNotFound {
                            index,
                            key_id: key_id.clone(),
                        })
                    }
                    _ => {}
                }
                let keys = keys_in_effect(baseline, folded);
                let removing_master = keys.iter().any(|k| &k.id == key_id && k.is_master());
                let masters = keys.iter().filter(|k| k.is_master()).count();
                if removing_master && masters <= 1 {
                    return Err(UpdateStackError::LastMasterKey {
                        index,
                        key_id: key_id.clone(),
                    });
                }
            }
            UpdateAction::AddService(service) => {
                let present = match last_service_touch(folded, &service.id) {
                    Some(Touch::Removed) => false,
                    Some(_) => true,
                    None => baseline.has_service(&service.id),
                };
                if present {
                    return Err(UpdateStackError::DuplicateService {
                        index,
                        service_id: service.id.clone(),
                    });
                }
            }
            UpdateAction::RemoveService { service_id } => match last_service_touch(folded, service_id) {
                Some(Touch::Removed) => {
                    return Err(UpdateStackError::ServiceAlreadyRemoved {
                        index,
                        service_id: service_id.clone(),
                    })
                }
                None if !baseline.has_service(service_id) => {
                    return Err(UpdateStackError::ServiceNotFound {
                        index,
                        service_id: service_id.clone(),
                    })
                }
                _ => {}
            },
            UpdateAction::UpdateService { service_id, .. } => {
                match last_service_touch(folded, service_id) {
                    Some(Touch::Removed) => {
                        return Err(UpdateStackError::UpdateOfRemovedService {
                            index,
                            service_id: service_id.clone(),
                        })
                    }
                    None if !baseline.has_service(service_id) => {
                        return Err(UpdateStackError::ServiceNotFound {
                            index,
                            service_id: service_id.clone(),
                        })
                    }
                    _ => {}
                }
            }
            UpdateAction::PatchContext { .. } | UpdateAction::Unspecified => {}
        }
    }
    Ok(apply(baseline, actions))
}

/// Fold `actions` over `baseline` without checks.
///
/// Used when replaying operations that were already accepted.
pub fn apply(baseline: &DocumentState, actions: &[UpdateAction]) -> DocumentState {
    actions.iter().fold(baseline.clone(), |mut state, action| {
        match action {
            UpdateAction::AddKey(key) => state.keys.push(key.clone()),
            UpdateAction::RemoveKey { key_id } => state.keys.retain(|k| &k.id != key_id),
            UpdateAction::AddService(service) => state.services.push(service.clone()),
            UpdateAction::RemoveService { service_id } => {
                state.services.retain(|s| &s.id != service_id)
            }
            UpdateAction::UpdateService {
                service_id,
                service_type,
                endpoint,
            } => {
                if let Some(service) = state.services.iter_mut().find(|s| &s.id == service_id) {
                    if let Some(service_type) = service_type {
                        service.service_type = service_type.clone();
                    }
                    if let Some(endpoint) = endpoint {
                        service.endpoint = endpoint.clone();
                    }
                }
            }
            UpdateAction::PatchContext { contexts } => state.contexts = contexts.clone(),
            UpdateAction::Unspecified => {}
        }
        state
    })
}

/// Stateless evaluator handle for callers that want an object.
#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateStackEvaluator;

impl UpdateStackEvaluator {
    pub fn new() -> Self {
        Self
    }

    pub fn evaluate(
        &self,
        baseline: &DocumentState,
        actions: &[UpdateAction],
    ) -> Result<DocumentState, UpdateStackError> {
        evaluate(baseline, actions)
    }
}
