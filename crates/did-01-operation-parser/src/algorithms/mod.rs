//! # Algorithms Module
//!
//! Pure validation logic: structural checks and the update stack fold.

pub mod update_stack;
pub mod validation;

pub use update_stack::{
    apply, evaluate, keys_in_effect, last_key_touch, last_service_touch, Touch,
    UpdateStackEvaluator,
};
pub use validation::{
    validate_actions, validate_contexts, validate_endpoint, validate_key, validate_keys,
    validate_service, validate_service_type, validate_services, validate_version_info,
};
