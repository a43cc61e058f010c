//! # Domain Module
//!
//! Operation data model and error taxonomy for the operation parser.

pub mod entities;
pub mod errors;
pub mod value_objects;

pub use entities::*;
pub use errors::*;
pub use value_objects::*;
