//! # Application Module
//!
//! The DID resolver and the operation parser built on top of it.

pub mod parser;
pub mod resolver;

pub use parser::OperationParser;
pub use resolver::DidResolver;
