//! # Ports Module
//!
//! Inbound API of the parser and the operation log it reads from.

pub mod inbound;
pub mod outbound;

pub use inbound::*;
pub use outbound::*;
