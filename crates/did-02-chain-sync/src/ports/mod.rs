//! # Ports Module
//!
//! Sync API (inbound) and the source and store it drives (outbound).

pub mod inbound;
pub mod outbound;

pub use inbound::*;
pub use outbound::*;
