//! # Ports
//!
//! Inbound: what the peer calls. Outbound: what the channel core calls.

pub mod inbound;
pub mod outbound;

pub use inbound::*;
pub use outbound::*;
