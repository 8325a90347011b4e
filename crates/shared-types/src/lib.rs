//! # Shared Types Crate
//!
//! Block, envelope and channel-configuration value types shared by the peer
//! crates, plus the bincode codec they travel in.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: every crate reads blocks and configuration
//!   through these types.
//! - **Plain data**: no behaviour beyond accessors and decoding; the peer
//!   core builds its own immutable views on top.

pub mod config;
pub mod entities;
pub mod envelope;
pub mod errors;

pub use config::*;
pub use entities::*;
pub use envelope::{ChannelHeader, ConfigEnvelope, Envelope, HeaderType};
pub use errors::CodecError;

use serde::{de::DeserializeOwned, Serialize};

/// Encode a value with bincode.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
    bincode::serialize(value).map_err(|e| CodecError::Encode(e.to_string()))
}

/// Decode a bincode value.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    bincode::deserialize(bytes).map_err(|e| CodecError::Decode(e.to_string()))
}
